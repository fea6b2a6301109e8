//! Recorded vitals.
//!
//! The pipeline only ever reads vitals, through [`VitalsSource`]. [`FileVitalsStore`] keeps one
//! YAML file per patient below a sharded directory:
//!
//! ```text
//! <patient_data_dir>/vitals/<s1>/<s2>/<patient_id>/vitals.yaml
//! ```
//!
//! where `s1` and `s2` are the first two byte pairs of the canonical patient id.
//!
//! Writes are serialised within a process: clones of one store share a single write lock.
//! Separate processes writing the same patient at the same time may lose a reading; run one
//! writer per data directory.

use crate::constants::VITALS_FILENAME;
use crate::error::{AnalysisError, AnalysisResult, ErrorKind};
use crate::request::{VitalReading, VitalsPeriod};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use medassist_uuid::PatientId;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Read access to a patient's recorded vitals.
#[async_trait]
pub trait VitalsSource: Send + Sync {
    /// Readings within `period` ending now, oldest first. An unknown patient has no readings.
    async fn fetch(
        &self,
        patient_id: &PatientId,
        period: VitalsPeriod,
    ) -> AnalysisResult<Vec<VitalReading>>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct VitalsFile {
    #[serde(default)]
    readings: Vec<VitalReading>,
}

#[derive(Clone, Debug)]
pub struct FileVitalsStore {
    vitals_dir: PathBuf,
    /// Held across each read-modify-write.
    write_lock: Arc<Mutex<()>>,
}

impl FileVitalsStore {
    pub fn new(vitals_dir: impl Into<PathBuf>) -> Self {
        Self {
            vitals_dir: vitals_dir.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn vitals_dir(&self) -> &Path {
        &self.vitals_dir
    }

    fn patient_file(&self, patient_id: &PatientId) -> PathBuf {
        patient_id
            .sharded_dir(&self.vitals_dir)
            .join(VITALS_FILENAME)
    }

    /// Like [`VitalsSource::fetch`], with the end of the window given explicitly.
    pub async fn fetch_at(
        &self,
        patient_id: &PatientId,
        period: VitalsPeriod,
        now: DateTime<Utc>,
    ) -> AnalysisResult<Vec<VitalReading>> {
        let file = self.read(patient_id).await?;
        let since = period.since(now);

        let mut readings: Vec<VitalReading> = file
            .readings
            .into_iter()
            .filter(|r| since.map_or(true, |since| r.recorded_at >= since))
            .filter(|r| r.recorded_at <= now)
            .collect();
        readings.sort_by_key(|r| r.recorded_at);

        tracing::debug!(%patient_id, %period, readings = readings.len(), "fetched vitals");
        Ok(readings)
    }

    /// Creates an empty vitals record for a new patient and returns its id.
    pub async fn create_patient(&self) -> AnalysisResult<PatientId> {
        let patient_id = PatientId::new();
        let _guard = self.write_lock.lock().await;
        self.write(&patient_id, &VitalsFile::default()).await?;
        tracing::info!(%patient_id, "created vitals record");
        Ok(patient_id)
    }

    /// Appends a reading to the patient's record, creating the record if needed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if the reading carries no measurements, or `Storage` if the
    /// record cannot be read or written.
    pub async fn append(&self, patient_id: &PatientId, reading: VitalReading) -> AnalysisResult<()> {
        if !reading.has_measurements() {
            return Err(AnalysisError::invalid_request(
                "a vitals reading needs at least one measurement",
            ));
        }

        let _guard = self.write_lock.lock().await;
        let mut file = self.read(patient_id).await?;
        file.readings.push(reading);
        file.readings.sort_by_key(|r| r.recorded_at);
        self.write(patient_id, &file).await?;

        tracing::info!(%patient_id, readings = file.readings.len(), "recorded vitals reading");
        Ok(())
    }

    async fn read(&self, patient_id: &PatientId) -> AnalysisResult<VitalsFile> {
        let path = self.patient_file(patient_id);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(VitalsFile::default()),
            Err(e) => return Err(storage_error("read", &path, e)),
        };

        if contents.trim().is_empty() {
            return Ok(VitalsFile::default());
        }

        serde_yaml::from_str(&contents).map_err(|e| {
            AnalysisError::new(
                ErrorKind::Storage,
                format!("failed to parse {}: {}", path.display(), e),
            )
        })
    }

    /// Writes via a sibling temp file and rename so readers never see a partial file.
    async fn write(&self, patient_id: &PatientId, file: &VitalsFile) -> AnalysisResult<()> {
        let path = self.patient_file(patient_id);
        let dir = patient_id.sharded_dir(&self.vitals_dir);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| storage_error("create", &dir, e))?;

        let yaml = serde_yaml::to_string(file).map_err(|e| {
            AnalysisError::new(ErrorKind::Storage, format!("failed to serialise vitals: {}", e))
        })?;

        let tmp = path.with_extension("yaml.tmp");
        tokio::fs::write(&tmp, yaml)
            .await
            .map_err(|e| storage_error("write", &tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| storage_error("replace", &path, e))?;
        Ok(())
    }
}

#[async_trait]
impl VitalsSource for FileVitalsStore {
    async fn fetch(
        &self,
        patient_id: &PatientId,
        period: VitalsPeriod,
    ) -> AnalysisResult<Vec<VitalReading>> {
        self.fetch_at(patient_id, period, Utc::now()).await
    }
}

fn storage_error(action: &str, path: &Path, err: io::Error) -> AnalysisError {
    AnalysisError::new(
        ErrorKind::Storage,
        format!("failed to {} {}: {}", action, path.display(), err),
    )
}
