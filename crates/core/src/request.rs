//! Analysis requests accepted by the pipeline.
//!
//! Every request is request-scoped: it is created at the start of an orchestration call and
//! dropped when the result is returned.

use crate::error::{AnalysisError, AnalysisResult};
use chrono::{DateTime, Duration, Utc};
use medassist_types::NonEmptyText;
use medassist_uuid::PatientId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// The three analysis use cases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UseCase {
    Prescription,
    Diagnosis,
    Vitals,
}

impl UseCase {
    pub fn as_str(self) -> &'static str {
        match self {
            UseCase::Prescription => "prescription",
            UseCase::Diagnosis => "diagnosis",
            UseCase::Vitals => "vitals",
        }
    }
}

impl fmt::Display for UseCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A photographed prescription, either as raw bytes or by reference.
#[derive(Clone, PartialEq, Eq)]
pub enum PrescriptionImage {
    /// Raw image bytes, for example an upload.
    Bytes(Vec<u8>),
    /// A `data:` URI carrying base64 image data, or an `http(s)` URL.
    Uri(String),
}

impl fmt::Debug for PrescriptionImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print image content.
        match self {
            PrescriptionImage::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            PrescriptionImage::Uri(uri) if uri.starts_with("data:") => {
                write!(f, "Uri(data URI, {} chars)", uri.len())
            }
            PrescriptionImage::Uri(uri) => write!(f, "Uri({uri})"),
        }
    }
}

/// An ordered, de-duplicated, non-empty list of reported symptoms.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymptomSet(Vec<NonEmptyText>);

impl SymptomSet {
    /// Builds a symptom set, preserving input order.
    ///
    /// Entries are trimmed and duplicates (compared case-insensitively) keep their first
    /// occurrence.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if the list is empty or any entry is blank.
    pub fn new<I, S>(symptoms: I) -> AnalysisResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();

        for (index, raw) in symptoms.into_iter().enumerate() {
            let symptom = NonEmptyText::new(raw.as_ref()).map_err(|_| {
                AnalysisError::invalid_request(format!("symptom at position {} is blank", index))
            })?;
            if seen.insert(symptom.as_str().to_lowercase()) {
                ordered.push(symptom);
            }
        }

        if ordered.is_empty() {
            return Err(AnalysisError::invalid_request(
                "at least one symptom is required",
            ));
        }

        Ok(Self(ordered))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(NonEmptyText::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the symptom exactly as the caller supplied it, if `candidate` names one of them
    /// (ignoring case and surrounding whitespace).
    pub fn canonical(&self, candidate: &str) -> Option<&str> {
        let needle = candidate.trim().to_lowercase();
        self.iter().find(|s| s.to_lowercase() == needle)
    }
}

/// Time window for a vitals analysis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VitalsPeriod {
    Week,
    #[default]
    Month,
    Quarter,
    All,
}

impl VitalsPeriod {
    pub fn as_str(self) -> &'static str {
        match self {
            VitalsPeriod::Week => "week",
            VitalsPeriod::Month => "month",
            VitalsPeriod::Quarter => "quarter",
            VitalsPeriod::All => "all",
        }
    }

    /// Length of the window, or `None` for the whole history.
    pub fn window(self) -> Option<Duration> {
        match self {
            VitalsPeriod::Week => Some(Duration::days(7)),
            VitalsPeriod::Month => Some(Duration::days(30)),
            VitalsPeriod::Quarter => Some(Duration::days(90)),
            VitalsPeriod::All => None,
        }
    }

    /// Earliest timestamp included in the window ending at `now`.
    pub fn since(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.window().map(|w| now - w)
    }
}

impl fmt::Display for VitalsPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VitalsPeriod {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "week" => Ok(VitalsPeriod::Week),
            "month" => Ok(VitalsPeriod::Month),
            "quarter" => Ok(VitalsPeriod::Quarter),
            "all" => Ok(VitalsPeriod::All),
            other => Err(AnalysisError::invalid_request(format!(
                "unknown vitals period '{}' (expected week, month, quarter or all)",
                other
            ))),
        }
    }
}

/// One recorded set of vital signs. Every measurement is optional.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalReading {
    pub recorded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub systolic: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diastolic: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub respiratory_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oxygen_saturation: Option<f64>,
    /// mmol/L.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blood_glucose: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl VitalReading {
    /// A reading with a timestamp and no measurements.
    pub fn at(recorded_at: DateTime<Utc>) -> Self {
        Self {
            recorded_at,
            heart_rate: None,
            systolic: None,
            diastolic: None,
            temperature_c: None,
            respiratory_rate: None,
            oxygen_saturation: None,
            blood_glucose: None,
            weight_kg: None,
            notes: None,
        }
    }

    /// True when at least one measurement is present.
    pub fn has_measurements(&self) -> bool {
        self.heart_rate.is_some()
            || self.systolic.is_some()
            || self.diastolic.is_some()
            || self.temperature_c.is_some()
            || self.respiratory_rate.is_some()
            || self.oxygen_saturation.is_some()
            || self.blood_glucose.is_some()
            || self.weight_kg.is_some()
    }
}

/// Which patient's vitals to analyse, and over which period.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VitalsQuery {
    pub patient_id: PatientId,
    pub period: VitalsPeriod,
}

/// A vitals query together with the readings fetched for it.
#[derive(Clone, Debug, PartialEq)]
pub struct VitalsRequest {
    pub query: VitalsQuery,
    pub readings: Vec<VitalReading>,
}

/// A single analysis request. Exactly one use case per request.
#[derive(Clone, Debug, PartialEq)]
pub enum AnalysisRequest {
    PrescriptionImage(PrescriptionImage),
    SymptomSet(SymptomSet),
    Vitals(VitalsRequest),
}

impl AnalysisRequest {
    pub fn use_case(&self) -> UseCase {
        match self {
            AnalysisRequest::PrescriptionImage(_) => UseCase::Prescription,
            AnalysisRequest::SymptomSet(_) => UseCase::Diagnosis,
            AnalysisRequest::Vitals(_) => UseCase::Vitals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn symptom_set_preserves_order_and_drops_duplicates() {
        let set = SymptomSet::new([" persistent cough", "fever", "Persistent Cough "]).unwrap();
        let items: Vec<&str> = set.iter().collect();
        assert_eq!(items, vec!["persistent cough", "fever"]);
    }

    #[test]
    fn symptom_set_rejects_empty_and_blank_input() {
        let err = SymptomSet::new(Vec::<String>::new()).expect_err("empty list");
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);

        let err = SymptomSet::new(["fever", "  "]).expect_err("blank entry");
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert!(err.message().contains("position 1"));
    }

    #[test]
    fn canonical_matches_ignoring_case() {
        let set = SymptomSet::new(["Persistent cough", "fever"]).unwrap();
        assert_eq!(set.canonical(" persistent COUGH"), Some("Persistent cough"));
        assert_eq!(set.canonical("headache"), None);
    }

    #[test]
    fn period_parses_and_bounds_window() {
        assert_eq!("Week".parse::<VitalsPeriod>().unwrap(), VitalsPeriod::Week);
        assert_eq!(VitalsPeriod::Quarter.window(), Some(Duration::days(90)));
        assert_eq!(VitalsPeriod::All.window(), None);
        assert!("fortnight".parse::<VitalsPeriod>().is_err());
    }

    #[test]
    fn debug_never_prints_image_content() {
        let image = PrescriptionImage::Uri("data:image/png;base64,AAAA".into());
        assert!(!format!("{image:?}").contains("AAAA"));
        let image = PrescriptionImage::Bytes(vec![1, 2, 3]);
        assert_eq!(format!("{image:?}"), "Bytes(3 bytes)");
    }

    #[test]
    fn reading_serialises_camel_case_and_skips_absent_values() {
        let mut reading = VitalReading::at("2026-01-01T08:00:00Z".parse().unwrap());
        reading.heart_rate = Some(72.0);
        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["heartRate"], 72.0);
        assert!(json.get("systolic").is_none());
        assert!(reading.has_measurements());
    }
}
