//! The inbound analysis operations.
//!
//! [`AnalysisService`] is constructed once per process from [`CoreConfig`] and shared by
//! reference or clone. It holds no per-request state.

use crate::cancel::CancelToken;
use crate::capability::{InferenceCapability, OpenAiCompatibleCapability};
use crate::config::{ConfigResult, CoreConfig};
use crate::error::AnalysisResult;
use crate::gateway::InferenceGateway;
use crate::normalizer::normalize;
use crate::orchestrators::{
    Pipeline, PrescriptionOrchestrator, SymptomOrchestrator, VitalsOrchestrator,
};
use crate::prompt::PromptBuilder;
use crate::request::{AnalysisRequest, PrescriptionImage, SymptomSet, VitalsPeriod, VitalsQuery};
use crate::results::{CanonicalResult, DiagnosisAnalysis, PrescriptionAnalysis, VitalsAnalysis};
use crate::validator::validate;
use crate::vitals_store::{FileVitalsStore, VitalsSource};
use medassist_uuid::PatientId;
use std::sync::Arc;

#[derive(Clone)]
pub struct AnalysisService {
    pipeline: Pipeline,
    prescription: PrescriptionOrchestrator,
    symptoms: SymptomOrchestrator,
    vitals: VitalsOrchestrator,
}

impl AnalysisService {
    /// Wires the orchestrators around the given collaborators.
    pub fn new(
        config: &CoreConfig,
        capability: Arc<dyn InferenceCapability>,
        vitals_source: Arc<dyn VitalsSource>,
    ) -> Self {
        let gateway = InferenceGateway::new(capability, config.inference());
        let pipeline = Pipeline::new(PromptBuilder::new(config.max_image_bytes()), gateway);

        Self {
            prescription: PrescriptionOrchestrator::new(pipeline.clone()),
            symptoms: SymptomOrchestrator::new(pipeline.clone()),
            vitals: VitalsOrchestrator::new(pipeline.clone(), vitals_source),
            pipeline,
        }
    }

    /// Production wiring: the OpenAI-compatible capability and the file-backed vitals store.
    pub fn from_config(config: &CoreConfig) -> ConfigResult<Self> {
        let capability = OpenAiCompatibleCapability::new(config.inference())?;
        tracing::info!(
            endpoint = %capability.endpoint(),
            model = config.inference().model(),
            "inference capability configured"
        );
        let store = FileVitalsStore::new(config.vitals_dir());
        Ok(Self::new(config, Arc::new(capability), Arc::new(store)))
    }

    pub async fn analyze_prescription_image(
        &self,
        image: PrescriptionImage,
        cancel: &CancelToken,
    ) -> AnalysisResult<PrescriptionAnalysis> {
        self.prescription.analyze(image, cancel).await
    }

    /// # Errors
    ///
    /// `InvalidRequest` if the list is empty or contains a blank entry.
    pub async fn analyze_symptoms(
        &self,
        symptoms: Vec<String>,
        cancel: &CancelToken,
    ) -> AnalysisResult<DiagnosisAnalysis> {
        let symptoms = SymptomSet::new(symptoms)?;
        self.symptoms.analyze(symptoms, cancel).await
    }

    pub async fn analyze_vitals(
        &self,
        patient_id: PatientId,
        period: VitalsPeriod,
        cancel: &CancelToken,
    ) -> AnalysisResult<VitalsAnalysis> {
        self.vitals
            .analyze(VitalsQuery { patient_id, period }, cancel)
            .await
    }

    /// Runs an already assembled request and returns whichever canonical result it produces.
    pub async fn analyze(
        &self,
        request: AnalysisRequest,
        cancel: &CancelToken,
    ) -> AnalysisResult<CanonicalResult> {
        self.pipeline
            .run(&request, cancel, |raw| normalize(&request, raw).map(validate))
            .await
    }
}
