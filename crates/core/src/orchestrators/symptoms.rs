use super::Pipeline;
use crate::cancel::CancelToken;
use crate::error::AnalysisResult;
use crate::normalizer::normalize_diagnosis;
use crate::request::{AnalysisRequest, SymptomSet};
use crate::results::DiagnosisAnalysis;
use crate::validator::validate_diagnosis;

/// Turns reported symptoms into ranked differential diagnoses.
#[derive(Clone)]
pub struct SymptomOrchestrator {
    pipeline: Pipeline,
}

impl SymptomOrchestrator {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    pub async fn analyze(
        &self,
        symptoms: SymptomSet,
        cancel: &CancelToken,
    ) -> AnalysisResult<DiagnosisAnalysis> {
        tracing::debug!(symptoms = symptoms.len(), "analysing symptoms");
        let request = AnalysisRequest::SymptomSet(symptoms.clone());
        self.pipeline
            .run(&request, cancel, |raw| {
                normalize_diagnosis(raw, &symptoms).map(validate_diagnosis)
            })
            .await
    }
}
