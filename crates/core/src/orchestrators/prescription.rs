use super::Pipeline;
use crate::cancel::CancelToken;
use crate::error::AnalysisResult;
use crate::normalizer::normalize_prescription;
use crate::request::{AnalysisRequest, PrescriptionImage};
use crate::results::PrescriptionAnalysis;
use crate::validator::validate_prescription;

/// Reads a photographed prescription into a structured medication list.
#[derive(Clone)]
pub struct PrescriptionOrchestrator {
    pipeline: Pipeline,
}

impl PrescriptionOrchestrator {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    pub async fn analyze(
        &self,
        image: PrescriptionImage,
        cancel: &CancelToken,
    ) -> AnalysisResult<PrescriptionAnalysis> {
        let request = AnalysisRequest::PrescriptionImage(image);
        self.pipeline
            .run(&request, cancel, |raw| {
                normalize_prescription(raw).map(validate_prescription)
            })
            .await
    }
}
