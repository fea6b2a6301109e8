use super::Pipeline;
use crate::cancel::CancelToken;
use crate::error::{AnalysisError, AnalysisResult};
use crate::normalizer::normalize_vitals;
use crate::request::{AnalysisRequest, VitalsQuery, VitalsRequest};
use crate::results::VitalsAnalysis;
use crate::validator::validate_vitals;
use crate::vitals_store::VitalsSource;
use std::sync::Arc;

/// Summarises a patient's recorded vitals over a period.
#[derive(Clone)]
pub struct VitalsOrchestrator {
    pipeline: Pipeline,
    source: Arc<dyn VitalsSource>,
}

impl VitalsOrchestrator {
    pub fn new(pipeline: Pipeline, source: Arc<dyn VitalsSource>) -> Self {
        Self { pipeline, source }
    }

    /// Fetches the readings for `query`, then analyses them. A period with no readings is an
    /// `InvalidRequest` and never reaches the capability.
    pub async fn analyze(
        &self,
        query: VitalsQuery,
        cancel: &CancelToken,
    ) -> AnalysisResult<VitalsAnalysis> {
        if cancel.is_cancelled() {
            return Err(AnalysisError::cancelled());
        }

        let readings = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AnalysisError::cancelled()),
            readings = self.source.fetch(&query.patient_id, query.period) => readings?,
        };
        tracing::debug!(
            patient_id = %query.patient_id,
            period = %query.period,
            readings = readings.len(),
            "loaded vitals for analysis"
        );

        let request = AnalysisRequest::Vitals(VitalsRequest { query, readings });
        self.pipeline
            .run(&request, cancel, |raw| {
                normalize_vitals(raw).map(validate_vitals)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{CapabilityRequest, InferenceCapability};
    use crate::config::test_inference_config;
    use crate::error::ErrorKind;
    use crate::gateway::InferenceGateway;
    use crate::prompt::PromptBuilder;
    use crate::request::{VitalReading, VitalsPeriod};
    use async_trait::async_trait;
    use medassist_uuid::PatientId;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Reply {
        body: String,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl InferenceCapability for Reply {
        async fn complete(&self, request: &CapabilityRequest) -> AnalysisResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(request.instruction.contains("heart rate 72 bpm"));
            Ok(self.body.clone())
        }
    }

    struct InMemory(Vec<VitalReading>);

    #[async_trait]
    impl VitalsSource for InMemory {
        async fn fetch(
            &self,
            _patient_id: &PatientId,
            _period: VitalsPeriod,
        ) -> AnalysisResult<Vec<VitalReading>> {
            Ok(self.0.clone())
        }
    }

    fn orchestrator(readings: Vec<VitalReading>) -> (VitalsOrchestrator, Arc<Reply>) {
        let cap = Arc::new(Reply {
            body: json!({
                "trends": {"heartRate": "Stable around 72 bpm"},
                "concerns": [],
                "recommendations": ["Continue daily measurements"]
            })
            .to_string(),
            calls: AtomicUsize::new(0),
        });
        let gateway = InferenceGateway::new(cap.clone(), &test_inference_config());
        let orch = VitalsOrchestrator::new(
            Pipeline::new(PromptBuilder::new(1024), gateway),
            Arc::new(InMemory(readings)),
        );
        (orch, cap)
    }

    fn query() -> VitalsQuery {
        VitalsQuery {
            patient_id: PatientId::new(),
            period: VitalsPeriod::Week,
        }
    }

    #[tokio::test]
    async fn summarises_fetched_readings() {
        let mut reading = VitalReading::at("2026-01-01T08:00:00Z".parse().unwrap());
        reading.heart_rate = Some(72.0);
        let (orch, cap) = orchestrator(vec![reading]);

        let result = orch.analyze(query(), &CancelToken::never()).await.unwrap();
        assert_eq!(result.trends["heartRate"], "Stable around 72 bpm");
        assert!(result.concerns.is_empty());
        assert!(result.warnings.is_empty());
        assert_eq!(cap.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_readings_is_invalid_and_skips_inference() {
        let (orch, cap) = orchestrator(vec![]);
        let err = orch.analyze(query(), &CancelToken::never()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert_eq!(cap.calls.load(Ordering::SeqCst), 0);
    }
}
