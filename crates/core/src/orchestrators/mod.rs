//! One orchestrator per use case.
//!
//! Each orchestrator runs the same pipeline: build the prompt, call the gateway, normalize,
//! validate. They differ only in how the request is assembled and which typed result comes
//! back.

mod prescription;
mod symptoms;
mod vitals;

pub use prescription::PrescriptionOrchestrator;
pub use symptoms::SymptomOrchestrator;
pub use vitals::VitalsOrchestrator;

use crate::cancel::CancelToken;
use crate::error::AnalysisResult;
use crate::gateway::InferenceGateway;
use crate::prompt::PromptBuilder;
use crate::request::AnalysisRequest;
use serde_json::Value;
use std::time::Instant;

/// Prompt builder and gateway shared by the orchestrators.
#[derive(Clone)]
pub struct Pipeline {
    builder: PromptBuilder,
    gateway: InferenceGateway,
}

impl Pipeline {
    pub fn new(builder: PromptBuilder, gateway: InferenceGateway) -> Self {
        Self { builder, gateway }
    }

    /// Runs `request` through the capability and hands the raw document to `finish`, which
    /// normalizes and validates it. `finish` is never called when inference fails.
    pub async fn run<T>(
        &self,
        request: &AnalysisRequest,
        cancel: &CancelToken,
        finish: impl FnOnce(Value) -> AnalysisResult<T>,
    ) -> AnalysisResult<T> {
        let use_case = request.use_case();
        let started = Instant::now();
        tracing::info!(%use_case, "analysis started");

        let outcome = async {
            let prompt = self.builder.build(request)?;
            let raw = self.gateway.infer(&prompt, cancel).await.into_result()?;
            finish(raw)
        }
        .await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(_) => tracing::info!(%use_case, elapsed_ms, "analysis finished"),
            Err(err) => tracing::error!(
                %use_case,
                elapsed_ms,
                kind = %err.kind(),
                detail = %err.message(),
                "analysis failed"
            ),
        }
        outcome
    }
}
