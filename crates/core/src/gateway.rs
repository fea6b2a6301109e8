//! Gateway in front of the inference capability.
//!
//! The gateway owns everything about *calling* the capability: the per-attempt deadline, the
//! single retry for transient faults, cancellation, and turning raw model text into a JSON
//! document. It knows nothing about what the document means.

use crate::cancel::CancelToken;
use crate::capability::{CapabilityRequest, InferenceCapability};
use crate::config::InferenceConfig;
use crate::error::{AnalysisError, AnalysisResult, ErrorKind};
use crate::prompt::PromptSpec;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of one gateway invocation.
#[derive(Clone, Debug, PartialEq)]
pub enum InferenceResult {
    /// A parsed JSON object returned by the model.
    Success(Value),
    Failure { kind: ErrorKind, message: String },
}

impl InferenceResult {
    fn failure(err: AnalysisError) -> Self {
        InferenceResult::Failure {
            kind: err.kind(),
            message: err.message().to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, InferenceResult::Success(_))
    }

    pub fn into_result(self) -> AnalysisResult<Value> {
        match self {
            InferenceResult::Success(value) => Ok(value),
            InferenceResult::Failure { kind, message } => Err(AnalysisError::new(kind, message)),
        }
    }
}

#[derive(Clone)]
pub struct InferenceGateway {
    capability: Arc<dyn InferenceCapability>,
    timeout: Duration,
    max_retries: u32,
    max_output_tokens: u32,
}

impl InferenceGateway {
    pub fn new(capability: Arc<dyn InferenceCapability>, config: &InferenceConfig) -> Self {
        Self {
            capability,
            timeout: config.timeout(),
            max_retries: config.max_retries(),
            max_output_tokens: config.max_output_tokens(),
        }
    }

    /// Sends `prompt` to the capability.
    ///
    /// Each attempt is bounded by the configured timeout. `Unreachable` and `Timeout` failures
    /// are retried at most `max_retries` times; every other failure is returned at once.
    /// Cancellation wins over any in-flight attempt and is never retried.
    pub async fn infer(&self, prompt: &PromptSpec, cancel: &CancelToken) -> InferenceResult {
        let request = CapabilityRequest::from_prompt(prompt, self.max_output_tokens);
        let use_case = prompt.use_case();
        let attempts = self.max_retries + 1;

        for attempt in 1..=attempts {
            if cancel.is_cancelled() {
                tracing::info!(%use_case, attempt, "inference cancelled before attempt");
                return InferenceResult::failure(AnalysisError::cancelled());
            }

            let started = Instant::now();
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(%use_case, attempt, "inference cancelled in flight");
                    return InferenceResult::failure(AnalysisError::cancelled());
                }
                outcome = tokio::time::timeout(self.timeout, self.capability.complete(&request)) => outcome,
            };
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let result = match outcome {
                Ok(Ok(text)) => parse_document(&text),
                Ok(Err(err)) => Err(err),
                Err(_) => Err(AnalysisError::new(
                    ErrorKind::Timeout,
                    format!("no response within {}s", self.timeout.as_secs_f32()),
                )),
            };

            match result {
                Ok(document) => {
                    tracing::info!(%use_case, attempt, elapsed_ms, "inference succeeded");
                    return InferenceResult::Success(document);
                }
                Err(err) if err.kind().is_retryable() && attempt < attempts => {
                    tracing::warn!(
                        %use_case,
                        attempt,
                        elapsed_ms,
                        kind = %err.kind(),
                        "transient inference failure, retrying once"
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        %use_case,
                        attempt,
                        elapsed_ms,
                        kind = %err.kind(),
                        detail = %err.message(),
                        "inference failed"
                    );
                    return InferenceResult::failure(err);
                }
            }
        }

        // Only reachable with zero attempts, which the loop bounds rule out.
        InferenceResult::failure(AnalysisError::new(
            ErrorKind::Unreachable,
            "no inference attempt was made",
        ))
    }
}

/// Parses model text into a JSON object, tolerating a surrounding Markdown code fence.
pub(crate) fn parse_document(text: &str) -> AnalysisResult<Value> {
    let body = strip_code_fence(text);
    let value: Value = serde_json::from_str(body).map_err(|e| {
        AnalysisError::malformed_output(format!("model output is not valid JSON: {}", e))
    })?;

    if !value.is_object() {
        return Err(AnalysisError::malformed_output(
            "model output is JSON but not an object",
        ));
    }

    Ok(value)
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`, `JSON`, ...) whether or not a newline follows it.
    let info_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(rest.len());
    rest[info_len..].trim_end().trim_end_matches("```").trim()
}
