//! The external inference capability.
//!
//! Core code only sees the [`InferenceCapability`] trait. The production implementation talks
//! to an OpenAI-compatible chat completions endpoint; tests substitute scripted fakes.

mod openai;

pub use openai::OpenAiCompatibleCapability;

use crate::error::AnalysisResult;
use crate::prompt::PromptSpec;
use crate::request::UseCase;
use async_trait::async_trait;
use serde_json::Value;

/// Everything the capability needs for one call.
///
/// `output_schema` is informational: the instruction already embeds it, and adapters are not
/// expected to enforce it. `structured_output` asks the adapter to put the provider into its
/// JSON-object mode where it has one.
#[derive(Clone, Debug, PartialEq)]
pub struct CapabilityRequest {
    pub use_case: UseCase,
    pub instruction: String,
    pub output_schema: Value,
    pub structured_output: bool,
    /// `data:` URL or remote URL of the attached image.
    pub image_url: Option<String>,
    pub max_output_tokens: u32,
}

impl CapabilityRequest {
    pub fn from_prompt(prompt: &PromptSpec, max_output_tokens: u32) -> Self {
        Self {
            use_case: prompt.use_case(),
            instruction: prompt.instruction().to_string(),
            output_schema: prompt.output_schema().clone(),
            structured_output: true,
            image_url: prompt.attachment().map(|a| a.to_url()),
            max_output_tokens,
        }
    }
}

/// A text/vision model reachable over the network.
///
/// Implementations return the raw text the model produced and classify their own failures
/// into [`crate::ErrorKind`]s. They must not retry; retries belong to the gateway.
#[async_trait]
pub trait InferenceCapability: Send + Sync {
    async fn complete(&self, request: &CapabilityRequest) -> AnalysisResult<String>;
}
