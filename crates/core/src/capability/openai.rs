use super::{CapabilityRequest, InferenceCapability};
use crate::config::{ConfigError, ConfigResult, InferenceConfig};
use crate::constants::ANALYSIS_TEMPERATURE;
use crate::error::{AnalysisError, AnalysisResult, ErrorKind};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SYSTEM_PROMPT: &str =
    "You are a careful medical documentation assistant. Reply with one JSON object only.";

/// Longest provider error detail kept in an error message.
const MAX_ERROR_DETAIL: usize = 300;

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: ProviderError,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    #[serde(default)]
    message: Option<String>,
}

/// Chat completions client for any OpenAI-compatible endpoint.
#[derive(Clone, Debug)]
pub struct OpenAiCompatibleCapability {
    client: reqwest::Client,
    endpoint: reqwest::Url,
    model: String,
}

impl OpenAiCompatibleCapability {
    /// Builds the HTTP client. The per-call deadline is enforced by the gateway, so the client
    /// only bounds connection setup.
    pub fn new(config: &InferenceConfig) -> ConfigResult<Self> {
        let endpoint = completions_endpoint(config.api_url())?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key())).map_err(
            |_| ConfigError::Invalid {
                name: "MEDASSIST_LLM_API_KEY",
                reason: "contains characters not allowed in a header".into(),
            },
        )?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(10).min(config.timeout()))
            .build()
            .map_err(|e| ConfigError::Invalid {
                name: "MEDASSIST_LLM_URL",
                reason: format!("could not build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint,
            model: config.model().to_string(),
        })
    }

    pub fn endpoint(&self) -> &reqwest::Url {
        &self.endpoint
    }

    fn body<'a>(&'a self, request: &'a CapabilityRequest) -> ChatCompletionRequest<'a> {
        let user = match request.image_url.as_deref() {
            Some(url) => MessageContent::Parts(vec![
                ContentPart::Text {
                    text: &request.instruction,
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url },
                },
            ]),
            None => MessageContent::Text(&request.instruction),
        };

        ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(SYSTEM_PROMPT),
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens: request.max_output_tokens,
            temperature: ANALYSIS_TEMPERATURE,
            response_format: request.structured_output.then_some(ResponseFormat {
                kind: "json_object",
            }),
        }
    }
}

#[async_trait]
impl InferenceCapability for OpenAiCompatibleCapability {
    async fn complete(&self, request: &CapabilityRequest) -> AnalysisResult<String> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&self.body(request))
            .send()
            .await
            .map_err(|e| AnalysisError::new(classify_transport(&e), transport_detail(&e)))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            AnalysisError::new(classify_transport(&e), transport_detail(&e))
        })?;

        if !status.is_success() {
            return Err(AnalysisError::new(
                classify_status(status),
                format!("provider returned {}: {}", status, error_detail(&body)),
            ));
        }

        extract_content(&body)
    }
}

fn completions_endpoint(base: &reqwest::Url) -> ConfigResult<reqwest::Url> {
    let base = base.as_str().trim_end_matches('/');
    let full = if base.ends_with("/chat/completions") {
        base.to_string()
    } else {
        format!("{}/chat/completions", base)
    };
    reqwest::Url::parse(&full).map_err(|e| ConfigError::Invalid {
        name: "MEDASSIST_LLM_URL",
        reason: format!("'{}': {}", full, e),
    })
}

/// Maps an HTTP failure status to an error kind.
pub(crate) fn classify_status(status: StatusCode) -> ErrorKind {
    match status {
        StatusCode::TOO_MANY_REQUESTS | StatusCode::PAYMENT_REQUIRED => ErrorKind::QuotaExceeded,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ErrorKind::Timeout,
        s if s.is_server_error() => ErrorKind::Unreachable,
        _ => ErrorKind::InvalidRequest,
    }
}

/// Maps a transport failure to an error kind.
pub(crate) fn classify_transport(err: &reqwest::Error) -> ErrorKind {
    if err.is_timeout() {
        ErrorKind::Timeout
    } else if err.is_decode() {
        ErrorKind::MalformedOutput
    } else if err.is_builder() {
        ErrorKind::InvalidRequest
    } else {
        ErrorKind::Unreachable
    }
}

fn transport_detail(err: &reqwest::Error) -> String {
    // Strip the URL; it is configuration, not diagnosis.
    let mut detail = err.to_string();
    if let Some(url) = err.url() {
        detail = detail.replace(url.as_str(), "<endpoint>");
    }
    detail
}

fn error_detail(body: &str) -> String {
    let detail = serde_json::from_str::<ProviderErrorBody>(body)
        .ok()
        .and_then(|b| b.error.message)
        .unwrap_or_else(|| body.trim().to_string());

    if detail.chars().count() > MAX_ERROR_DETAIL {
        let cut: String = detail.chars().take(MAX_ERROR_DETAIL).collect();
        format!("{}...", cut)
    } else {
        detail
    }
}

/// Pulls the first choice's text out of a successful completion.
pub(crate) fn extract_content(body: &str) -> AnalysisResult<String> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body).map_err(|e| {
        AnalysisError::malformed_output(format!("completion envelope is not valid JSON: {}", e))
    })?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AnalysisError::malformed_output("completion contained no content"))
}
