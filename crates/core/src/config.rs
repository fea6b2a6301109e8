//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services.
//! Request handling never reads process-wide environment variables, which keeps behaviour
//! consistent across multi-threaded runtimes and test harnesses.

use crate::constants::{
    DEFAULT_INFERENCE_TIMEOUT, DEFAULT_MAX_IMAGE_BYTES, DEFAULT_MAX_OUTPUT_TOKENS,
    DEFAULT_MAX_RETRIES, DEFAULT_MODEL, DEFAULT_PATIENT_DATA_DIR, MAX_OUTPUT_TOKENS_LIMIT,
    MAX_RETRIES_LIMIT, VITALS_DIR_NAME,
};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Errors raised while resolving configuration at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Settings for the external inference capability and the gateway in front of it.
#[derive(Clone)]
pub struct InferenceConfig {
    api_url: reqwest::Url,
    api_key: String,
    model: String,
    timeout: Duration,
    max_output_tokens: u32,
    max_retries: u32,
}

impl InferenceConfig {
    /// Create a new `InferenceConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the URL is not http(s), embeds credentials, the key or
    /// model is blank, the timeout is zero, the output ceiling is outside
    /// `1..=MAX_OUTPUT_TOKENS_LIMIT`, or more than one retry is requested.
    pub fn new(
        api_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
        max_output_tokens: u32,
        max_retries: u32,
    ) -> ConfigResult<Self> {
        let api_url = parse_api_url(api_url)?;

        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ConfigError::Invalid {
                name: "MEDASSIST_LLM_API_KEY",
                reason: "cannot be empty".into(),
            });
        }

        let model = model.into();
        if model.trim().is_empty() {
            return Err(ConfigError::Invalid {
                name: "MEDASSIST_LLM_MODEL",
                reason: "cannot be empty".into(),
            });
        }

        if timeout.is_zero() {
            return Err(ConfigError::Invalid {
                name: "MEDASSIST_LLM_TIMEOUT_SECS",
                reason: "must be greater than zero".into(),
            });
        }

        if max_output_tokens == 0 || max_output_tokens > MAX_OUTPUT_TOKENS_LIMIT {
            return Err(ConfigError::Invalid {
                name: "MEDASSIST_MAX_OUTPUT_TOKENS",
                reason: format!("must be between 1 and {}", MAX_OUTPUT_TOKENS_LIMIT),
            });
        }

        if max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::Invalid {
                name: "MEDASSIST_LLM_RETRIES",
                reason: format!("at most {} retry is allowed", MAX_RETRIES_LIMIT),
            });
        }

        Ok(Self {
            api_url,
            api_key: api_key.trim().to_string(),
            model: model.trim().to_string(),
            timeout,
            max_output_tokens,
            max_retries,
        })
    }

    pub fn api_url(&self) -> &reqwest::Url {
        &self.api_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_output_tokens(&self) -> u32 {
        self.max_output_tokens
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

impl fmt::Debug for InferenceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceConfig")
            .field("api_url", &self.api_url.as_str())
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    patient_data_dir: PathBuf,
    max_image_bytes: usize,
    inference: InferenceConfig,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    pub fn new(
        patient_data_dir: PathBuf,
        max_image_bytes: usize,
        inference: InferenceConfig,
    ) -> ConfigResult<Self> {
        if max_image_bytes == 0 {
            return Err(ConfigError::Invalid {
                name: "MEDASSIST_MAX_IMAGE_BYTES",
                reason: "must be greater than zero".into(),
            });
        }

        Ok(Self {
            patient_data_dir,
            max_image_bytes,
            inference,
        })
    }

    /// Build configuration from raw environment values.
    ///
    /// Each argument is the value of the correspondingly named variable, or `None` when unset.
    /// Binaries read the environment once and hand the values here; tests pass values directly.
    #[allow(clippy::too_many_arguments)]
    pub fn from_env_values(
        llm_url: Option<String>,
        llm_api_key: Option<String>,
        llm_model: Option<String>,
        llm_timeout_secs: Option<String>,
        max_output_tokens: Option<String>,
        llm_retries: Option<String>,
        max_image_bytes: Option<String>,
        patient_data_dir: Option<String>,
    ) -> ConfigResult<Self> {
        let llm_url = non_blank(llm_url).ok_or(ConfigError::Missing("MEDASSIST_LLM_URL"))?;
        let llm_api_key =
            non_blank(llm_api_key).ok_or(ConfigError::Missing("MEDASSIST_LLM_API_KEY"))?;
        let model = non_blank(llm_model).unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let timeout = parse_number::<u64>("MEDASSIST_LLM_TIMEOUT_SECS", llm_timeout_secs)?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_INFERENCE_TIMEOUT);
        let max_output_tokens =
            parse_number::<u32>("MEDASSIST_MAX_OUTPUT_TOKENS", max_output_tokens)?
                .unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS);
        let max_retries = parse_number::<u32>("MEDASSIST_LLM_RETRIES", llm_retries)?
            .unwrap_or(DEFAULT_MAX_RETRIES);
        let max_image_bytes = parse_number::<usize>("MEDASSIST_MAX_IMAGE_BYTES", max_image_bytes)?
            .unwrap_or(DEFAULT_MAX_IMAGE_BYTES);
        let patient_data_dir = non_blank(patient_data_dir)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PATIENT_DATA_DIR));

        let inference = InferenceConfig::new(
            &llm_url,
            llm_api_key,
            model,
            timeout,
            max_output_tokens,
            max_retries,
        )?;

        Self::new(patient_data_dir, max_image_bytes, inference)
    }

    /// Build configuration from the process environment.
    ///
    /// Intended to be called exactly once by a binary's `main`.
    pub fn from_env() -> ConfigResult<Self> {
        let var = |name: &str| std::env::var(name).ok();
        Self::from_env_values(
            var("MEDASSIST_LLM_URL"),
            var("MEDASSIST_LLM_API_KEY"),
            var("MEDASSIST_LLM_MODEL"),
            var("MEDASSIST_LLM_TIMEOUT_SECS"),
            var("MEDASSIST_MAX_OUTPUT_TOKENS"),
            var("MEDASSIST_LLM_RETRIES"),
            var("MEDASSIST_MAX_IMAGE_BYTES"),
            var("PATIENT_DATA_DIR"),
        )
    }

    pub fn patient_data_dir(&self) -> &Path {
        &self.patient_data_dir
    }

    pub fn vitals_dir(&self) -> PathBuf {
        self.patient_data_dir.join(VITALS_DIR_NAME)
    }

    pub fn max_image_bytes(&self) -> usize {
        self.max_image_bytes
    }

    pub fn inference(&self) -> &InferenceConfig {
        &self.inference
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_number<T>(name: &'static str, value: Option<String>) -> ConfigResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    non_blank(value)
        .map(|v| {
            v.parse::<T>().map_err(|e| ConfigError::Invalid {
                name,
                reason: format!("'{}': {}", v, e),
            })
        })
        .transpose()
}

fn parse_api_url(raw: &str) -> ConfigResult<reqwest::Url> {
    let cleaned = raw.trim().trim_end_matches('/');
    let url = reqwest::Url::parse(cleaned).map_err(|e| ConfigError::Invalid {
        name: "MEDASSIST_LLM_URL",
        reason: format!("'{}': {}", cleaned, e),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid {
            name: "MEDASSIST_LLM_URL",
            reason: format!("must use http or https, got {}", url.scheme()),
        });
    }

    if !url.username().is_empty() || url.password().is_some() {
        return Err(ConfigError::Invalid {
            name: "MEDASSIST_LLM_URL",
            reason: "must not contain credentials".into(),
        });
    }

    Ok(url)
}

#[cfg(test)]
pub(crate) fn test_inference_config() -> InferenceConfig {
    InferenceConfig::new(
        "https://llm.example.test/v1",
        "test-key",
        "test-model",
        Duration::from_secs(5),
        DEFAULT_MAX_OUTPUT_TOKENS,
        DEFAULT_MAX_RETRIES,
    )
    .expect("valid test config")
}
