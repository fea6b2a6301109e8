//! Constants used throughout the MedAssist core crate.
//!
//! Defaults here are example production values; every one of them can be overridden through
//! [`crate::config::CoreConfig`].

use std::time::Duration;

/// Default directory for patient data storage when no explicit directory is configured.
pub const DEFAULT_PATIENT_DATA_DIR: &str = "patient_data";

/// Directory name for recorded vitals, below the patient data directory.
pub const VITALS_DIR_NAME: &str = "vitals";

/// Filename for a patient's recorded vitals series.
pub const VITALS_FILENAME: &str = "vitals.yaml";

/// Default model requested from the inference capability.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default per-call timeout for a single inference attempt.
pub const DEFAULT_INFERENCE_TIMEOUT: Duration = Duration::from_secs(60);

/// Default ceiling on generated output, in tokens.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2000;

/// Upper bound accepted for the output ceiling.
pub const MAX_OUTPUT_TOKENS_LIMIT: u32 = 8192;

/// Extra attempts after a transient failure. Never more than one.
pub const DEFAULT_MAX_RETRIES: u32 = 1;

/// Hard upper bound on retries against the metered capability.
pub const MAX_RETRIES_LIMIT: u32 = 1;

/// Default maximum accepted size of a prescription image.
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// Sampling temperature for analysis requests. Kept low to favour extraction over invention.
pub const ANALYSIS_TEMPERATURE: f32 = 0.2;
