//! Patient identifiers and sharded-path utilities.
//!
//! MedAssist refers to patients by a *canonical* UUID representation: **32 lowercase hexadecimal
//! characters** (no hyphens), for example `550e8400e29b41d4a716446655440000`.
//!
//! Canonical form is required for externally supplied identifiers (CLI arguments, REST path
//! parameters). Non-canonical values (uppercase, hyphenated, wrong length, non-hex) are rejected
//! rather than normalised, so the same patient can never map to two storage locations.
//!
//! ## Sharded directory layout
//! For a canonical UUID `u`, per-patient data lives under:
//! `parent_dir/<u[0..2]>/<u[2..4]>/<u>/`
//!
//! Example:
//! `patient_data/vitals/55/0e/550e8400e29b41d4a716446655440000/`

mod patient_id;

pub use patient_id::{PatientId, Uuid};

/// Error type for UUID operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for UUID operations.
pub type UuidResult<T> = Result<T, UuidError>;
