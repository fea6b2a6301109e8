//! # API Shared
//!
//! Shared definitions for the MedAssist APIs.
//!
//! Contains:
//! - Request and response DTOs with OpenAPI schemas (`dto` module)
//! - Shared services like `HealthService`
//!
//! Used by `api-rest` and the `medassist-run` binary.

pub mod dto;
pub mod health;

pub use dto::*;
pub use health::HealthService;
