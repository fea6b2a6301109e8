//! # MedAssist Core
//!
//! The AI-assisted clinical analysis pipeline.
//!
//! Every analysis runs the same stages:
//! - [`prompt`]: builds an instruction and output schema for the request
//! - [`gateway`]: calls the inference capability with a deadline, one retry and cancellation
//! - [`normalizer`]: maps raw model JSON onto the canonical [`results`]
//! - [`validator`]: appends clinical warnings without touching the data
//!
//! [`AnalysisService`] exposes the three inbound operations. Recorded vitals are read through
//! [`VitalsSource`]; [`FileVitalsStore`] keeps them as sharded YAML under `PATIENT_DATA_DIR`.
//!
//! **No API concerns**: HTTP servers and command-line handling belong in `api-rest` and `cli`.

pub mod cancel;
pub mod capability;
pub mod config;
pub mod constants;
pub mod error;
pub mod gateway;
pub mod image;
pub mod normalizer;
pub mod orchestrators;
pub mod prompt;
pub mod request;
pub mod results;
pub mod service;
pub mod validator;
pub mod vitals_store;

pub use cancel::{CancelSource, CancelToken};
pub use capability::{CapabilityRequest, InferenceCapability, OpenAiCompatibleCapability};
pub use config::{ConfigError, ConfigResult, CoreConfig, InferenceConfig};
pub use error::{AnalysisError, AnalysisResult, ErrorKind};
pub use gateway::{InferenceGateway, InferenceResult};
pub use prompt::{PromptBuilder, PromptSpec};
pub use request::{
    AnalysisRequest, PrescriptionImage, SymptomSet, UseCase, VitalReading, VitalsPeriod,
    VitalsQuery, VitalsRequest,
};
pub use results::{
    CanonicalResult, Confidence, Diagnosis, DiagnosisAnalysis, DiagnosisConfidence, DoctorInfo,
    Medication, PatientInfo, PrescriptionAnalysis, RawConfidence, VitalsAnalysis,
};
pub use service::AnalysisService;
pub use vitals_store::{FileVitalsStore, VitalsSource};

pub use medassist_uuid::PatientId;
