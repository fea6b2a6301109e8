//! Canonical analysis results.
//!
//! These are the only shapes that leave the pipeline. They serialise with camelCase field
//! names and explicit `null` for absent values, so a serialised result can be fed back through
//! the normalizer unchanged.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Confidence bucket reported by the model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
    /// Missing, or not one of high, medium, low.
    #[default]
    Unknown,
}

impl Confidence {
    /// Case-insensitive match against the closed enumeration; anything else is `Unknown`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "high" => Confidence::High,
            "medium" => Confidence::Medium,
            "low" => Confidence::Low,
            _ => Confidence::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
            Confidence::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall legibility of a prescription, as judged by the model.
pub type RawConfidence = Confidence;

/// Confidence attached to a single diagnosis.
pub type DiagnosisConfidence = Confidence;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientInfo {
    pub name: Option<String>,
    pub age: Option<String>,
    pub gender: Option<String>,
}

impl PatientInfo {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.age.is_none() && self.gender.is_none()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorInfo {
    pub name: Option<String>,
    pub specialty: Option<String>,
    pub license_number: Option<String>,
    pub clinic: Option<String>,
}

impl DoctorInfo {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.specialty.is_none()
            && self.license_number.is_none()
            && self.clinic.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    pub name: String,
    pub dosage: Option<String>,
    pub route: Option<String>,
    pub frequency: Option<String>,
    pub duration: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionAnalysis {
    pub patient_info: Option<PatientInfo>,
    pub doctor_info: Option<DoctorInfo>,
    pub diagnosis: Option<String>,
    pub medications: Vec<Medication>,
    pub special_instructions: Vec<String>,
    pub prescription_date: Option<String>,
    pub raw_confidence: RawConfidence,
    pub warnings: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnosis {
    pub condition: String,
    pub confidence: DiagnosisConfidence,
    pub matching_symptoms: Vec<String>,
    pub testing_recommendations: Vec<String>,
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisAnalysis {
    pub possible_diagnoses: Vec<Diagnosis>,
    pub warnings: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalsAnalysis {
    /// Trend description keyed by metric name.
    pub trends: BTreeMap<String, String>,
    pub concerns: Vec<String>,
    pub recommendations: Vec<String>,
    pub warnings: Vec<String>,
}

/// One canonical result per use case. Matched exhaustively wherever it is consumed.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "useCase", content = "result", rename_all = "snake_case")]
pub enum CanonicalResult {
    Prescription(PrescriptionAnalysis),
    Diagnosis(DiagnosisAnalysis),
    Vitals(VitalsAnalysis),
}
