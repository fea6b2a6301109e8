//! Wire types for the analysis API.
//!
//! These mirror the canonical results in `medassist-core` one-to-one and add OpenAPI schemas.
//! Field names are camelCase on the wire.

use base64::{engine::general_purpose, Engine as _};
use medassist_core::{
    AnalysisError, DiagnosisAnalysis, PrescriptionAnalysis, PrescriptionImage, VitalsAnalysis,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// A prescription photo, either inline or by reference. Exactly one field must be set.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionAnalysisReq {
    /// Base64 image bytes, or a complete `data:` URI.
    pub image_base64: Option<String>,
    /// `http(s)` URL the inference service can fetch.
    pub image_uri: Option<String>,
}

impl TryFrom<PrescriptionAnalysisReq> for PrescriptionImage {
    type Error = AnalysisError;

    fn try_from(req: PrescriptionAnalysisReq) -> Result<Self, Self::Error> {
        let inline = req.image_base64.filter(|s| !s.trim().is_empty());
        let uri = req.image_uri.filter(|s| !s.trim().is_empty());

        match (inline, uri) {
            (Some(_), Some(_)) => Err(AnalysisError::invalid_request(
                "provide either imageBase64 or imageUri, not both",
            )),
            (None, None) => Err(AnalysisError::invalid_request(
                "one of imageBase64 or imageUri is required",
            )),
            (None, Some(uri)) => Ok(PrescriptionImage::Uri(uri)),
            (Some(inline), None) if inline.trim_start().starts_with("data:") => {
                Ok(PrescriptionImage::Uri(inline))
            }
            (Some(inline), None) => {
                let compact: String = inline.chars().filter(|c| !c.is_whitespace()).collect();
                general_purpose::STANDARD
                    .decode(compact.as_bytes())
                    .map(PrescriptionImage::Bytes)
                    .map_err(|e| {
                        AnalysisError::invalid_request(format!("imageBase64 is not valid base64: {}", e))
                    })
            }
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SymptomsAnalysisReq {
    /// Free-text symptoms, most relevant first.
    pub symptoms: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VitalsAnalysisParams {
    /// One of `week`, `month`, `quarter`, `all`. Defaults to `month`.
    pub period: Option<String>,
}

/// Error body returned with every non-2xx analysis response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    /// Stable snake_case error kind, e.g. `quota_exceeded`.
    pub kind: String,
    /// Text suitable for showing to the user.
    pub message: String,
    /// What was wrong with the request. Only present for `invalid_request`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl From<&AnalysisError> for ErrorRes {
    fn from(err: &AnalysisError) -> Self {
        let detail = match err.kind() {
            medassist_core::ErrorKind::InvalidRequest => Some(err.message().to_string()),
            _ => None,
        };
        Self {
            kind: err.kind().as_str().to_string(),
            message: err.user_message(),
            detail,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatientInfoDto {
    pub name: Option<String>,
    pub age: Option<String>,
    pub gender: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DoctorInfoDto {
    pub name: Option<String>,
    pub specialty: Option<String>,
    pub license_number: Option<String>,
    pub clinic: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MedicationDto {
    pub name: String,
    pub dosage: Option<String>,
    pub route: Option<String>,
    pub frequency: Option<String>,
    pub duration: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionAnalysisRes {
    pub patient_info: Option<PatientInfoDto>,
    pub doctor_info: Option<DoctorInfoDto>,
    pub diagnosis: Option<String>,
    pub medications: Vec<MedicationDto>,
    pub special_instructions: Vec<String>,
    pub prescription_date: Option<String>,
    /// `high`, `medium`, `low` or `unknown`.
    pub raw_confidence: String,
    pub warnings: Vec<String>,
}

impl From<PrescriptionAnalysis> for PrescriptionAnalysisRes {
    fn from(p: PrescriptionAnalysis) -> Self {
        Self {
            patient_info: p.patient_info.map(|i| PatientInfoDto {
                name: i.name,
                age: i.age,
                gender: i.gender,
            }),
            doctor_info: p.doctor_info.map(|d| DoctorInfoDto {
                name: d.name,
                specialty: d.specialty,
                license_number: d.license_number,
                clinic: d.clinic,
            }),
            diagnosis: p.diagnosis,
            medications: p
                .medications
                .into_iter()
                .map(|m| MedicationDto {
                    name: m.name,
                    dosage: m.dosage,
                    route: m.route,
                    frequency: m.frequency,
                    duration: m.duration,
                })
                .collect(),
            special_instructions: p.special_instructions,
            prescription_date: p.prescription_date,
            raw_confidence: p.raw_confidence.as_str().to_string(),
            warnings: p.warnings,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisDto {
    pub condition: String,
    /// `high`, `medium`, `low` or `unknown`.
    pub confidence: String,
    pub matching_symptoms: Vec<String>,
    pub testing_recommendations: Vec<String>,
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisAnalysisRes {
    /// Most likely first.
    pub possible_diagnoses: Vec<DiagnosisDto>,
    pub warnings: Vec<String>,
}

impl From<DiagnosisAnalysis> for DiagnosisAnalysisRes {
    fn from(d: DiagnosisAnalysis) -> Self {
        Self {
            possible_diagnoses: d
                .possible_diagnoses
                .into_iter()
                .map(|x| DiagnosisDto {
                    condition: x.condition,
                    confidence: x.confidence.as_str().to_string(),
                    matching_symptoms: x.matching_symptoms,
                    testing_recommendations: x.testing_recommendations,
                    description: x.description,
                })
                .collect(),
            warnings: d.warnings,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VitalsAnalysisRes {
    /// Trend description keyed by metric, e.g. `heartRate`.
    pub trends: BTreeMap<String, String>,
    pub concerns: Vec<String>,
    pub recommendations: Vec<String>,
    pub warnings: Vec<String>,
}

impl From<VitalsAnalysis> for VitalsAnalysisRes {
    fn from(v: VitalsAnalysis) -> Self {
        Self {
            trends: v.trends,
            concerns: v.concerns,
            recommendations: v.recommendations,
            warnings: v.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medassist_core::{Confidence, ErrorKind, Medication};

    fn req(image_base64: Option<&str>, image_uri: Option<&str>) -> PrescriptionAnalysisReq {
        PrescriptionAnalysisReq {
            image_base64: image_base64.map(String::from),
            image_uri: image_uri.map(String::from),
        }
    }

    #[test]
    fn prescription_request_requires_exactly_one_source() {
        for r in [req(None, None), req(Some("AAAA"), Some("https://x.test/a.png")), req(Some(" "), None)] {
            let err = PrescriptionImage::try_from(r).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        }
    }

    #[test]
    fn prescription_request_decodes_base64_and_keeps_uris() {
        let image = PrescriptionImage::try_from(req(Some("iVBORw0KGgo="), None)).unwrap();
        assert_eq!(
            image,
            PrescriptionImage::Bytes(vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A])
        );

        let image =
            PrescriptionImage::try_from(req(Some("data:image/png;base64,iVBORw0KGgo="), None))
                .unwrap();
        assert!(matches!(image, PrescriptionImage::Uri(u) if u.starts_with("data:")));

        let image = PrescriptionImage::try_from(req(None, Some("https://x.test/a.png"))).unwrap();
        assert_eq!(image, PrescriptionImage::Uri("https://x.test/a.png".into()));

        let err = PrescriptionImage::try_from(req(Some("not base64!"), None)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn error_body_hides_detail_except_for_caller_errors() {
        let quota = ErrorRes::from(&AnalysisError::new(ErrorKind::QuotaExceeded, "plan exhausted"));
        assert_eq!(quota.kind, "quota_exceeded");
        assert!(quota.message.contains("plan exhausted"));
        assert_eq!(quota.detail, None);

        let timeout = ErrorRes::from(&AnalysisError::new(ErrorKind::Timeout, "attempt 2 after 60s"));
        assert!(!timeout.message.contains("60s"));
        assert_eq!(timeout.detail, None);

        let invalid = ErrorRes::from(&AnalysisError::invalid_request("at least one symptom is required"));
        assert_eq!(invalid.detail.as_deref(), Some("at least one symptom is required"));
    }

    #[test]
    fn prescription_response_serialises_camel_case() {
        let res = PrescriptionAnalysisRes::from(PrescriptionAnalysis {
            patient_info: None,
            doctor_info: None,
            diagnosis: None,
            medications: vec![Medication {
                name: "Amoxicillin".into(),
                dosage: None,
                route: None,
                frequency: None,
                duration: None,
            }],
            special_instructions: vec![],
            prescription_date: None,
            raw_confidence: Confidence::Medium,
            warnings: vec!["missing dosage for Amoxicillin".into()],
        });
        let json = serde_json::to_value(&res).unwrap();
        assert_eq!(json["rawConfidence"], "medium");
        assert!(json["medications"][0]["dosage"].is_null());
        assert!(json["specialInstructions"].is_array());
    }
}
