//! Maps raw model JSON onto the canonical result types.
//!
//! Model output is loosely typed, so the wire structs here hold `serde_json::Value` fields and
//! every value is decoded leniently: wrong types and placeholder strings become absent, array
//! entries of the wrong shape are dropped and counted. Nothing is ever invented.
//!
//! Normalizing is idempotent: feeding a serialised canonical result back in yields the same
//! result, including any warnings the validator attached to it.

use crate::error::{AnalysisError, AnalysisResult};
use crate::request::{AnalysisRequest, SymptomSet, UseCase};
use crate::results::{
    CanonicalResult, Confidence, Diagnosis, DiagnosisAnalysis, DoctorInfo, Medication,
    PatientInfo, PrescriptionAnalysis, VitalsAnalysis,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Strings models use to mean "nothing here".
const PLACEHOLDERS: &[&str] = &["null", "n/a", "none", "unknown"];

/// A normalized result plus the number of array entries that had to be dropped.
#[derive(Clone, Debug, PartialEq)]
pub struct Normalized<T> {
    pub result: T,
    pub dropped_entries: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PrescriptionWire {
    #[serde(alias = "patient_info", alias = "patient")]
    patient_info: Value,
    #[serde(alias = "doctor_info", alias = "doctor")]
    doctor_info: Value,
    diagnosis: Value,
    medications: Value,
    #[serde(alias = "special_instructions")]
    special_instructions: Value,
    #[serde(alias = "prescription_date", alias = "date")]
    prescription_date: Value,
    #[serde(alias = "rawConfidence", alias = "raw_confidence")]
    confidence: Value,
    warnings: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PatientInfoWire {
    name: Value,
    age: Value,
    #[serde(alias = "sex")]
    gender: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DoctorInfoWire {
    name: Value,
    #[serde(alias = "speciality")]
    specialty: Value,
    #[serde(alias = "license_number", alias = "license", alias = "registrationNumber")]
    license_number: Value,
    #[serde(alias = "hospital")]
    clinic: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MedicationWire {
    #[serde(alias = "medication", alias = "drug")]
    name: Value,
    #[serde(alias = "dose")]
    dosage: Value,
    route: Value,
    frequency: Value,
    duration: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DiagnosisWire {
    #[serde(alias = "possible_diagnoses", alias = "diagnoses")]
    possible_diagnoses: Value,
    warnings: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DiagnosisEntryWire {
    #[serde(alias = "name", alias = "diagnosis")]
    condition: Value,
    confidence: Value,
    #[serde(alias = "matching_symptoms")]
    matching_symptoms: Value,
    #[serde(alias = "testing_recommendations", alias = "recommendedTests")]
    testing_recommendations: Value,
    description: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VitalsWire {
    trends: Value,
    concerns: Value,
    recommendations: Value,
    warnings: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TrendEntryWire {
    #[serde(alias = "name")]
    metric: Value,
    #[serde(alias = "trend", alias = "summary")]
    description: Value,
}

/// Normalizes `raw` for the use case of `request`. Diagnosis results are checked against the
/// symptoms in the request.
pub fn normalize(
    request: &AnalysisRequest,
    raw: Value,
) -> AnalysisResult<Normalized<CanonicalResult>> {
    let normalized = match request {
        AnalysisRequest::PrescriptionImage(_) => {
            let n = normalize_prescription(raw)?;
            Normalized {
                result: CanonicalResult::Prescription(n.result),
                dropped_entries: n.dropped_entries,
            }
        }
        AnalysisRequest::SymptomSet(symptoms) => {
            let n = normalize_diagnosis(raw, symptoms)?;
            Normalized {
                result: CanonicalResult::Diagnosis(n.result),
                dropped_entries: n.dropped_entries,
            }
        }
        AnalysisRequest::Vitals(_) => {
            let n = normalize_vitals(raw)?;
            Normalized {
                result: CanonicalResult::Vitals(n.result),
                dropped_entries: n.dropped_entries,
            }
        }
    };
    Ok(normalized)
}

pub fn normalize_prescription(raw: Value) -> AnalysisResult<Normalized<PrescriptionAnalysis>> {
    let wire: PrescriptionWire = decode(raw, UseCase::Prescription)?;

    let patient_info = sub_object::<PatientInfoWire>(&wire.patient_info)
        .map(|p| PatientInfo {
            name: text(&p.name),
            age: text_or_number(&p.age),
            gender: text(&p.gender),
        })
        .filter(|p| !p.is_empty());

    let doctor_info = sub_object::<DoctorInfoWire>(&wire.doctor_info)
        .map(|d| DoctorInfo {
            name: text(&d.name),
            specialty: text(&d.specialty),
            license_number: text_or_number(&d.license_number),
            clinic: text(&d.clinic),
        })
        .filter(|d| !d.is_empty());

    let (entries, mut dropped) = object_array::<MedicationWire>(&wire.medications);
    let mut medications = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(name) = text(&entry.name) else {
            dropped += 1;
            continue;
        };
        medications.push(Medication {
            name,
            dosage: text_or_number(&entry.dosage),
            route: text(&entry.route),
            frequency: text(&entry.frequency),
            duration: text_or_number(&entry.duration),
        });
    }
    log_dropped(UseCase::Prescription, "medication", dropped);

    Ok(Normalized {
        result: PrescriptionAnalysis {
            patient_info,
            doctor_info,
            diagnosis: text(&wire.diagnosis),
            medications,
            special_instructions: string_list(&wire.special_instructions),
            prescription_date: text(&wire.prescription_date),
            raw_confidence: confidence(&wire.confidence),
            warnings: warning_list(&wire.warnings),
        },
        dropped_entries: dropped,
    })
}

/// `matchingSymptoms` is narrowed to the reported symptoms, using the caller's spelling.
pub fn normalize_diagnosis(
    raw: Value,
    symptoms: &SymptomSet,
) -> AnalysisResult<Normalized<DiagnosisAnalysis>> {
    let wire: DiagnosisWire = decode(raw, UseCase::Diagnosis)?;

    let (entries, mut dropped) = object_array::<DiagnosisEntryWire>(&wire.possible_diagnoses);
    let mut possible_diagnoses = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(condition) = text(&entry.condition) else {
            dropped += 1;
            continue;
        };

        let mut seen = HashSet::new();
        let matching_symptoms = string_list(&entry.matching_symptoms)
            .iter()
            .filter_map(|s| symptoms.canonical(s))
            .filter(|s| seen.insert(*s))
            .map(str::to_string)
            .collect();

        possible_diagnoses.push(Diagnosis {
            condition,
            confidence: confidence(&entry.confidence),
            matching_symptoms,
            testing_recommendations: string_list(&entry.testing_recommendations),
            description: text(&entry.description),
        });
    }
    log_dropped(UseCase::Diagnosis, "diagnosis", dropped);

    Ok(Normalized {
        result: DiagnosisAnalysis {
            possible_diagnoses,
            warnings: warning_list(&wire.warnings),
        },
        dropped_entries: dropped,
    })
}

/// Trends may arrive as an object keyed by metric or as a list of `{metric, description}`.
pub fn normalize_vitals(raw: Value) -> AnalysisResult<Normalized<VitalsAnalysis>> {
    let wire: VitalsWire = decode(raw, UseCase::Vitals)?;

    let mut trends = BTreeMap::new();
    let mut dropped = 0;
    match &wire.trends {
        Value::Object(map) => {
            for (metric, description) in map {
                match (clean(metric), text(description)) {
                    (Some(metric), Some(description)) => {
                        trends.insert(metric, description);
                    }
                    _ => dropped += 1,
                }
            }
        }
        Value::Array(_) => {
            let (entries, array_dropped) = object_array::<TrendEntryWire>(&wire.trends);
            dropped += array_dropped;
            for entry in entries {
                match (text(&entry.metric), text(&entry.description)) {
                    (Some(metric), Some(description)) => {
                        trends.insert(metric, description);
                    }
                    _ => dropped += 1,
                }
            }
        }
        Value::Null => {}
        _ => dropped += 1,
    }
    log_dropped(UseCase::Vitals, "trend", dropped);

    Ok(Normalized {
        result: VitalsAnalysis {
            trends,
            concerns: string_list(&wire.concerns),
            recommendations: string_list(&wire.recommendations),
            warnings: warning_list(&wire.warnings),
        },
        dropped_entries: dropped,
    })
}

fn decode<T: DeserializeOwned>(raw: Value, use_case: UseCase) -> AnalysisResult<T> {
    if !raw.is_object() {
        return Err(AnalysisError::malformed_output(format!(
            "{} output is not a JSON object",
            use_case
        )));
    }
    serde_json::from_value(raw).map_err(|e| {
        AnalysisError::malformed_output(format!("{} output could not be read: {}", use_case, e))
    })
}

fn sub_object<T: DeserializeOwned>(value: &Value) -> Option<T> {
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}

/// Objects from an array; non-objects are counted as dropped. A missing array is empty.
fn object_array<T: DeserializeOwned>(value: &Value) -> (Vec<T>, usize) {
    match value {
        Value::Null => (Vec::new(), 0),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            let mut dropped = 0;
            for item in items {
                match sub_object::<T>(item) {
                    Some(entry) => out.push(entry),
                    None => dropped += 1,
                }
            }
            (out, dropped)
        }
        _ => (Vec::new(), 1),
    }
}

fn log_dropped(use_case: UseCase, entity: &'static str, dropped: usize) {
    if dropped > 0 {
        tracing::warn!(%use_case, entity, dropped, "dropped unreadable entries from model output");
    }
}

fn clean(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || PLACEHOLDERS
            .iter()
            .any(|p| trimmed.eq_ignore_ascii_case(p))
    {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn text(value: &Value) -> Option<String> {
    value.as_str().and_then(clean)
}

fn text_or_number(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        other => text(other),
    }
}

/// A list of strings. A lone string is treated as a one-element list.
fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(text).collect(),
        Value::String(_) => text(value).into_iter().collect(),
        _ => Vec::new(),
    }
}

/// Warnings already attached to a result, de-duplicated with the first occurrence kept.
fn warning_list(value: &Value) -> Vec<String> {
    let mut warnings: Vec<String> = Vec::new();
    for warning in string_list(value) {
        if !warnings.contains(&warning) {
            warnings.push(warning);
        }
    }
    warnings
}

fn confidence(value: &Value) -> Confidence {
    value
        .as_str()
        .map(Confidence::parse_lenient)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn symptoms() -> SymptomSet {
        SymptomSet::new(["persistent cough", "fever", "fatigue"]).unwrap()
    }

    fn prescription_fixture() -> Value {
        json!({
            "patientInfo": {"name": " Jane Doe ", "age": 45, "gender": "female"},
            "doctorInfo": {"name": "Dr. A. Smith", "specialty": "General Practice", "licenseNumber": "GMC-123456", "clinic": null},
            "diagnosis": "Acute sinusitis",
            "medications": [
                {"name": "Amoxicillin", "dosage": "500 mg", "route": "oral", "frequency": "three times daily", "duration": "7 days"},
                {"name": "Paracetamol", "dosage": 1000, "route": "oral", "frequency": "as needed", "duration": null}
            ],
            "specialInstructions": ["Take after meals", "  ", "N/A"],
            "prescriptionDate": "2026-03-14",
            "confidence": "High"
        })
    }

    #[test]
    fn prescription_fields_map_onto_canonical_shape() {
        let n = normalize_prescription(prescription_fixture()).unwrap();
        let p = n.result;

        assert_eq!(n.dropped_entries, 0);
        let patient = p.patient_info.unwrap();
        assert_eq!(patient.name.as_deref(), Some("Jane Doe"));
        assert_eq!(patient.age.as_deref(), Some("45"));
        assert_eq!(p.doctor_info.unwrap().clinic, None);
        assert_eq!(p.medications.len(), 2);
        assert_eq!(p.medications[1].dosage.as_deref(), Some("1000"));
        assert_eq!(p.medications[1].duration, None);
        assert_eq!(p.special_instructions, vec!["Take after meals"]);
        assert_eq!(p.raw_confidence, Confidence::High);
        assert!(p.warnings.is_empty());
    }

    #[test]
    fn missing_fields_become_absent_not_invented() {
        let n = normalize_prescription(json!({})).unwrap();
        let p = n.result;
        assert_eq!(p.patient_info, None);
        assert_eq!(p.doctor_info, None);
        assert_eq!(p.diagnosis, None);
        assert!(p.medications.is_empty());
        assert!(p.special_instructions.is_empty());
        assert_eq!(p.prescription_date, None);
        assert_eq!(p.raw_confidence, Confidence::Unknown);
        assert_eq!(n.dropped_entries, 0);
    }

    #[test]
    fn malformed_medication_entries_are_dropped_and_counted() {
        let raw = json!({
            "medications": [
                "Amoxicillin 500mg",
                {"name": "  ", "dosage": "5 mg"},
                {"name": "Ibuprofen", "dosage": true},
                42
            ]
        });
        let n = normalize_prescription(raw).unwrap();
        assert_eq!(n.dropped_entries, 3);
        assert_eq!(n.result.medications.len(), 1);
        assert_eq!(n.result.medications[0].name, "Ibuprofen");
        assert_eq!(n.result.medications[0].dosage, None);
    }

    #[test]
    fn placeholder_strings_are_absent() {
        let raw = json!({
            "diagnosis": "None",
            "prescriptionDate": "unknown",
            "patientInfo": {"name": "null", "age": "N/A", "gender": ""}
        });
        let p = normalize_prescription(raw).unwrap().result;
        assert_eq!(p.diagnosis, None);
        assert_eq!(p.prescription_date, None);
        assert_eq!(p.patient_info, None);
    }

    #[test]
    fn matching_symptoms_are_a_subset_of_the_input() {
        let raw = json!({
            "possibleDiagnoses": [{
                "condition": "Bronchitis",
                "confidence": "MEDIUM",
                "matchingSymptoms": ["Persistent Cough", "fever", "night sweats", "fever"],
                "testingRecommendations": ["Chest X-ray"]
            }],
            "disclaimer": "Not a substitute for professional medical advice."
        });
        let input = symptoms();
        let d = normalize_diagnosis(raw, &input).unwrap().result;

        let diagnosis = &d.possible_diagnoses[0];
        assert_eq!(diagnosis.confidence, Confidence::Medium);
        assert_eq!(diagnosis.matching_symptoms, vec!["persistent cough", "fever"]);
        for s in &diagnosis.matching_symptoms {
            assert!(input.iter().any(|i| i == s));
        }
    }

    #[test]
    fn unrecognised_confidence_is_kept_as_unknown() {
        let raw = json!({
            "possibleDiagnoses": [
                {"condition": "Influenza", "confidence": "very likely", "matchingSymptoms": ["fever"]},
                {"confidence": "high"}
            ]
        });
        let n = normalize_diagnosis(raw, &symptoms()).unwrap();
        assert_eq!(n.dropped_entries, 1);
        assert_eq!(n.result.possible_diagnoses.len(), 1);
        assert_eq!(n.result.possible_diagnoses[0].confidence, Confidence::Unknown);
    }

    #[test]
    fn vitals_trends_accept_object_or_list() {
        let from_object = normalize_vitals(json!({
            "trends": {"heartRate": "Stable around 72 bpm", "weight": null},
            "concerns": [],
            "recommendations": ["Keep recording daily"]
        }))
        .unwrap();
        assert_eq!(from_object.result.trends.len(), 1);
        assert_eq!(from_object.dropped_entries, 1);
        assert_eq!(from_object.result.recommendations, vec!["Keep recording daily"]);

        let from_list = normalize_vitals(json!({
            "trends": [{"metric": "heartRate", "trend": "Stable around 72 bpm"}]
        }))
        .unwrap();
        assert_eq!(from_list.result.trends, from_object.result.trends);
    }

    #[test]
    fn non_object_input_is_malformed() {
        let err = normalize_vitals(json!(["not", "an", "object"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedOutput);
    }

    #[test]
    fn normalizing_is_idempotent() {
        let input = symptoms();

        let once = normalize_prescription(prescription_fixture()).unwrap().result;
        let twice = normalize_prescription(serde_json::to_value(&once).unwrap())
            .unwrap()
            .result;
        assert_eq!(once, twice);

        let raw = json!({
            "possibleDiagnoses": [
                {"condition": " Bronchitis ", "confidence": "Medium", "matchingSymptoms": ["FEVER", "cough"], "testingRecommendations": "Chest X-ray", "description": "none"},
                {"condition": "Flu", "confidence": "??"}
            ]
        });
        let once = normalize_diagnosis(raw, &input).unwrap().result;
        let twice = normalize_diagnosis(serde_json::to_value(&once).unwrap(), &input)
            .unwrap()
            .result;
        assert_eq!(once, twice);

        let once = normalize_vitals(json!({"trends": {"weight": " Down 2 kg "}, "concerns": "Rapid weight loss"}))
            .unwrap()
            .result;
        let twice = normalize_vitals(serde_json::to_value(&once).unwrap())
            .unwrap()
            .result;
        assert_eq!(once, twice);
    }

    #[test]
    fn validated_results_survive_a_second_pass() {
        use crate::validator::{validate_diagnosis, validate_prescription, validate_vitals};

        let first = validate_prescription(
            normalize_prescription(json!({
                "medications": [{"name": "Amoxicillin"}, "garbage"],
                "confidence": "high"
            }))
            .unwrap(),
        );
        assert_eq!(
            first.warnings,
            vec![
                "missing dosage for Amoxicillin",
                "missing frequency for Amoxicillin",
                "1 medication entries could not be read",
            ]
        );
        let second = validate_prescription(
            normalize_prescription(serde_json::to_value(&first).unwrap()).unwrap(),
        );
        assert_eq!(first, second);

        let input = symptoms();
        let first = validate_diagnosis(
            normalize_diagnosis(
                json!({"possibleDiagnoses": [{"condition": "Flu", "confidence": "??", "matchingSymptoms": ["fever"]}]}),
                &input,
            )
            .unwrap(),
        );
        assert_eq!(first.warnings, vec!["confidence for Flu is not one of high, medium, low"]);
        let second = validate_diagnosis(
            normalize_diagnosis(serde_json::to_value(&first).unwrap(), &input).unwrap(),
        );
        assert_eq!(first, second);

        let first = validate_vitals(normalize_vitals(json!({"concerns": []})).unwrap());
        assert_eq!(first.warnings, vec!["no vitals trends were returned"]);
        let second =
            validate_vitals(normalize_vitals(serde_json::to_value(&first).unwrap()).unwrap());
        assert_eq!(first, second);
    }

    #[test]
    fn repeated_warnings_collapse_to_one() {
        let n = normalize_vitals(json!({"warnings": ["check scale", " check scale ", "n/a"]})).unwrap();
        assert_eq!(n.result.warnings, vec!["check scale"]);
    }

    #[test]
    fn dispatch_follows_the_request() {
        let request = AnalysisRequest::SymptomSet(symptoms());
        let n = normalize(&request, json!({"possibleDiagnoses": []})).unwrap();
        assert!(matches!(n.result, CanonicalResult::Diagnosis(_)));
    }
}
