//! Clinical sanity checks on normalized results.
//!
//! Validation only appends warnings. It never removes, reorders or edits clinical data.

use crate::normalizer::Normalized;
use crate::results::{
    CanonicalResult, Confidence, DiagnosisAnalysis, PrescriptionAnalysis, VitalsAnalysis,
};

/// Validates whichever canonical result `normalized` holds.
pub fn validate(normalized: Normalized<CanonicalResult>) -> CanonicalResult {
    let dropped_entries = normalized.dropped_entries;
    match normalized.result {
        CanonicalResult::Prescription(result) => CanonicalResult::Prescription(
            validate_prescription(Normalized {
                result,
                dropped_entries,
            }),
        ),
        CanonicalResult::Diagnosis(result) => CanonicalResult::Diagnosis(validate_diagnosis(
            Normalized {
                result,
                dropped_entries,
            },
        )),
        CanonicalResult::Vitals(result) => CanonicalResult::Vitals(validate_vitals(Normalized {
            result,
            dropped_entries,
        })),
    }
}

pub fn validate_prescription(normalized: Normalized<PrescriptionAnalysis>) -> PrescriptionAnalysis {
    let Normalized {
        result: mut analysis,
        dropped_entries,
    } = normalized;

    let mut warnings = Vec::new();
    for medication in &analysis.medications {
        if medication.dosage.is_none() {
            warnings.push(format!("missing dosage for {}", medication.name));
        }
        if medication.frequency.is_none() {
            warnings.push(format!("missing frequency for {}", medication.name));
        }
    }
    if dropped_entries > 0 {
        warnings.push(format!(
            "{} medication entries could not be read",
            dropped_entries
        ));
    }
    if analysis.medications.is_empty() {
        warnings.push("no medications could be identified on the prescription".to_string());
    }
    match analysis.raw_confidence {
        Confidence::Unknown => {
            warnings.push("extraction confidence could not be determined".to_string())
        }
        Confidence::Low => warnings.push(
            "extraction confidence is low; verify against the original prescription".to_string(),
        ),
        Confidence::High | Confidence::Medium => {}
    }

    append_unique(&mut analysis.warnings, warnings);
    analysis
}

pub fn validate_diagnosis(normalized: Normalized<DiagnosisAnalysis>) -> DiagnosisAnalysis {
    let mut analysis = normalized.result;

    let mut warnings = Vec::new();
    if analysis.possible_diagnoses.is_empty() {
        warnings.push("no possible diagnoses were returned".to_string());
    }
    for diagnosis in &analysis.possible_diagnoses {
        if diagnosis.confidence == Confidence::Unknown {
            warnings.push(format!(
                "confidence for {} is not one of high, medium, low",
                diagnosis.condition
            ));
        }
        if diagnosis.matching_symptoms.is_empty() {
            warnings.push(format!(
                "{} does not cite any of the reported symptoms",
                diagnosis.condition
            ));
        }
    }

    append_unique(&mut analysis.warnings, warnings);
    analysis
}

pub fn validate_vitals(normalized: Normalized<VitalsAnalysis>) -> VitalsAnalysis {
    let mut analysis = normalized.result;
    if analysis.trends.is_empty() {
        append_unique(
            &mut analysis.warnings,
            vec!["no vitals trends were returned".to_string()],
        );
    }
    analysis
}

/// Appends `new` to `warnings`, skipping anything already present. First occurrence wins.
fn append_unique(warnings: &mut Vec<String>, new: Vec<String>) {
    for warning in new {
        if !warnings.contains(&warning) {
            warnings.push(warning);
        }
    }
}
