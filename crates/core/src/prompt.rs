//! Prompt construction.
//!
//! A [`PromptSpec`] is built fresh for every request and never mutated afterwards. The expected
//! JSON shape is written into the instruction text and also carried separately so the
//! capability can switch on its structured-output mode.

use crate::error::{AnalysisError, AnalysisResult};
use crate::image::{prepare_image, ImageAttachment};
use crate::request::{AnalysisRequest, SymptomSet, UseCase, VitalReading, VitalsRequest};
use serde_json::{json, Value};
use std::fmt::Write as _;

/// Metric keys the vitals prompt asks the model to use.
pub const VITALS_METRICS: &[(&str, &str)] = &[
    ("heartRate", "heart rate"),
    ("bloodPressure", "blood pressure"),
    ("temperature", "temperature"),
    ("respiratoryRate", "respiratory rate"),
    ("oxygenSaturation", "oxygen saturation"),
    ("bloodGlucose", "blood glucose"),
    ("weight", "weight"),
];

/// An immutable, fully built instruction for one inference call.
#[derive(Clone, Debug, PartialEq)]
pub struct PromptSpec {
    use_case: UseCase,
    instruction: String,
    output_schema: Value,
    attachment: Option<ImageAttachment>,
}

impl PromptSpec {
    pub fn use_case(&self) -> UseCase {
        self.use_case
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    /// Example of the JSON document the model must return.
    pub fn output_schema(&self) -> &Value {
        &self.output_schema
    }

    pub fn attachment(&self) -> Option<&ImageAttachment> {
        self.attachment.as_ref()
    }
}

/// Builds task-specific prompts. Holds only the image size limit.
#[derive(Clone, Copy, Debug)]
pub struct PromptBuilder {
    max_image_bytes: usize,
}

impl PromptBuilder {
    pub fn new(max_image_bytes: usize) -> Self {
        Self { max_image_bytes }
    }

    /// Builds the prompt for `request`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` when the payload is empty or malformed: an image that is not a
    /// supported raster format, or a vitals request without any readings.
    pub fn build(&self, request: &AnalysisRequest) -> AnalysisResult<PromptSpec> {
        let prompt = match request {
            AnalysisRequest::PrescriptionImage(image) => {
                let attachment = prepare_image(image, self.max_image_bytes)?;
                PromptSpec {
                    use_case: UseCase::Prescription,
                    instruction: prescription_instruction(),
                    output_schema: prescription_schema(),
                    attachment: Some(attachment),
                }
            }
            AnalysisRequest::SymptomSet(symptoms) => PromptSpec {
                use_case: UseCase::Diagnosis,
                instruction: diagnosis_instruction(symptoms),
                output_schema: diagnosis_schema(),
                attachment: None,
            },
            AnalysisRequest::Vitals(vitals) => PromptSpec {
                use_case: UseCase::Vitals,
                instruction: vitals_instruction(vitals)?,
                output_schema: vitals_schema(),
                attachment: None,
            },
        };

        tracing::debug!(
            use_case = %prompt.use_case,
            instruction_chars = prompt.instruction.len(),
            has_attachment = prompt.attachment.is_some(),
            "built prompt"
        );

        Ok(prompt)
    }
}

pub(crate) fn prescription_schema() -> Value {
    json!({
        "patientInfo": {
            "name": "string or null",
            "age": "string or null",
            "gender": "string or null"
        },
        "doctorInfo": {
            "name": "string or null",
            "specialty": "string or null",
            "licenseNumber": "string or null",
            "clinic": "string or null"
        },
        "diagnosis": "string or null",
        "medications": [{
            "name": "string",
            "dosage": "string or null",
            "route": "string or null",
            "frequency": "string or null",
            "duration": "string or null"
        }],
        "specialInstructions": ["string"],
        "prescriptionDate": "string or null",
        "confidence": "high | medium | low"
    })
}

pub(crate) fn diagnosis_schema() -> Value {
    json!({
        "possibleDiagnoses": [{
            "condition": "string",
            "confidence": "high | medium | low",
            "matchingSymptoms": ["string"],
            "testingRecommendations": ["string"],
            "description": "string or null"
        }],
        "disclaimer": "string"
    })
}

pub(crate) fn vitals_schema() -> Value {
    json!({
        "trends": { "<metric key>": "string" },
        "concerns": ["string"],
        "recommendations": ["string"]
    })
}

fn render_schema(schema: &Value) -> String {
    serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string())
}

fn prescription_instruction() -> String {
    format!(
        "You are assisting a clinician by transcribing a photographed medical prescription.\n\
         Extract exactly the following six categories of information from the attached image:\n\
         1. Patient information: name, age, gender.\n\
         2. Doctor information: name, specialty, license or registration number, clinic or hospital.\n\
         3. Diagnosis, if written on the prescription.\n\
         4. Medication list. For every medication give: name, dosage, route of administration, \
            frequency, duration.\n\
         5. Special instructions (for example \"take after meals\", \"avoid alcohol\").\n\
         6. Prescription date.\n\n\
         Rules:\n\
         - Transcribe only what is written. Do not guess or complete illegible text.\n\
         - Use an explicit null for any field that is absent or unreadable.\n\
         - Keep medications in the order they appear on the prescription.\n\
         - Set \"confidence\" to high, medium or low to reflect how legible the prescription was.\n\
         - Respond with a single JSON object of exactly this shape and nothing else:\n{}",
        render_schema(&prescription_schema())
    )
}

fn diagnosis_instruction(symptoms: &SymptomSet) -> String {
    let mut listed = String::new();
    for symptom in symptoms.iter() {
        let _ = writeln!(listed, "- {}", symptom);
    }

    format!(
        "You are assisting a clinician with a differential diagnosis.\n\
         The patient reports the following symptoms:\n{}\n\
         List the possible diagnoses ranked from most to least likely. For each diagnosis give:\n\
         - \"condition\": the name of the condition.\n\
         - \"confidence\": exactly one of high, medium or low.\n\
         - \"matchingSymptoms\": the reported symptoms that support it, copied verbatim from the \
           list above. Never add symptoms that were not reported.\n\
         - \"testingRecommendations\": tests that would confirm or rule it out.\n\
         - \"description\": one sentence, or null.\n\
         Include a short \"disclaimer\" reminding the reader this is not a substitute for \
         professional medical advice.\n\
         Respond with a single JSON object of exactly this shape and nothing else:\n{}",
        listed,
        render_schema(&diagnosis_schema())
    )
}

fn vitals_instruction(vitals: &VitalsRequest) -> AnalysisResult<String> {
    let mut readings: Vec<&VitalReading> = vitals
        .readings
        .iter()
        .filter(|r| r.has_measurements())
        .collect();
    if readings.is_empty() {
        return Err(AnalysisError::invalid_request(format!(
            "no vitals recorded for patient {} in period '{}'",
            vitals.query.patient_id, vitals.query.period
        )));
    }
    readings.sort_by_key(|r| r.recorded_at);

    let mut table = String::new();
    for reading in &readings {
        let _ = writeln!(table, "- {}", render_reading(reading));
    }

    let present: Vec<&str> = VITALS_METRICS
        .iter()
        .filter(|(key, _)| readings.iter().any(|r| metric_present(key, r)))
        .map(|(key, _)| *key)
        .collect();

    Ok(format!(
        "You are assisting a clinician reviewing a patient's recorded vital signs over the \
         period '{}'.\n\
         Readings in chronological order:\n{}\n\
         For each of these metrics give a one-sentence trend description under \"trends\", \
         using these keys: {}.\n\
         List any clinically relevant \"concerns\" and practical \"recommendations\". Use empty \
         lists when there are none. Do not invent readings.\n\
         Respond with a single JSON object of exactly this shape and nothing else:\n{}",
        vitals.query.period,
        table,
        present.join(", "),
        render_schema(&vitals_schema())
    ))
}

fn metric_present(key: &str, reading: &VitalReading) -> bool {
    match key {
        "heartRate" => reading.heart_rate.is_some(),
        "bloodPressure" => reading.systolic.is_some() || reading.diastolic.is_some(),
        "temperature" => reading.temperature_c.is_some(),
        "respiratoryRate" => reading.respiratory_rate.is_some(),
        "oxygenSaturation" => reading.oxygen_saturation.is_some(),
        "bloodGlucose" => reading.blood_glucose.is_some(),
        "weight" => reading.weight_kg.is_some(),
        _ => false,
    }
}

fn render_reading(reading: &VitalReading) -> String {
    let mut parts = vec![reading.recorded_at.format("%Y-%m-%d %H:%M UTC").to_string()];

    if let Some(hr) = reading.heart_rate {
        parts.push(format!("heart rate {hr} bpm"));
    }
    match (reading.systolic, reading.diastolic) {
        (Some(s), Some(d)) => parts.push(format!("blood pressure {s}/{d} mmHg")),
        (Some(s), None) => parts.push(format!("systolic {s} mmHg")),
        (None, Some(d)) => parts.push(format!("diastolic {d} mmHg")),
        (None, None) => {}
    }
    if let Some(t) = reading.temperature_c {
        parts.push(format!("temperature {t} C"));
    }
    if let Some(rr) = reading.respiratory_rate {
        parts.push(format!("respiratory rate {rr} /min"));
    }
    if let Some(spo2) = reading.oxygen_saturation {
        parts.push(format!("oxygen saturation {spo2}%"));
    }
    if let Some(glucose) = reading.blood_glucose {
        parts.push(format!("blood glucose {glucose} mmol/L"));
    }
    if let Some(weight) = reading.weight_kg {
        parts.push(format!("weight {weight} kg"));
    }
    if let Some(notes) = reading.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        parts.push(format!("note: {notes}"));
    }

    parts.join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::image::fixtures::{PDF, PNG};
    use crate::request::{PrescriptionImage, VitalsPeriod, VitalsQuery};
    use medassist_uuid::PatientId;

    fn builder() -> PromptBuilder {
        PromptBuilder::new(1024 * 1024)
    }

    fn vitals_request(readings: Vec<VitalReading>) -> AnalysisRequest {
        AnalysisRequest::Vitals(VitalsRequest {
            query: VitalsQuery {
                patient_id: PatientId::parse("550e8400e29b41d4a716446655440000").unwrap(),
                period: VitalsPeriod::Week,
            },
            readings,
        })
    }

    #[test]
    fn prescription_prompt_names_six_categories_and_attaches_image() {
        let prompt = builder()
            .build(&AnalysisRequest::PrescriptionImage(PrescriptionImage::Bytes(
                PNG.to_vec(),
            )))
            .unwrap();

        assert_eq!(prompt.use_case(), UseCase::Prescription);
        for marker in ["1. Patient", "2. Doctor", "3. Diagnosis", "4. Medication", "5. Special", "6. Prescription date"] {
            assert!(prompt.instruction().contains(marker), "missing {marker}");
        }
        assert!(!prompt.instruction().contains("7."));
        for field in ["name", "dosage", "route", "frequency", "duration"] {
            assert!(prompt.output_schema()["medications"][0].get(field).is_some());
        }
        assert!(prompt.instruction().contains("explicit null"));
        assert_eq!(
            prompt.attachment().and_then(|a| a.media_type()),
            Some("image/png")
        );
    }

    #[test]
    fn prescription_prompt_rejects_non_raster_images() {
        let err = builder()
            .build(&AnalysisRequest::PrescriptionImage(PrescriptionImage::Bytes(
                PDF.to_vec(),
            )))
            .expect_err("pdf is not a raster image");
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn diagnosis_prompt_lists_every_symptom() {
        let symptoms = SymptomSet::new(["persistent cough", "fever"]).unwrap();
        let prompt = builder()
            .build(&AnalysisRequest::SymptomSet(symptoms))
            .unwrap();

        assert_eq!(prompt.use_case(), UseCase::Diagnosis);
        assert!(prompt.instruction().contains("- persistent cough\n- fever\n"));
        assert!(prompt.instruction().contains("verbatim"));
        assert!(prompt.attachment().is_none());
    }

    #[test]
    fn vitals_prompt_renders_readings_chronologically() {
        let mut later = VitalReading::at("2026-01-03T08:00:00Z".parse().unwrap());
        later.heart_rate = Some(88.0);
        let mut earlier = VitalReading::at("2026-01-01T08:00:00Z".parse().unwrap());
        earlier.heart_rate = Some(72.0);
        earlier.systolic = Some(120.0);
        earlier.diastolic = Some(80.0);

        let prompt = builder().build(&vitals_request(vec![later, earlier])).unwrap();
        let text = prompt.instruction();

        let first = text.find("2026-01-01").unwrap();
        let second = text.find("2026-01-03").unwrap();
        assert!(first < second);
        assert!(text.contains("blood pressure 120/80 mmHg"));
        assert!(text.contains("heartRate, bloodPressure."));
        assert!(!text.contains("oxygenSaturation,"));
    }

    #[test]
    fn vitals_prompt_requires_readings() {
        let err = builder()
            .build(&vitals_request(vec![VitalReading::at(
                "2026-01-01T08:00:00Z".parse().unwrap(),
            )]))
            .expect_err("a reading without measurements is not enough");
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn prompts_are_built_fresh_per_request() {
        let a = builder()
            .build(&AnalysisRequest::SymptomSet(SymptomSet::new(["fever"]).unwrap()))
            .unwrap();
        let b = builder()
            .build(&AnalysisRequest::SymptomSet(SymptomSet::new(["rash"]).unwrap()))
            .unwrap();
        assert_ne!(a.instruction(), b.instruction());
        assert_eq!(a.output_schema(), b.output_schema());
    }

    #[test]
    fn glucose_is_rendered_in_mmol_per_litre() {
        let mut reading = VitalReading::at("2026-01-01T08:00:00Z".parse().unwrap());
        reading.blood_glucose = Some(5.5);
        assert_eq!(
            render_reading(&reading),
            "2026-01-01 08:00 UTC | blood glucose 5.5 mmol/L"
        );
    }
}
