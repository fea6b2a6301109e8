use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use medassist_core::{
    constants::{DEFAULT_PATIENT_DATA_DIR, VITALS_DIR_NAME},
    AnalysisService, CancelSource, CancelToken, CoreConfig, FileVitalsStore, PatientId,
    PrescriptionImage, VitalReading, VitalsPeriod,
};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "medassist")]
#[command(about = "MedAssist clinical analysis CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract structured data from a prescription image
    Prescription {
        /// Path to an image file, or an http(s)/data: URI
        image: String,
    },
    /// Suggest possible diagnoses for symptoms
    Symptoms {
        /// One or more symptoms, most relevant first
        #[arg(required = true)]
        symptoms: Vec<String>,
    },
    /// Summarise a patient's recorded vitals
    Vitals {
        /// Patient identifier (32 hex characters)
        patient_id: PatientId,
        /// week, month, quarter or all
        #[arg(long, default_value = "month")]
        period: VitalsPeriod,
    },
    /// Append a vitals reading for a patient
    RecordVital {
        /// Patient identifier (32 hex characters)
        patient_id: PatientId,
        /// When the reading was taken, RFC 3339 (defaults to now)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
        /// Beats per minute
        #[arg(long)]
        heart_rate: Option<f64>,
        /// Systolic blood pressure, mmHg
        #[arg(long)]
        systolic: Option<f64>,
        /// Diastolic blood pressure, mmHg
        #[arg(long)]
        diastolic: Option<f64>,
        /// Degrees Celsius
        #[arg(long)]
        temperature: Option<f64>,
        /// Breaths per minute
        #[arg(long)]
        respiratory_rate: Option<f64>,
        /// SpO2 percentage
        #[arg(long)]
        oxygen_saturation: Option<f64>,
        /// Blood glucose, mmol/L
        #[arg(long)]
        blood_glucose: Option<f64>,
        /// Kilograms
        #[arg(long)]
        weight: Option<f64>,
        /// Free-text note
        #[arg(long)]
        notes: Option<String>,
    },
    /// Create an empty vitals record and print its identifier
    NewPatient,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout carries only the JSON result.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("medassist_core=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Prescription { image }) => {
            let image = load_image(&image).await?;
            let (service, cancel) = analysis_service()?;
            let result = service.analyze_prescription_image(image, &cancel).await?;
            print_json(&result)?;
        }
        Some(Commands::Symptoms { symptoms }) => {
            let (service, cancel) = analysis_service()?;
            let result = service.analyze_symptoms(symptoms, &cancel).await?;
            print_json(&result)?;
        }
        Some(Commands::Vitals { patient_id, period }) => {
            let (service, cancel) = analysis_service()?;
            let result = service.analyze_vitals(patient_id, period, &cancel).await?;
            print_json(&result)?;
        }
        Some(Commands::RecordVital {
            patient_id,
            at,
            heart_rate,
            systolic,
            diastolic,
            temperature,
            respiratory_rate,
            oxygen_saturation,
            blood_glucose,
            weight,
            notes,
        }) => {
            let reading = VitalReading {
                heart_rate,
                systolic,
                diastolic,
                temperature_c: temperature,
                respiratory_rate,
                oxygen_saturation,
                blood_glucose,
                weight_kg: weight,
                notes,
                ..VitalReading::at(at.unwrap_or_else(Utc::now))
            };
            vitals_store().append(&patient_id, reading).await?;
            println!("Recorded vitals for patient: {}", patient_id);
        }
        Some(Commands::NewPatient) => {
            let patient_id = vitals_store().create_patient().await?;
            println!("{}", patient_id);
        }
        None => {
            println!("Use 'medassist --help' for commands");
        }
    }

    Ok(())
}

/// Builds the service from the environment and arms Ctrl-C to cancel the pending analysis.
fn analysis_service() -> anyhow::Result<(AnalysisService, CancelToken)> {
    let cfg = CoreConfig::from_env()?;
    let service = AnalysisService::from_config(&cfg)?;

    let source = CancelSource::new();
    let token = source.token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling...");
            source.cancel();
        }
    });

    Ok((service, token))
}

/// Recording vitals needs only the data directory, not the inference settings.
fn vitals_store() -> FileVitalsStore {
    let patient_data_dir = std::env::var("PATIENT_DATA_DIR")
        .ok()
        .filter(|dir| !dir.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_PATIENT_DATA_DIR.into());
    FileVitalsStore::new(PathBuf::from(patient_data_dir).join(VITALS_DIR_NAME))
}

async fn load_image(arg: &str) -> anyhow::Result<PrescriptionImage> {
    if is_uri(arg) {
        return Ok(PrescriptionImage::Uri(arg.to_string()));
    }
    let bytes = tokio::fs::read(arg)
        .await
        .map_err(|e| anyhow::anyhow!("cannot read image {}: {}", arg, e))?;
    Ok(PrescriptionImage::Bytes(bytes))
}

fn is_uri(arg: &str) -> bool {
    let lower = arg.trim_start().to_ascii_lowercase();
    ["http://", "https://", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
