use medassist_core::{AnalysisService, CoreConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for MedAssist
///
/// Loads configuration once, wires the analysis service and serves the REST API.
///
/// # Environment Variables
/// - `MEDASSIST_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `MEDASSIST_LLM_URL`: base URL of the OpenAI-compatible inference service (required)
/// - `MEDASSIST_LLM_API_KEY`: API key for the inference service (required)
/// - `MEDASSIST_LLM_MODEL`, `MEDASSIST_LLM_TIMEOUT_SECS`, `MEDASSIST_MAX_OUTPUT_TOKENS`,
///   `MEDASSIST_LLM_RETRIES`, `MEDASSIST_MAX_IMAGE_BYTES`: optional tuning
/// - `PATIENT_DATA_DIR`: Directory holding recorded vitals (default: "patient_data")
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, startup or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("medassist_run=info".parse()?)
                .add_directive("medassist_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("MEDASSIST_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let cfg = CoreConfig::from_env()?;
    let service = AnalysisService::from_config(&cfg)?;
    let rest_app = api_rest::router(api_rest::AppState::new(service), cfg.max_image_bytes());

    tracing::info!("++ Starting MedAssist REST on {}", rest_addr);

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, rest_app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("-- Shutting down MedAssist REST");
    }
}
