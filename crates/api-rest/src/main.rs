//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the MedAssist REST API server on its own.
//!
//! ## Intended use
//! Useful for development and debugging when you only want the REST server (with OpenAPI/Swagger
//! UI). The workspace's main `medassist-run` binary serves the same router in production.

use api_rest::{router, AppState};
use medassist_core::{AnalysisService, CoreConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the MedAssist REST API server
///
/// # Environment Variables
/// - `MEDASSIST_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `MEDASSIST_LLM_URL`, `MEDASSIST_LLM_API_KEY`: inference service (required)
/// - see `CoreConfig::from_env` for the remaining settings
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration is missing or invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("medassist_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("MEDASSIST_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let cfg = CoreConfig::from_env()?;
    let service = AnalysisService::from_config(&cfg)?;
    let app = router(AppState::new(service), cfg.max_image_bytes());

    tracing::info!("-- Starting MedAssist REST API on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
