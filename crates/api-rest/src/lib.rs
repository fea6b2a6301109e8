//! # API REST
//!
//! REST binding of the MedAssist analysis operations.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - mapping `AnalysisError` kinds onto HTTP status codes
//!
//! Uses `api-shared` for the wire types. The router is built here so that both the standalone
//! binary and the workspace's `medassist-run` binary serve the same routes.

#![warn(rust_2018_idioms)]

use api_shared::{
    DiagnosisAnalysisRes, ErrorRes, HealthRes, HealthService, PrescriptionAnalysisReq,
    PrescriptionAnalysisRes, SymptomsAnalysisReq, VitalsAnalysisParams, VitalsAnalysisRes,
};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        DefaultBodyLimit, Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use medassist_core::{
    AnalysisError, AnalysisService, CancelToken, ErrorKind, PatientId, PrescriptionImage,
    VitalsPeriod,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Room for the JSON envelope around a base64 image.
const BODY_LIMIT_MARGIN: usize = 64 * 1024;

/// Application state shared across REST handlers.
#[derive(Clone)]
pub struct AppState {
    service: Arc<AnalysisService>,
    health: HealthService,
}

impl AppState {
    pub fn new(service: AnalysisService) -> Self {
        Self {
            service: Arc::new(service),
            health: HealthService::new(),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(health, analyze_prescription, analyze_symptoms, analyze_vitals),
    components(schemas(
        HealthRes,
        ErrorRes,
        PrescriptionAnalysisReq,
        PrescriptionAnalysisRes,
        api_shared::PatientInfoDto,
        api_shared::DoctorInfoDto,
        api_shared::MedicationDto,
        SymptomsAnalysisReq,
        DiagnosisAnalysisRes,
        api_shared::DiagnosisDto,
        VitalsAnalysisRes,
    ))
)]
pub struct ApiDoc;

/// Builds the REST router.
///
/// `max_image_bytes` is the decoded image limit; the request body limit is derived from it to
/// allow for base64 expansion.
pub fn router(state: AppState, max_image_bytes: usize) -> Router {
    let body_limit = (max_image_bytes.saturating_mul(4) / 3).saturating_add(BODY_LIMIT_MARGIN);

    Router::new()
        .route("/health", get(health))
        .route("/analysis/prescription", post(analyze_prescription))
        .route("/analysis/symptoms", post(analyze_symptoms))
        .route("/analysis/vitals/:patient_id", get(analyze_vitals))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// An analysis failure rendered as `{ kind, message }` with a status chosen by kind.
#[derive(Debug)]
pub struct ApiError(AnalysisError);

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(AnalysisError::invalid_request(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(AnalysisError::invalid_request(rejection.body_text()))
    }
}

/// HTTP status for each error kind. `Cancelled` uses the non-standard 499.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorKind::QuotaExceeded => StatusCode::PAYMENT_REQUIRED,
        ErrorKind::MalformedOutput | ErrorKind::Unreachable | ErrorKind::Storage => {
            StatusCode::BAD_GATEWAY
        }
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.kind());
        if status.is_server_error() {
            tracing::error!(kind = %self.0.kind(), error = %self.0, "analysis request failed");
        } else {
            tracing::warn!(kind = %self.0.kind(), error = %self.0, "analysis request rejected");
        }
        (status, Json(ErrorRes::from(&self.0))).into_response()
    }
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for monitoring and load balancers.
#[axum::debug_handler]
async fn health(State(state): State<AppState>) -> Json<HealthRes> {
    Json(state.health.check_health())
}

#[utoipa::path(
    post,
    path = "/analysis/prescription",
    request_body = PrescriptionAnalysisReq,
    responses(
        (status = 200, description = "Extracted prescription", body = PrescriptionAnalysisRes),
        (status = 400, description = "Missing, invalid or oversized image", body = ErrorRes),
        (status = 402, description = "Inference quota exhausted", body = ErrorRes),
        (status = 502, description = "Inference service unavailable or unreadable output", body = ErrorRes),
        (status = 504, description = "Inference timed out", body = ErrorRes)
    )
)]
/// Extract structured data from a photographed prescription.
///
/// The body carries either base64 image bytes or a URI the inference service can fetch.
///
/// # Errors
/// Returns `400 Bad Request` if:
/// - both or neither of `imageBase64` and `imageUri` are set,
/// - the base64 is invalid, or
/// - the bytes are not a supported raster image or exceed the size limit.
#[axum::debug_handler]
async fn analyze_prescription(
    State(state): State<AppState>,
    body: Result<Json<PrescriptionAnalysisReq>, JsonRejection>,
) -> Result<Json<PrescriptionAnalysisRes>, ApiError> {
    let Json(req) = body?;
    let image = PrescriptionImage::try_from(req)?;
    let analysis = state
        .service
        .analyze_prescription_image(image, &CancelToken::never())
        .await?;
    Ok(Json(analysis.into()))
}

#[utoipa::path(
    post,
    path = "/analysis/symptoms",
    request_body = SymptomsAnalysisReq,
    responses(
        (status = 200, description = "Possible diagnoses, most likely first", body = DiagnosisAnalysisRes),
        (status = 400, description = "Empty or blank symptom list", body = ErrorRes),
        (status = 402, description = "Inference quota exhausted", body = ErrorRes),
        (status = 502, description = "Inference service unavailable or unreadable output", body = ErrorRes),
        (status = 504, description = "Inference timed out", body = ErrorRes)
    )
)]
/// Suggest possible diagnoses for a list of symptoms.
#[axum::debug_handler]
async fn analyze_symptoms(
    State(state): State<AppState>,
    body: Result<Json<SymptomsAnalysisReq>, JsonRejection>,
) -> Result<Json<DiagnosisAnalysisRes>, ApiError> {
    let Json(req) = body?;
    let analysis = state
        .service
        .analyze_symptoms(req.symptoms, &CancelToken::never())
        .await?;
    Ok(Json(analysis.into()))
}

#[utoipa::path(
    get,
    path = "/analysis/vitals/{patient_id}",
    params(
        ("patient_id" = String, Path, description = "Canonical 32-hex patient identifier"),
        VitalsAnalysisParams
    ),
    responses(
        (status = 200, description = "Trends, concerns and recommendations", body = VitalsAnalysisRes),
        (status = 400, description = "Invalid identifier or period, or no readings in the period", body = ErrorRes),
        (status = 402, description = "Inference quota exhausted", body = ErrorRes),
        (status = 502, description = "Vitals unreadable or inference unavailable", body = ErrorRes),
        (status = 504, description = "Inference timed out", body = ErrorRes)
    )
)]
/// Summarise a patient's recorded vitals over a period (default `month`).
#[axum::debug_handler]
async fn analyze_vitals(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
    params: Result<Query<VitalsAnalysisParams>, QueryRejection>,
) -> Result<Json<VitalsAnalysisRes>, ApiError> {
    let Query(params) = params?;
    let patient_id = PatientId::parse(&patient_id).map_err(AnalysisError::from)?;
    let period = params
        .period
        .as_deref()
        .map(str::parse::<VitalsPeriod>)
        .transpose()?
        .unwrap_or_default();

    let analysis = state
        .service
        .analyze_vitals(patient_id, period, &CancelToken::never())
        .await?;
    Ok(Json(analysis.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use medassist_core::{
        AnalysisResult, CapabilityRequest, CoreConfig, InferenceCapability, InferenceConfig,
        UseCase, VitalReading, VitalsSource,
    };
    use serde_json::{json, Value};
    use std::path::PathBuf;
    use std::time::Duration;
    use tower::ServiceExt;

    /// Answers every use case with a fixed document, or fails with a fixed kind.
    struct Fixed(Result<Value, ErrorKind>);

    #[async_trait]
    impl InferenceCapability for Fixed {
        async fn complete(&self, request: &CapabilityRequest) -> AnalysisResult<String> {
            match &self.0 {
                Ok(_) if request.use_case == UseCase::Vitals => Ok(json!({
                    "trends": {"heartRate": "Stable"},
                    "concerns": [],
                    "recommendations": []
                })
                .to_string()),
                Ok(body) => Ok(body.to_string()),
                Err(kind) => Err(AnalysisError::new(*kind, "scripted failure")),
            }
        }
    }

    struct OneReading;

    #[async_trait]
    impl VitalsSource for OneReading {
        async fn fetch(
            &self,
            _patient_id: &PatientId,
            _period: VitalsPeriod,
        ) -> AnalysisResult<Vec<VitalReading>> {
            let mut reading = VitalReading::at("2026-01-01T08:00:00Z".parse().unwrap());
            reading.heart_rate = Some(70.0);
            Ok(vec![reading])
        }
    }

    fn app(reply: Result<Value, ErrorKind>) -> Router {
        let inference = InferenceConfig::new(
            "https://llm.example.test/v1",
            "test-key",
            "test-model",
            Duration::from_secs(5),
            2000,
            0,
        )
        .unwrap();
        let config = CoreConfig::new(PathBuf::from("unused"), 1024, inference).unwrap();
        let service = AnalysisService::new(&config, Arc::new(Fixed(reply)), Arc::new(OneReading));
        router(AppState::new(service), config.max_image_bytes())
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_reports_alive() {
        let (status, body) = send(app(Ok(json!({}))), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn symptoms_return_camel_case_diagnoses() {
        let reply = json!({
            "possibleDiagnoses": [{"condition": "Bronchitis", "confidence": "medium", "matchingSymptoms": ["cough"]}]
        });
        let (status, body) = send(
            app(Ok(reply)),
            post_json("/analysis/symptoms", json!({"symptoms": ["cough", "fever"]})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["possibleDiagnoses"][0]["condition"], "Bronchitis");
        assert_eq!(body["possibleDiagnoses"][0]["confidence"], "medium");
        assert_eq!(body["possibleDiagnoses"][0]["matchingSymptoms"], json!(["cough"]));
    }

    #[tokio::test]
    async fn empty_symptoms_are_bad_request_with_detail() {
        let (status, body) = send(
            app(Ok(json!({}))),
            post_json("/analysis/symptoms", json!({"symptoms": []})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "invalid_request");
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    async fn malformed_json_body_is_bad_request() {
        let request = Request::builder()
            .method("POST")
            .uri("/analysis/symptoms")
            .header("content-type", "application/json")
            .body(Body::from("{\"symptoms\": ["))
            .unwrap();
        let (status, body) = send(app(Ok(json!({}))), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "invalid_request");
    }

    #[tokio::test]
    async fn failure_kinds_map_to_statuses() {
        let cases = [
            (ErrorKind::QuotaExceeded, StatusCode::PAYMENT_REQUIRED, "quota_exceeded"),
            (ErrorKind::Unreachable, StatusCode::BAD_GATEWAY, "unreachable"),
            (ErrorKind::MalformedOutput, StatusCode::BAD_GATEWAY, "malformed_output"),
            (ErrorKind::Timeout, StatusCode::GATEWAY_TIMEOUT, "timeout"),
        ];
        for (kind, expected, name) in cases {
            let (status, body) = send(
                app(Err(kind)),
                post_json("/analysis/symptoms", json!({"symptoms": ["cough"]})),
            )
            .await;
            assert_eq!(status, expected, "{name}");
            assert_eq!(body["kind"], name);
            assert!(body.get("detail").is_none());
        }
        assert_eq!(status_for(ErrorKind::Cancelled).as_u16(), 499);
        assert_eq!(status_for(ErrorKind::Storage), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn prescription_requires_an_image_source() {
        let (status, body) = send(
            app(Ok(json!({}))),
            post_json("/analysis/prescription", json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "invalid_request");
    }

    #[tokio::test]
    async fn prescription_by_uri_returns_medications() {
        let reply = json!({"medications": [{"name": "Amoxicillin", "dosage": "500mg"}]});
        let (status, body) = send(
            app(Ok(reply)),
            post_json(
                "/analysis/prescription",
                json!({"imageUri": "https://images.example.test/rx.png"}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["medications"][0]["name"], "Amoxicillin");
        assert_eq!(body["medications"][0]["dosage"], "500mg");
        assert_eq!(body["rawConfidence"], "unknown");
    }

    #[tokio::test]
    async fn vitals_validate_identifier_and_period() {
        let id = PatientId::new();

        let (status, body) = send(
            app(Ok(json!({}))),
            get(&format!("/analysis/vitals/{}?period=week", id)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["trends"]["heartRate"], "Stable");

        let (status, _) = send(app(Ok(json!({}))), get("/analysis/vitals/not-an-id")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            app(Ok(json!({}))),
            get(&format!("/analysis/vitals/{}?period=decade", id)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("decade"));
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let (status, body) = send(app(Ok(json!({}))), get("/api-docs/openapi.json")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/analysis/symptoms"].is_object());
    }
}
