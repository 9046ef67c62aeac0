//! HTTP surface: upload page, diagnosis endpoint, PDF download.
//!
//! | Route            | Purpose                                          |
//! |------------------|--------------------------------------------------|
//! | `GET /`          | single-page upload UI                            |
//! | `GET /health`    | liveness                                         |
//! | `POST /diagnose` | multipart `image` (+ `variant`) → JSON diagnosis |
//! | `POST /report`   | JSON records → `application/pdf` attachment      |

use crate::config::AppConfig;
use crate::error::{DiagnoseError, InferenceError, RenderError};
use crate::extract::{DiagnosisRecord, ParseOutcome};
use crate::gemini::GeminiClient;
use crate::pipeline::Pipeline;
use crate::prompts::Variant;
use crate::report::{Layout, ReportRenderer, REPORT_FILE_NAME};
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const INDEX_HTML: &str = include_str!("index.html");

/// State shared by all handlers. Immutable after startup.
#[derive(Clone)]
pub struct AppState {
    pipeline: Pipeline,
    default_variant: Variant,
    max_upload_bytes: usize,
}

impl AppState {
    pub fn new(pipeline: Pipeline, default_variant: Variant, max_upload_bytes: usize) -> Self {
        Self {
            pipeline,
            default_variant,
            max_upload_bytes,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, InferenceError> {
        let gemini = GeminiClient::new(config)?;
        Ok(Self::new(
            Pipeline::new(gemini, ReportRenderer::new()),
            config.default_variant,
            config.max_upload_bytes,
        ))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DiagnoseResponse {
    pub variant: Variant,
    pub model: String,
    pub records: Vec<DiagnosisRecord>,
    pub outcome: ParseOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(default)]
    pub report_pdf_base64: Option<String>,
    #[serde(default)]
    pub report_error: Option<String>,
    pub report_filename: String,
    pub processing_time_ms: u128,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportRequest {
    pub records: Vec<DiagnosisRecord>,
    #[serde(default)]
    pub layout: Layout,
}

/// Handler error rendered as `{"error": "..."}` with a matching status.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unprocessable(String),

    /// The inference API failed or answered garbage.
    #[error("{0}")]
    BadGateway(String),

    #[error("{0}")]
    GatewayTimeout(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": format!("❌ {self}") }));
        (self.status(), body).into_response()
    }
}

impl From<DiagnoseError> for ApiError {
    fn from(e: DiagnoseError) -> Self {
        match e {
            DiagnoseError::Upload(e) => Self::BadRequest(e.to_string()),
            DiagnoseError::Inference(e) if e.is_timeout() => Self::GatewayTimeout(e.to_string()),
            DiagnoseError::Inference(e) => Self::BadGateway(e.to_string()),
            DiagnoseError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl From<RenderError> for ApiError {
    fn from(e: RenderError) -> Self {
        match e {
            RenderError::NoRecords => Self::Unprocessable(e.to_string()),
            other => Self::Internal(format!("PDF generation failed: {other}")),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/diagnose", post(diagnose))
        .route("/report", post(report))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(Arc::new(state))
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn diagnose(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<DiagnoseResponse>, ApiError> {
    let start = Instant::now();
    let mut upload: Option<Vec<u8>> = None;
    let mut variant = state.default_variant;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid upload: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "variant" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Invalid variant field: {e}")))?;
                variant = text.parse().map_err(ApiError::BadRequest)?;
            }
            "image" => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Invalid upload: {e}")))?;
                upload = Some(data.to_vec());
            }
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| ApiError::BadRequest("No image uploaded".into()))?;
    info!(
        "📸 Received {} byte upload, variant {}",
        upload.len(),
        variant
    );

    let diagnosis = state.pipeline.run(upload, variant).await.map_err(|e| {
        error!("Diagnosis error: {}", e);
        ApiError::from(e)
    })?;

    Ok(Json(DiagnoseResponse {
        variant: diagnosis.variant,
        model: state.pipeline.model().to_string(),
        records: diagnosis.records,
        outcome: diagnosis.outcome,
        warning: diagnosis.warning,
        report_pdf_base64: diagnosis
            .report
            .map(|bytes| general_purpose::STANDARD.encode(bytes)),
        report_error: diagnosis.report_error,
        report_filename: REPORT_FILE_NAME.to_string(),
        processing_time_ms: start.elapsed().as_millis(),
    }))
}

async fn report(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ReportRequest>,
) -> Result<Response, ApiError> {
    let renderer = state.pipeline.renderer().clone();
    let bytes = tokio::task::spawn_blocking(move || {
        renderer.render(&request.records, None, request.layout)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{REPORT_FILE_NAME}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}
