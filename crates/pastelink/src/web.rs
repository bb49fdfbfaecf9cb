//! HTTP surface.
//!
//! Routes:
//! - `GET  /`                  submission form
//! - `POST /convert`           JSON or form submission, returns the share link
//! - `GET  /view/{id}`         text artifact rendered as HTML
//! - `GET  /view/images/{id}`  image artifact bytes
//! - `GET  /api/status`        store and sweeper status
//! - `GET  /health`            liveness

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, FromRequest, Path, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use cas::Artifact;
use serde::Deserialize;

use crate::error::Error;
use crate::render;
use crate::service::{PasteService, Submission};
use crate::sweeper::SweeperStatus;

/// Shared state for web handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PasteService>,
    /// Base for share links. Falls back to the request's Host header.
    pub public_url: Option<String>,
    pub sweeper: Option<SweeperStatus>,
    /// Largest accepted request body in bytes.
    pub max_body_bytes: usize,
}

/// Body limit used when none is configured.
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

impl AppState {
    pub fn new(service: Arc<PasteService>) -> Self {
        Self {
            service,
            public_url: None,
            sweeper: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    fn view_url(&self, headers: &HeaderMap, id: &str) -> String {
        let base = match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => {
                let host = headers
                    .get(header::HOST)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("localhost");
                format!("http://{host}")
            }
        };
        format!("{base}/view/{id}")
    }
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.max_body_bytes;
    Router::new()
        .route("/", get(serve_form))
        .route("/convert", post(convert))
        .route("/view/{id}", get(view_text))
        .route("/view/images/{id}", get(view_image))
        .route("/api/status", get(status))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// JSON error response: `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Content not found")
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidInput(msg) => Self::new(StatusCode::BAD_REQUEST, msg),
            Error::NotFound(_) => Self::not_found(),
            other => {
                tracing::error!(error = %other, "request failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

/// Run a blocking service call off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(e) => {
            tracing::error!(error = %e, "blocking task failed");
            Err(ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error"))
        }
    }
}

async fn serve_form() -> Html<String> {
    Html(render::render_form())
}

/// Form fields from the HTML page. Images are one entry per line.
#[derive(Debug, Deserialize)]
struct FormSubmission {
    #[serde(default)]
    title: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    images: String,
}

impl From<FormSubmission> for Submission {
    fn from(form: FormSubmission) -> Self {
        Submission {
            title: Some(form.title).filter(|t| !t.trim().is_empty()),
            text: form.text,
            images: form
                .images
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

/// `/convert` body: JSON when the content type says so, form otherwise.
struct ConvertBody(Submission);

impl<S> FromRequest<S> for ConvertBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));

        if is_json {
            let Json(submission) = Json::<Submission>::from_request(req, state)
                .await
                .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
            Ok(Self(submission))
        } else {
            let Form(form) = Form::<FormSubmission>::from_request(req, state)
                .await
                .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
            Ok(Self(form.into()))
        }
    }
}

#[tracing::instrument(name = "http.convert", skip_all)]
async fn convert(
    State(state): State<AppState>,
    headers: HeaderMap,
    ConvertBody(submission): ConvertBody,
) -> Result<Json<serde_json::Value>, ApiError> {
    let service = state.service.clone();
    let receipt = blocking(move || service.submit(submission)).await?;

    Ok(Json(serde_json::json!({
        "url": state.view_url(&headers, receipt.id.as_str()),
        "hash_id": receipt.id,
        "created_at": receipt.created_at.to_rfc3339(),
    })))
}

async fn resolve(state: &AppState, id: String) -> Result<Artifact, ApiError> {
    let service = state.service.clone();
    blocking(move || service.resolve(&id)).await
}

#[tracing::instrument(name = "http.view", skip(state))]
async fn view_text(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response, ApiError> {
    let artifact = resolve(&state, id).await?;
    if artifact.kind.is_image() {
        return Err(ApiError::not_found());
    }

    let markdown = String::from_utf8_lossy(&artifact.payload);
    let page = render::render_page(&markdown);

    Ok((
        [
            (header::CONTENT_SECURITY_POLICY, HeaderValue::from_static(render::CSP_HEADER)),
            (header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
        ],
        Html(page),
    )
        .into_response())
}

#[tracing::instrument(name = "http.view_image", skip(state))]
async fn view_image(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response, ApiError> {
    let artifact = resolve(&state, id).await?;
    if !artifact.kind.is_image() {
        return Err(ApiError::not_found());
    }

    let content_type = HeaderValue::from_str(&artifact.kind.mime_type())
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
            (header::CACHE_CONTROL, HeaderValue::from_static("public, max-age=86400, immutable")),
        ],
        artifact.payload,
    )
        .into_response())
}

async fn status(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let service = state.service.clone();
    let status = blocking(move || service.status()).await?;

    let sweeper = state.sweeper.as_ref().map(|s| {
        serde_json::json!({
            "phase": s.phase(),
            "last_report": s.last_report(),
        })
    });

    Ok(Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": status.uptime.as_secs(),
        "artifact_count": status.artifact_count,
        "text_count": status.text_count,
        "image_count": status.image_count,
        "oldest_artifact_age_secs": status.oldest_artifact_age.map(|age| age.as_secs()),
        "sweeper": sweeper,
    })))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}
