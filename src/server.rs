//! HTTP transport: `POST /convert` plus health checks.
//!
//! The handler is a thin adapter. It pulls the document and the form fields
//! out of a multipart request, runs [`crate::convert::convert`] with a
//! per-request copy of the base configuration, and maps the outcome to a ZIP
//! download or a JSON `{"message": ...}` error. The engine handle is the only
//! state shared between requests.

use crate::config::{ConversionConfig, ExportOptions};
use crate::convert::convert;
use crate::engine::{DocumentBytes, RenderEngine};
use crate::error::Pdf2ImgError;
use crate::pipeline::input::{document_stem, ensure_pdf, DEFAULT_ARCHIVE_STEM};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

const FILE_FIELDS: [&str; 3] = ["file[]", "file", "pdf"];

static X_PAGES_CONVERTED: HeaderName = HeaderName::from_static("x-pages-converted");
static X_PAGES_FAILED: HeaderName = HeaderName::from_static("x-pages-failed");

/// Listener settings for [`serve`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind. Default: `0.0.0.0:8080`.
    pub bind: SocketAddr,
    /// Largest accepted request body in bytes. Default: 32 MiB.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_upload_bytes: 32 * 1024 * 1024,
        }
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<dyn RenderEngine>,
    /// Base configuration; each request overrides `export` from its form.
    pub config: ConversionConfig,
}

impl AppState {
    pub fn new(engine: Arc<dyn RenderEngine>, config: ConversionConfig) -> Self {
        Self { engine, config }
    }
}

/// Build the application router.
///
/// # Routes
///
/// - `POST /convert`, `POST /api/convert` — multipart conversion
/// - `GET /health`, `/healthcheck`, `/ping` and their `/api/` variants
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/convert", post(convert_handler))
        .route("/api/convert", post(convert_handler))
        .route("/health", get(health_check))
        .route("/healthcheck", get(health_check))
        .route("/ping", get(health_check))
        .route("/api/health", get(health_check))
        .route("/api/healthcheck", get(health_check))
        .route("/api/ping", get(health_check))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until Ctrl-C.
pub async fn serve(config: ServerConfig, state: AppState) -> Result<(), Pdf2ImgError> {
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|e| Pdf2ImgError::InvalidConfig(format!("cannot bind {}: {e}", config.bind)))?;
    info!("Listening on http://{}", config.bind);

    axum::serve(listener, router(state, config.max_upload_bytes))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Pdf2ImgError::Internal(format!("server error: {e}")))?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

#[derive(Serialize)]
struct MessageBody {
    message: String,
}

async fn health_check() -> impl IntoResponse {
    Json(MessageBody {
        message: "ok".into(),
    })
}

/// Error returned by handlers, rendered as JSON `{"message": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<Pdf2ImgError> for ApiError {
    fn from(err: Pdf2ImgError) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(MessageBody {
                message: self.message,
            }),
        )
            .into_response()
    }
}

/// Fields collected from the multipart form.
#[derive(Default)]
struct ConvertForm {
    files: Vec<(Option<String>, axum::body::Bytes)>,
    pages: Option<String>,
    resolution: Option<String>,
    export: Option<String>,
    quality: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> Result<ConvertForm, ApiError> {
    let mut form = ConvertForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read multipart field: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        if FILE_FIELDS.contains(&name.as_str()) {
            let file_name = field.file_name().map(str::to_string);
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("Failed to open PDF file from form: {e}")))?;
            form.files.push((file_name, data));
            continue;
        }

        let slot = match name.as_str() {
            "pages" => &mut form.pages,
            "resolution" => &mut form.resolution,
            "export" => &mut form.export,
            "quality" => &mut form.quality,
            _ => continue,
        };
        let value = field
            .text()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read field '{name}': {e}")))?;
        *slot = Some(value);
    }

    Ok(form)
}

async fn convert_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut form = read_form(multipart).await?;

    let (file_name, data) = match form.files.len() {
        0 => return Err(ApiError::bad_request("No PDF file found")),
        1 => form.files.remove(0),
        _ => {
            return Err(ApiError::bad_request(
                "Too many PDF files found, only one is allowed",
            ))
        }
    };

    let origin = file_name.as_deref().unwrap_or("upload");
    if ensure_pdf(&data, origin).is_err() {
        return Err(ApiError::bad_request("Content-Type is not a application/pdf"));
    }

    let spec = form.pages.unwrap_or_default();
    let mut config = state.config.clone();
    config.export = ExportOptions::from_params(
        form.resolution.as_deref(),
        form.export.as_deref(),
        form.quality.as_deref(),
    );
    info!(
        "Convert request: {} ({} bytes), pages '{}', {:?}",
        origin,
        data.len(),
        spec,
        config.export
    );

    let document: DocumentBytes = DocumentBytes::from(&data[..]);
    let output = match convert(document, &spec, &config, Arc::clone(&state.engine)).await {
        Ok(output) => output,
        Err(Pdf2ImgError::InvalidPageSpec(e)) => {
            return Err(ApiError::bad_request(format!(
                "Invalid page indices({spec}): {e}"
            )))
        }
        Err(e) => return Err(e.into()),
    };

    let stem = file_name
        .as_deref()
        .map(document_stem)
        .unwrap_or_else(|| DEFAULT_ARCHIVE_STEM.to_string());
    let disposition = format!("attachment; filename=\"{stem}.zip\"");

    let failed = output.failed_pages();
    let converted = output.stats.converted_pages;
    let mut response = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/zip"))],
        output.archive.bytes,
    )
        .into_response();

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    } else {
        headers.insert(
            header::CONTENT_DISPOSITION,
            HeaderValue::from_static("attachment; filename=\"converted_images.zip\""),
        );
    }
    headers.insert(X_PAGES_CONVERTED.clone(), HeaderValue::from(converted));
    if !failed.is_empty() {
        let list: Vec<String> = failed.iter().map(|p| p.to_string()).collect();
        if let Ok(value) = HeaderValue::from_str(&list.join(",")) {
            headers.insert(X_PAGES_FAILED.clone(), value);
        }
    }

    Ok(response)
}
