//! HTTP server for the reconciliation API.
//!
//! # API Endpoints
//!
//! | Method | Path                          | Description                    |
//! |--------|-------------------------------|--------------------------------|
//! | GET    | `/health`                     | Health check                   |
//! | GET    | `/api/v1/modes`               | Mode profiles                  |
//! | POST   | `/api/v1/reconcile`           | Reconcile, JSON summary        |
//! | POST   | `/api/v1/reconcile/download`  | Reconcile, xlsx report         |
//! | GET    | `/api/logs`                   | SSE stream for real-time logs  |
//!
//! Both reconcile endpoints take a multipart form with `bank_file`
//! (alias `zzb_file`), `provider_file` (alias `eth_file`), and optional
//! `recon_type` and `join` fields.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, Method},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, LOG_BROADCASTER};
use super::types::{mode_catalog, ReconcileResponse};
use crate::config::ServiceConfig;
use crate::error::{PipelineResult, ServerError, ServerResult};
use crate::models::ReconMode;
use crate::recon::matcher::JoinKind;
use crate::recon::pipeline::{process_files, ReconOptions};
use crate::report::{report_filename, XLSX_CONTENT_TYPE};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
}

/// Build the application router.
pub fn router(config: ServiceConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    let body_limit = config.max_upload_bytes;
    let state = AppState {
        config: Arc::new(config),
    };

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/v1/modes", get(modes))
        .route("/api/v1/reconcile", post(reconcile))
        .route("/api/v1/reconcile/download", post(reconcile_download))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(config: ServiceConfig) -> Result<(), Box<dyn std::error::Error>> {
    let port = config.port;
    let app = router(config);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 Reconciliation server running on http://localhost:{}", port);
    println!("   POST /api/v1/reconcile          - JSON summary");
    println!("   POST /api/v1/reconcile/download - xlsx report");
    println!("   GET  /api/v1/modes              - Mode profiles");
    println!("   GET  /api/logs                  - SSE log stream");
    println!("   GET  /health                    - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "arsrecon",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "reconcile": "POST /api/v1/reconcile",
            "download": "POST /api/v1/reconcile/download",
            "modes": "GET /api/v1/modes",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

async fn modes() -> Json<Value> {
    Json(json!({ "modes": mode_catalog() }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // Lagged receivers skip the entries they missed
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

// =============================================================================
// Upload Handling
// =============================================================================

/// Fields of a reconcile form.
#[derive(Debug, Default)]
struct UploadForm {
    bank: Option<Vec<u8>>,
    provider: Option<Vec<u8>>,
    recon_type: Option<String>,
    join: Option<String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> ServerResult<Self> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
        {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "bank_file" | "zzb_file" => form.bank = Some(read_bytes(field).await?),
                "provider_file" | "eth_file" => form.provider = Some(read_bytes(field).await?),
                "recon_type" => form.recon_type = Some(read_text(field).await?),
                "join" => form.join = Some(read_text(field).await?),
                _ => {}
            }
        }

        Ok(form)
    }

    /// Validate the form into payloads and run options.
    fn into_job(self, config: &ServiceConfig) -> ServerResult<(Vec<u8>, Vec<u8>, ReconOptions)> {
        let bank = self
            .bank
            .ok_or_else(|| ServerError::BadRequest("Missing bank_file".to_string()))?;
        let provider = self
            .provider
            .ok_or_else(|| ServerError::BadRequest("Missing provider_file".to_string()))?;
        let mode = ReconMode::from_selector(self.recon_type.as_deref())?;
        let join = JoinKind::from_selector(self.join.as_deref())?;

        Ok((bank, provider, ReconOptions::from_config(config, mode, join)))
    }
}

async fn read_bytes(field: axum::extract::multipart::Field<'_>) -> ServerResult<Vec<u8>> {
    field
        .bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> ServerResult<String> {
    field
        .text()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))
}

/// Run a pipeline job on the blocking pool.
async fn run_blocking<T, F>(job: F) -> ServerResult<T>
where
    F: FnOnce() -> PipelineResult<T> + Send + 'static,
    T: Send + 'static,
{
    let joined = tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    joined.map_err(|e| {
        log_error(format!("Reconciliation failed: {}", e));
        ServerError::from(e)
    })
}

async fn reconcile(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ServerResult<Json<ReconcileResponse>> {
    let (bank, provider, options) = UploadForm::read(multipart).await?.into_job(&state.config)?;
    log_info(format!(
        "New reconciliation: mode={}, bank={} bytes, provider={} bytes",
        options.mode,
        bank.len(),
        provider.len()
    ));

    let response = run_blocking(move || {
        let outcome = process_files(&bank, &provider, &options)?;
        let summary = outcome.summary(options.preview_rows);
        Ok(ReconcileResponse::new(&outcome, summary))
    })
    .await?;

    Ok(Json(response))
}

async fn reconcile_download(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ServerResult<Response> {
    let (bank, provider, options) = UploadForm::read(multipart).await?.into_job(&state.config)?;
    let filename = report_filename(options.mode);
    log_info(format!("New report: mode={}", options.mode));

    let bytes = run_blocking(move || process_files(&bank, &provider, &options)?.report(&options.bank)).await?;

    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", filename),
            ),
        ],
        bytes,
    )
        .into_response())
}
