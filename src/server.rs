use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use tokio::net::TcpListener;
use tower::ServiceExt;
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::pipeline::{ImageRequest, Mode, ProcessingService};

/// Shared application state.
pub struct AppState {
    pub service: ProcessingService,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(service: ProcessingService) -> Self {
        Self {
            service,
            start_time: Instant::now(),
        }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_ready: bool,
    pub uptime_secs: f64,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::Decode(_) | AppError::InvalidImage { .. } => {
                StatusCode::BAD_REQUEST
            }
            AppError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

pub fn create_router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/process-image", post(process_image))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// POST /process-image with multipart fields `file` and `mode`.
async fn process_image(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut file: Option<Vec<u8>> = None;
    let mut mode: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("multipart error: {e}")))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("file read error: {e}")))?;
                file = Some(bytes.to_vec());
            }
            Some("mode") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("mode field error: {e}")))?;
                mode = Some(text);
            }
            _ => {}
        }
    }

    let bytes = file.ok_or_else(|| AppError::BadRequest("missing 'file' field".to_string()))?;
    let mode = mode
        .as_deref()
        .map(Mode::parse)
        .ok_or_else(|| AppError::BadRequest("missing 'mode' field".to_string()))?;
    let request = ImageRequest::new(bytes, mode);
    let span = info_span!("process_image", request_id = %request.id, %mode);

    let processed = state
        .service
        .clone()
        .oneshot(request)
        .instrument(span)
        .await?;

    Ok(([(header::CONTENT_TYPE, "image/png")], processed.png).into_response())
}

/// GET /health
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        model_ready: state.service.detectors().model_ready(),
        uptime_secs: state.start_time.elapsed().as_secs_f64(),
    })
}

pub struct Server {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl Server {
    pub fn new(config: ServerConfig, service: ProcessingService) -> Self {
        Self {
            config,
            state: Arc::new(AppState::new(service)),
        }
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    pub async fn start(&self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<(), AppError> {
        let address = format!("{}:{}", self.config.host, self.config.port);
        info!("Starting detection server on {}", address);
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|e| AppError::Bind(e, address.clone()))?;

        let app = create_router(self.state.clone(), self.config.max_upload_bytes)
            .layer(TraceLayer::new_for_http());

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(AppError::Serve)?;

        info!("Detection server stopped");
        Ok(())
    }
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
