mod config;
mod filename;
mod http;
mod metrics;
mod models;
mod pipeline;
mod security;
mod storage;
#[cfg(test)]
mod testing;
mod woo;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use config::AppConfig;
use eyre::WrapErr;
use models::{ApiError, S3Event, SyncReport};
use pipeline::{LogOrphanedMedia, Pipeline, PipelineError, PipelineErrorKind};
use security::{HookGuard, require_hook_key};
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use storage::S3ObjectStore;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};
use woo::{WooProductsClient, WpMediaClient};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(target: "sync.api", "server crashed: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> eyre::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = AppConfig::load().wrap_err("failed to load configuration")?;
    info!(
        target: "sync.api",
        shop = %config.shop.base_url,
        disposition = ?config.pipeline.source_disposition,
        seo_rename = config.pipeline.seo_rename,
        "configuration loaded"
    );

    let http = http::build_client(&config.http);
    let storage = Arc::new(S3ObjectStore::from_config(&config.storage).await);
    let products = Arc::new(WooProductsClient::new(http.clone(), &config.shop));
    let media = Arc::new(WpMediaClient::new(http, &config.shop));
    let pipeline = Pipeline::new(storage, products, media, config.pipeline.clone())
        .with_orphan_hook(Arc::new(LogOrphanedMedia));
    let guard = HookGuard::new(config.events_shared_secret.clone());

    let app = router(AppState { pipeline }, guard);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8000);
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!(target: "sync.api", "listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

#[derive(Clone)]
struct AppState {
    pipeline: Pipeline,
}

fn router(state: AppState, guard: HookGuard) -> Router {
    let protected = Router::new()
        .route("/events", post(receive_event))
        .route_layer(middleware::from_fn_with_state(guard, require_hook_key));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Health check.
///
/// - Method: `GET`
/// - Path: `/health`
/// - Auth: none
async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "sku-media-sync",
    }))
}

/// Runs one ingestion for the first record of a storage notification.
///
/// - Method: `POST`
/// - Path: `/events`
/// - Auth: `X-Hook-Key` or `Authorization: Bearer` when a shared secret is set
/// - Body: S3 event notification JSON
///
/// Skipped triggers are still `200`; the body says why.
async fn receive_event(
    State(state): State<AppState>,
    payload: Result<Json<S3Event>, JsonRejection>,
) -> Result<Json<SyncReport>, AppError> {
    let Json(event) = payload.map_err(|rejection| AppError::Payload(rejection.body_text()))?;
    let report = state.pipeline.handle_event(&event).await?;
    Ok(Json(report))
}

enum AppError {
    Payload(String),
    Pipeline(PipelineError),
}

impl From<PipelineError> for AppError {
    fn from(value: PipelineError) -> Self {
        AppError::Pipeline(value)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Payload(detail) => {
                let payload = ApiError {
                    error: "invalid_event".to_string(),
                    detail: Some(detail),
                };
                (StatusCode::BAD_REQUEST, Json(payload)).into_response()
            }
            AppError::Pipeline(err) => {
                let status = match err.kind() {
                    PipelineErrorKind::InvalidEvent => StatusCode::BAD_REQUEST,
                    PipelineErrorKind::Upstream => StatusCode::BAD_GATEWAY,
                };
                let payload = ApiError {
                    error: err.stage().to_string(),
                    detail: Some(err.detail().to_string()),
                };
                (status, Json(payload)).into_response()
            }
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let _ = fmt().with_env_filter(filter).try_init();
}
