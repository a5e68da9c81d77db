use anyhow::Result;
use axum::{
    extract::{DefaultBodyLimit, Query, State},
    middleware,
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use tracing::info;

use crate::{
    config::ServerConfig,
    error::{AppError, ErrorCollector, RequestError},
    logging::{LoggingPipeline, Logger},
    request_log::{request_log_middleware, RequestLogState},
    signals::setup_signal_handlers,
};

/// Shared state for the demo handlers
#[derive(Debug, Clone)]
pub struct AppState {
    pub logger: Logger,
}

/// Start the demo server
///
/// This function:
/// 1. Sets up signal handlers for graceful shutdown
/// 2. Creates the Axum application wrapped in the request-log middleware
/// 3. Binds to the configured address
/// 4. Serves requests until shutdown, then flushes the log files
pub async fn start_server(server: &ServerConfig, pipeline: &LoggingPipeline) -> Result<()> {
    let (shutdown_tx, signal_handle) = setup_signal_handlers();
    let mut shutdown_rx = shutdown_tx.subscribe();

    let logger = pipeline.logger();
    let app_state = AppState {
        logger: logger.named("app"),
    };
    let request_log = RequestLogState::new(logger.named("http"), server.trust_forwarded_headers);
    let app = create_router(app_state, request_log);

    let addr = SocketAddr::from((server.host.parse::<std::net::IpAddr>()?, server.port));

    info!("Starting tiered-log demo server on {}", addr);
    info!(
        "Logging: level {}, general {}, errors {}",
        pipeline.config().min_level,
        pipeline.config().general_path().display(),
        pipeline.config().error_path().display()
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // ConnectInfo gives the middleware a client address when no forwarding
    // header is present
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = shutdown_rx.recv().await;
        info!("Shutdown signal received, draining connections...");
    })
    .await?;

    signal_handle.await?;
    info!("Server stopped gracefully");
    logger.sync();

    Ok(())
}

/// Create the Axum router with all routes and the request-log middleware
pub fn create_router(app_state: AppState, request_log: RequestLogState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/echo", get(echo).options(preflight))
        .route("/fail", get(fail))
        .route("/work", get(work))
        .with_state(app_state)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(middleware::from_fn_with_state(
            request_log,
            request_log_middleware,
        ))
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct EchoParams {
    msg: Option<String>,
}

async fn echo(Query(params): Query<EchoParams>) -> Result<Json<Value>, AppError> {
    match params.msg {
        Some(msg) if !msg.is_empty() => Ok(Json(json!({ "message": msg }))),
        _ => Err(AppError::BadRequest("query parameter `msg` is required".to_string())),
    }
}

async fn preflight() -> axum::http::StatusCode {
    axum::http::StatusCode::NO_CONTENT
}

async fn fail(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    state.logger.warn(format_args!("/fail called, returning an internal error"));
    Err(AppError::InternalError("simulated backend failure".to_string()))
}

/// Succeeds, but records a private error the client never sees
async fn work(
    State(state): State<AppState>,
    Extension(errors): Extension<ErrorCollector>,
) -> Json<Value> {
    errors.record(RequestError::private("cache unavailable, computed directly"));
    state.logger.info(format_args!("work finished without cache"));
    Json(json!({ "status": "done" }))
}
