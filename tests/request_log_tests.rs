/// Integration tests for the request-log middleware
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode},
    middleware,
    response::IntoResponse,
    routing::get,
    Extension, Router,
};
use serde_json::Value;
use tower::ServiceExt;

use tiered_log::{
    logging::{ComposedSink, LineEncoder, Logger, MemoryWriter, PlainEncoder, SinkDestination},
    request_log_middleware, AppError, ErrorCollector, RequestError, RequestErrors,
    RequestLogState, SeverityLevel,
};

fn memory_logger(level: SeverityLevel) -> (Logger, MemoryWriter) {
    let memory = MemoryWriter::new();
    let encoder: Arc<dyn LineEncoder> = Arc::new(PlainEncoder);
    let sink = ComposedSink::new(vec![
        SinkDestination::new("memory", level, encoder).with_writer(Arc::new(memory.clone())),
    ]);
    (Logger::new(Arc::new(sink)), memory)
}

async fn mixed_errors(Extension(errors): Extension<ErrorCollector>) -> impl IntoResponse {
    errors.record(RequestError::public("shown to the client"));
    errors.record(RequestError::private("replica lag 3s"));

    let mut attached = RequestErrors::new();
    attached.push(RequestError::private("fallback to primary"));
    let mut response = (StatusCode::OK, "ok").into_response();
    response.extensions_mut().insert(attached);
    response
}

async fn broken() -> Result<&'static str, AppError> {
    Err(AppError::InternalError("connection reset".to_string()))
}

fn app(logger: Logger, trust_forwarded_headers: bool) -> Router {
    Router::new()
        .route("/ok", get(|| async { "hello" }).options(|| async { StatusCode::NO_CONTENT }))
        .route("/mixed", get(mixed_errors))
        .route("/broken", get(broken))
        .layer(middleware::from_fn_with_state(
            RequestLogState::new(logger, trust_forwarded_headers),
            request_log_middleware,
        ))
}

fn request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Path and fields of an access line, the last two tab-separated columns
fn access_entry(line: &str) -> (String, Value) {
    let mut columns = line.rsplitn(3, '\t');
    let fields = serde_json::from_str(columns.next().unwrap()).unwrap();
    let path = columns.next().unwrap().to_string();
    (path, fields)
}

#[tokio::test]
async fn test_access_line_is_written_at_debug() {
    let (logger, memory) = memory_logger(SeverityLevel::Debug);
    let response = app(logger, true)
        .oneshot(request("GET", "/ok?name=ada&lang=en"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let lines = memory.lines();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].split('\t').nth(1), Some("debug"));

    let (path, fields) = access_entry(&lines[0]);
    assert_eq!(path, "/ok?name=ada&lang=en");
    assert_eq!(fields["status"], 200);
    assert_eq!(fields["method"], "GET");
    assert_eq!(fields["size"], 5);
    assert!(fields.get("errors").is_none());

    // seconds as a bare number, not a unit-suffixed string
    let latency = fields["latency"].as_f64().unwrap();
    assert!((0.0..60.0).contains(&latency));
}

#[tokio::test]
async fn test_options_requests_are_not_logged() {
    let (logger, memory) = memory_logger(SeverityLevel::Debug);
    let response = app(logger, true).oneshot(request("OPTIONS", "/ok")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(memory.contents().is_empty());
}

#[tokio::test]
async fn test_nothing_logged_when_debug_disabled() {
    let (logger, memory) = memory_logger(SeverityLevel::Info);
    let response = app(logger, true).oneshot(request("GET", "/broken")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(memory.contents().is_empty());
}

#[tokio::test]
async fn test_only_private_errors_are_reported() {
    let (logger, memory) = memory_logger(SeverityLevel::Debug);
    app(logger, true).oneshot(request("GET", "/mixed")).await.unwrap();

    let lines = memory.lines();
    let (_, fields) = access_entry(&lines[0]);
    assert_eq!(
        fields["errors"],
        "Error #01: replica lag 3s; Error #02: fallback to primary"
    );
    assert!(!lines[0].contains("shown to the client"));
}

#[tokio::test]
async fn test_app_error_detail_reaches_log_not_client() {
    let (logger, memory) = memory_logger(SeverityLevel::Debug);
    let response = app(logger, true).oneshot(request("GET", "/broken")).await.unwrap();

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = String::from_utf8(body.to_vec()).unwrap();
    assert!(!body.contains("connection reset"));

    let lines = memory.lines();
    let (_, fields) = access_entry(&lines[0]);
    assert_eq!(fields["status"], 500);
    assert_eq!(fields["errors"], "Error #01: connection reset");
}

#[tokio::test]
async fn test_client_ip_sources() {
    let peer = SocketAddr::from(([192, 168, 1, 20], 51000));

    let forwarded = || {
        let mut req = Request::builder()
            .uri("/ok")
            .header("x-forwarded-for", "203.0.113.5, 10.0.0.2")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut().insert(ConnectInfo(peer));
        req
    };

    let (logger, memory) = memory_logger(SeverityLevel::Debug);
    app(logger, true).oneshot(forwarded()).await.unwrap();
    assert_eq!(access_entry(&memory.lines()[0]).1["ip"], "203.0.113.5");

    let (logger, memory) = memory_logger(SeverityLevel::Debug);
    app(logger, false).oneshot(forwarded()).await.unwrap();
    assert_eq!(access_entry(&memory.lines()[0]).1["ip"], "192.168.1.20");
}

#[tokio::test]
async fn test_unknown_client_ip_is_omitted() {
    let (logger, memory) = memory_logger(SeverityLevel::Debug);
    app(logger, true).oneshot(request("GET", "/ok")).await.unwrap();

    let (_, fields) = access_entry(&memory.lines()[0]);
    assert!(fields.get("ip").is_none());
}
