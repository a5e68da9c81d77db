//! Access logging middleware
//!
//! Wraps the handler chain, then writes one debug line per request: the
//! path as the message and the rest as fields, latency in fractional
//! seconds.
//!
//! ```text
//! 2024-05-01 12:30:00	debug	http	src/request_log.rs:140	/echo?msg=hi	{"status":200,"method":"GET","ip":"127.0.0.1","latency":0.00042,"size":13}
//! ```

use axum::{
    body::HttpBody,
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::error::{ErrorCollector, RequestErrors};
use crate::level::SeverityLevel;
use crate::logging::{Field, Logger};

/// Latencies above this are reported in whole seconds
pub const LATENCY_TRUNCATION_THRESHOLD: Duration = Duration::from_secs(60);

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// State for [`request_log_middleware`]
#[derive(Debug, Clone)]
pub struct RequestLogState {
    pub logger: Logger,
    /// Prefer `X-Forwarded-For` / `X-Real-IP` over the socket address
    pub trust_forwarded_headers: bool,
}

impl RequestLogState {
    pub fn new(logger: Logger, trust_forwarded_headers: bool) -> Self {
        Self {
            logger,
            trust_forwarded_headers,
        }
    }
}

/// What one completed request looked like
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLogEntry {
    pub status_code: u16,
    pub latency: Duration,
    /// Empty when no address could be determined
    pub client_ip: String,
    pub method: String,
    /// Path plus `?query` when a query string was sent
    pub path: String,
    /// Private errors only; empty when there were none
    pub error_message: String,
    /// `None` when the body size is not known up front (streaming bodies)
    pub body_size_bytes: Option<u64>,
}

impl RequestLogEntry {
    /// Structured fields for the access line. Unknown client IP, body size
    /// and an empty error message are left out.
    pub fn fields(&self) -> Vec<Field> {
        let mut fields = vec![
            Field::new("status", self.status_code),
            Field::new("method", self.method.as_str()),
        ];
        if !self.client_ip.is_empty() {
            fields.push(Field::new("ip", self.client_ip.as_str()));
        }
        fields.push(Field::new("latency", self.latency));
        if let Some(size) = self.body_size_bytes {
            fields.push(Field::new("size", size));
        }
        if !self.error_message.is_empty() {
            fields.push(Field::new("errors", self.error_message.as_str()));
        }
        fields
    }
}

/// Drop the sub-second part of latencies above one minute
pub fn reported_latency(elapsed: Duration) -> Duration {
    if elapsed > LATENCY_TRUNCATION_THRESHOLD {
        Duration::from_secs(elapsed.as_secs())
    } else {
        elapsed
    }
}

/// Axum middleware writing one access line per request at debug level.
///
/// OPTIONS requests are never logged. Nothing in here can change or fail
/// the response.
pub async fn request_log_middleware(
    State(state): State<RequestLogState>,
    mut req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = match req.uri().query() {
        Some(query) if !query.is_empty() => format!("{}?{}", req.uri().path(), query),
        _ => req.uri().path().to_string(),
    };
    let client_ip = client_ip(&req, state.trust_forwarded_headers);

    let collector = ErrorCollector::new();
    req.extensions_mut().insert(collector.clone());

    let response = next.run(req).await;

    if method == Method::OPTIONS || !state.logger.enabled(SeverityLevel::Debug) {
        return response;
    }

    let mut errors = collector.take();
    if let Some(attached) = response.extensions().get::<RequestErrors>() {
        errors.extend(attached.clone());
    }

    let entry = RequestLogEntry {
        status_code: response.status().as_u16(),
        latency: reported_latency(start.elapsed()),
        client_ip,
        method: method.to_string(),
        path,
        error_message: errors.private_summary(),
        body_size_bytes: body_size(&response),
    };

    state.logger.log_with_fields(
        SeverityLevel::Debug,
        format_args!("{}", entry.path),
        entry.fields(),
    );
    response
}

fn client_ip(req: &Request, trust_forwarded_headers: bool) -> String {
    if trust_forwarded_headers {
        if let Some(ip) = forwarded_ip(req.headers()) {
            return ip;
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default()
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    let from_header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    from_header(X_FORWARDED_FOR).or_else(|| from_header(X_REAL_IP))
}

fn body_size(response: &Response) -> Option<u64> {
    response.body().size_hint().exact().or_else(|| {
        response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
    })
}
