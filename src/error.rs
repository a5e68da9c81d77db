use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors raised while building the logging pipeline.
///
/// All of them are fatal at startup: no logging path exists yet to report
/// them, so they surface through the process exit status and stderr.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid log level {0:?}: expected one of debug, info, warn, error")]
    InvalidLevel(String),

    #[error("missing required logging settings: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("logging setting {field} = {value} is out of range (max {max})")]
    OutOfRange {
        field: &'static str,
        value: u64,
        max: u64,
    },

    #[error("failed to open log file {}: {source}", .path.display())]
    OpenSink {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Who may see an error attached to a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorVisibility {
    /// Internal detail, written to the access log only
    Private,
    /// Safe to return to the client, not repeated in the access log
    Public,
}

/// An error accumulated while handling one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestError {
    pub visibility: ErrorVisibility,
    pub message: String,
}

impl RequestError {
    pub fn private(message: impl Into<String>) -> Self {
        Self {
            visibility: ErrorVisibility::Private,
            message: message.into(),
        }
    }

    pub fn public(message: impl Into<String>) -> Self {
        Self {
            visibility: ErrorVisibility::Public,
            message: message.into(),
        }
    }
}

/// Errors carried on a response, in the order they were recorded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestErrors(Vec<RequestError>);

impl RequestErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: RequestError) {
        self.0.push(error);
    }

    pub fn extend(&mut self, other: RequestErrors) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RequestError> {
        self.0.iter()
    }

    /// Render the private errors as `Error #01: ...; Error #02: ...`.
    ///
    /// Empty when there are none.
    pub fn private_summary(&self) -> String {
        self.0
            .iter()
            .filter(|e| e.visibility == ErrorVisibility::Private)
            .enumerate()
            .map(|(idx, e)| format!("Error #{:02}: {}", idx + 1, e.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Request extension handlers use to record errors without failing the
/// response. The request-log middleware installs one per request.
#[derive(Debug, Clone, Default)]
pub struct ErrorCollector(Arc<Mutex<RequestErrors>>);

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, error: RequestError) {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(error);
    }

    pub fn take(&self) -> RequestErrors {
        std::mem::take(&mut *self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }
}

/// Application error types returned by HTTP handlers
#[derive(Debug)]
pub enum AppError {
    /// Malformed client input
    BadRequest(String),
    /// Unknown resource
    NotFound(String),
    /// Internal server error; the detail is only written to the access log
    InternalError(String),
}

impl AppError {
    fn request_error(&self) -> RequestError {
        match self {
            Self::BadRequest(msg) | Self::NotFound(msg) => RequestError::public(msg.clone()),
            Self::InternalError(msg) => RequestError::private(msg.clone()),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            Self::NotFound(msg) => write!(f, "Not found: {}", msg),
            Self::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            // Internal details stay out of the response body
            Self::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "message": error_message,
                "type": error_type_name(&self),
            }
        }));

        let mut errors = RequestErrors::new();
        errors.push(self.request_error());

        let mut response = (status, body).into_response();
        response.extensions_mut().insert(errors);
        response
    }
}

fn error_type_name(error: &AppError) -> &'static str {
    match error {
        AppError::BadRequest(_) => "bad_request",
        AppError::NotFound(_) => "not_found",
        AppError::InternalError(_) => "internal_error",
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}
