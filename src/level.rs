use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Severity of a log record, ordered `Debug < Info < Warn < Error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl SeverityLevel {
    pub const ALL: [SeverityLevel; 4] = [
        SeverityLevel::Debug,
        SeverityLevel::Info,
        SeverityLevel::Warn,
        SeverityLevel::Error,
    ];

    /// Lowercase name, as written to persisted files
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Capitalized name, used by the console encoder
    pub fn as_capital_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }

    /// Whether a sink gated at `self` accepts a record at `level`
    pub fn admits(&self, level: SeverityLevel) -> bool {
        level >= *self
    }

    /// Map a `tracing` level onto a severity. TRACE has no counterpart.
    pub fn from_tracing(level: &tracing::Level) -> Option<Self> {
        match *level {
            tracing::Level::TRACE => None,
            tracing::Level::DEBUG => Some(Self::Debug),
            tracing::Level::INFO => Some(Self::Info),
            tracing::Level::WARN => Some(Self::Warn),
            tracing::Level::ERROR => Some(Self::Error),
        }
    }

    pub fn to_tracing(self) -> tracing::Level {
        match self {
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a level name is not one of the known severities
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized log level: {0:?}")]
pub struct ParseLevelError(pub String);

impl FromStr for SeverityLevel {
    type Err = ParseLevelError;

    /// Case-insensitive; `warning` is accepted as an alias of `warn`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}
