//! The immutable record handed from the facade to the router.

use chrono::{DateTime, Local};
use serde_json::Value;
use std::panic::Location;
use std::time::Duration;

use crate::level::SeverityLevel;

/// Source location of the emitting call site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerLocation {
    pub file: &'static str,
    pub line: u32,
}

impl CallerLocation {
    pub fn new(file: &'static str, line: u32) -> Self {
        Self { file, line }
    }

    /// `dir/file.rs:line`: the last two path components and the line
    pub fn short(&self) -> String {
        let mut parts = self.file.rsplit(|c: char| c == '/' || c == '\\');
        let file = parts.next().unwrap_or(self.file);
        match parts.next() {
            Some(dir) if !dir.is_empty() => format!("{}/{}:{}", dir, file, self.line),
            _ => format!("{}:{}", file, self.line),
        }
    }
}

impl From<&'static Location<'static>> for CallerLocation {
    fn from(location: &'static Location<'static>) -> Self {
        Self::new(location.file(), location.line())
    }
}

/// Value of a structured field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    /// Encoded as fractional seconds
    Duration(Duration),
}

impl FieldValue {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Str(s) => Value::from(s.as_str()),
            Self::I64(v) => Value::from(*v),
            Self::U64(v) => Value::from(*v),
            Self::F64(v) => Value::from(*v),
            Self::Bool(v) => Value::from(*v),
            Self::Duration(d) => Value::from(d.as_secs_f64()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::I64(v)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        Self::U64(v)
    }
}

impl From<u16> for FieldValue {
    fn from(v: u16) -> Self {
        Self::U64(u64::from(v))
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::F64(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Duration> for FieldValue {
    fn from(v: Duration) -> Self {
        Self::Duration(v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub key: String,
    pub value: FieldValue,
}

impl Field {
    pub fn new(key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// One log emission
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub timestamp: DateTime<Local>,
    pub level: SeverityLevel,
    /// Empty for the root logger
    pub logger_name: String,
    pub caller: Option<CallerLocation>,
    pub message: String,
    pub fields: Vec<Field>,
    pub stacktrace: Option<String>,
}

impl LogRecord {
    pub fn new(level: SeverityLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            logger_name: String::new(),
            caller: None,
            message: message.into(),
            fields: Vec::new(),
            stacktrace: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_caller() {
        assert_eq!(CallerLocation::new("src/logging/facade.rs", 42).short(), "logging/facade.rs:42");
        assert_eq!(CallerLocation::new("main.rs", 7).short(), "main.rs:7");
        assert_eq!(CallerLocation::new("/main.rs", 7).short(), "main.rs:7");
        assert_eq!(
            CallerLocation::new(r"src\server\routes.rs", 3).short(),
            "server/routes.rs:3"
        );
    }

    #[test]
    fn test_duration_is_fractional_seconds() {
        let value = FieldValue::from(Duration::from_millis(1500)).to_json();
        assert_eq!(value, serde_json::json!(1.5));
    }
}
