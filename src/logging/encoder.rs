//! Line encoding shared by every destination.
//!
//! A line is tab separated:
//!
//! ```text
//! 2024-05-01 12:30:00	info	http	request_log.rs:136	/echo?msg=hi	{"status":200}
//! ```
//!
//! time, level, logger name (omitted when empty), short caller, message, then
//! the structured fields as one JSON object when there are any. A stacktrace
//! follows on the next lines.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use colored::Colorize;
use std::fmt::Write as _;

use super::record::LogRecord;
use crate::level::SeverityLevel;

/// `YYYY-MM-DD HH:MM:SS`
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Turns one record into one text line, including the trailing newline
pub trait LineEncoder: Send + Sync {
    fn encode(&self, record: &LogRecord, out: &mut String);
}

/// Lowercase levels, no escape codes. Used for every persisted file.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainEncoder;

/// Capitalized, colored levels for an interactive terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorEncoder;

impl LineEncoder for PlainEncoder {
    fn encode(&self, record: &LogRecord, out: &mut String) {
        encode_with_level(record, record.level.as_str(), out);
    }
}

impl LineEncoder for ColorEncoder {
    fn encode(&self, record: &LogRecord, out: &mut String) {
        let name = record.level.as_capital_str();
        let level = match record.level {
            SeverityLevel::Debug => name.magenta(),
            SeverityLevel::Info => name.blue(),
            SeverityLevel::Warn => name.yellow(),
            SeverityLevel::Error => name.red(),
        };
        encode_with_level(record, &level.to_string(), out);
    }
}

fn encode_with_level(record: &LogRecord, level: &str, out: &mut String) {
    out.push_str(&format_timestamp(&record.timestamp));
    out.push('\t');
    out.push_str(level);

    if !record.logger_name.is_empty() {
        out.push('\t');
        out.push_str(&record.logger_name);
    }

    if let Some(caller) = &record.caller {
        out.push('\t');
        out.push_str(&caller.short());
    }

    out.push('\t');
    out.push_str(&record.message);

    if !record.fields.is_empty() {
        out.push('\t');
        encode_fields(record, out);
    }

    if let Some(stacktrace) = &record.stacktrace {
        out.push('\n');
        out.push_str(stacktrace.trim_end());
    }

    out.push('\n');
}

/// Fields keep their emission order, so the object is assembled by hand
fn encode_fields(record: &LogRecord, out: &mut String) {
    out.push('{');
    for (idx, field) in record.fields.iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        let key = serde_json::Value::from(field.key.as_str());
        let _ = write!(out, "{}:{}", key, field.value.to_json());
    }
    out.push('}');
}

pub fn format_timestamp(timestamp: &DateTime<Local>) -> String {
    timestamp.format(TIME_FORMAT).to_string()
}

/// Inverse of [`format_timestamp`]
pub fn parse_timestamp(text: &str) -> Option<DateTime<Local>> {
    let naive = NaiveDateTime::parse_from_str(text, TIME_FORMAT).ok()?;
    Local.from_local_datetime(&naive).earliest()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::record::{CallerLocation, Field};
    use std::time::Duration;

    fn fixed_record() -> LogRecord {
        let timestamp = Local.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        LogRecord {
            timestamp,
            level: SeverityLevel::Warn,
            logger_name: String::new(),
            caller: Some(CallerLocation::new("src/server.rs", 17)),
            message: "disk almost full".to_string(),
            fields: Vec::new(),
            stacktrace: None,
        }
    }

    fn plain(record: &LogRecord) -> String {
        let mut out = String::new();
        PlainEncoder.encode(record, &mut out);
        out
    }

    #[test]
    fn test_plain_line_layout() {
        assert_eq!(
            plain(&fixed_record()),
            "2024-05-01 12:30:00\twarn\tsrc/server.rs:17\tdisk almost full\n"
        );
    }

    #[test]
    fn test_logger_name_included_when_set() {
        let mut record = fixed_record();
        record.logger_name = "http.access".to_string();
        assert_eq!(
            plain(&record),
            "2024-05-01 12:30:00\twarn\thttp.access\tsrc/server.rs:17\tdisk almost full\n"
        );
    }

    #[test]
    fn test_fields_keep_order_and_durations_are_seconds() {
        let mut record = fixed_record();
        record.fields = vec![
            Field::new("path", "/a"),
            Field::new("latency", Duration::from_millis(250)),
            Field::new("status", 200u16),
        ];
        assert!(plain(&record)
            .ends_with("\tdisk almost full\t{\"path\":\"/a\",\"latency\":0.25,\"status\":200}\n"));
    }

    #[test]
    fn test_stacktrace_on_following_lines() {
        let mut record = fixed_record();
        record.stacktrace = Some("0: main\n1: start\n".to_string());
        assert!(plain(&record).ends_with("disk almost full\n0: main\n1: start\n"));
    }

    #[test]
    fn test_color_encoder_capitalizes_level() {
        let mut out = String::new();
        ColorEncoder.encode(&fixed_record(), &mut out);
        assert!(out.contains("WARN"));
        assert!(!out.contains("\twarn\t"));
        assert!(out.ends_with("disk almost full\n"));
    }

    #[test]
    fn test_timestamp_round_trip() {
        let now = Local::now();
        let parsed = parse_timestamp(&format_timestamp(&now)).unwrap();
        assert_eq!(parsed.timestamp(), now.timestamp());
    }

    #[test]
    fn test_parse_timestamp_rejects_other_formats() {
        assert!(parse_timestamp("2024-05-01T12:30:00Z").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
