use std::backtrace::Backtrace;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use super::record::{CallerLocation, Field, LogRecord};
use super::router::ComposedSink;
use crate::level::SeverityLevel;

/// Handle call sites log through.
///
/// Cloning is cheap; every clone writes to the same [`ComposedSink`]. The
/// caller location recorded for each line is the call site of `debug`,
/// `info`, `warn` or `error` (or of the `log_*!` macros).
#[derive(Clone)]
pub struct Logger {
    sink: Arc<ComposedSink>,
    name: Arc<str>,
    stacktrace_level: Option<SeverityLevel>,
}

impl Logger {
    pub fn new(sink: Arc<ComposedSink>) -> Self {
        Self {
            sink,
            name: Arc::from(""),
            stacktrace_level: None,
        }
    }

    /// Attach a stacktrace to records at or above `level`
    pub fn with_stacktrace_level(mut self, level: Option<SeverityLevel>) -> Self {
        self.stacktrace_level = level;
        self
    }

    /// Child logger; names are joined with `.`
    pub fn named(&self, name: &str) -> Self {
        let full = if self.name.is_empty() {
            name.to_string()
        } else if name.is_empty() {
            self.name.to_string()
        } else {
            format!("{}.{}", self.name, name)
        };
        Self {
            sink: self.sink.clone(),
            name: Arc::from(full),
            stacktrace_level: self.stacktrace_level,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sink(&self) -> &Arc<ComposedSink> {
        &self.sink
    }

    pub fn enabled(&self, level: SeverityLevel) -> bool {
        self.sink.enabled(level)
    }

    #[track_caller]
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.emit(SeverityLevel::Debug, args, Vec::new(), Location::caller());
    }

    #[track_caller]
    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.emit(SeverityLevel::Info, args, Vec::new(), Location::caller());
    }

    #[track_caller]
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.emit(SeverityLevel::Warn, args, Vec::new(), Location::caller());
    }

    #[track_caller]
    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.emit(SeverityLevel::Error, args, Vec::new(), Location::caller());
    }

    #[track_caller]
    pub fn log(&self, level: SeverityLevel, args: fmt::Arguments<'_>) {
        self.emit(level, args, Vec::new(), Location::caller());
    }

    #[track_caller]
    pub fn log_with_fields(&self, level: SeverityLevel, args: fmt::Arguments<'_>, fields: Vec<Field>) {
        self.emit(level, args, fields, Location::caller());
    }

    /// Flush every underlying writer
    pub fn sync(&self) {
        self.sink.sync();
    }

    fn emit(
        &self,
        level: SeverityLevel,
        args: fmt::Arguments<'_>,
        fields: Vec<Field>,
        caller: &'static Location<'static>,
    ) {
        if !self.sink.enabled(level) {
            return;
        }

        let stacktrace = self
            .stacktrace_level
            .filter(|threshold| threshold.admits(level))
            .map(|_| Backtrace::force_capture().to_string());

        let mut record = LogRecord::new(level, render_message(args));
        record.logger_name = self.name.to_string();
        record.caller = Some(CallerLocation::from(caller));
        record.fields = fields;
        record.stacktrace = stacktrace;

        self.sink.write(&record);
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("min_level", &self.sink.min_level())
            .finish()
    }
}

/// Format `args` without panicking.
///
/// `format!` panics when a `Display` impl reports an error; here the text
/// produced so far is kept and marked instead.
pub fn render_message(args: fmt::Arguments<'_>) -> String {
    if let Some(literal) = args.as_str() {
        return literal.to_string();
    }

    let mut out = String::new();
    match fmt::write(&mut out, args) {
        Ok(()) => out,
        Err(_) if out.is_empty() => "<unformattable message>".to_string(),
        Err(_) => {
            out.push_str(" <formatting error>");
            out
        }
    }
}

#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)+) => {
        $logger.debug(::std::format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($arg:tt)+) => {
        $logger.info(::std::format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($logger:expr, $($arg:tt)+) => {
        $logger.warn(::std::format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! log_error {
    ($logger:expr, $($arg:tt)+) => {
        $logger.error(::std::format_args!($($arg)+))
    };
}
