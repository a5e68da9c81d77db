//! Severity routing: named, level-gated destinations composed into one
//! fan-out sink.

use std::sync::Arc;

use super::encoder::{ColorEncoder, LineEncoder, PlainEncoder};
use super::record::LogRecord;
use super::rotation::RollingFile;
use super::writer::{LineWriter, StdoutWriter};
use crate::config::LoggingConfig;
use crate::error::PipelineError;
use crate::level::SeverityLevel;

pub const GENERAL_DESTINATION: &str = "general";
pub const ERROR_DESTINATION: &str = "error";
pub const CONSOLE_DESTINATION: &str = "console";

/// A group of writers receiving every record at or above `min_level`
pub struct SinkDestination {
    name: String,
    min_level: SeverityLevel,
    encoder: Arc<dyn LineEncoder>,
    writers: Vec<Arc<dyn LineWriter>>,
}

impl SinkDestination {
    pub fn new(name: impl Into<String>, min_level: SeverityLevel, encoder: Arc<dyn LineEncoder>) -> Self {
        Self {
            name: name.into(),
            min_level,
            encoder,
            writers: Vec::new(),
        }
    }

    pub fn with_writer(mut self, writer: Arc<dyn LineWriter>) -> Self {
        self.writers.push(writer);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn min_level(&self) -> SeverityLevel {
        self.min_level
    }

    pub fn writer_count(&self) -> usize {
        self.writers.len()
    }

    pub fn admits(&self, level: SeverityLevel) -> bool {
        self.min_level.admits(level)
    }

    /// Encode once, then append the line to every writer.
    ///
    /// A failing writer is reported on stderr and skipped; the others still
    /// receive the line.
    fn write(&self, record: &LogRecord) {
        let mut line = String::with_capacity(128 + record.message.len());
        self.encoder.encode(record, &mut line);

        for writer in &self.writers {
            if let Err(e) = writer.write_line(line.as_bytes()) {
                eprintln!(
                    "tiered-log: failed to write to {} ({} destination): {}",
                    writer.describe(),
                    self.name,
                    e
                );
            }
        }
    }

    fn sync(&self) {
        for writer in &self.writers {
            if let Err(e) = writer.flush() {
                eprintln!("tiered-log: failed to flush {}: {}", writer.describe(), e);
            }
        }
    }
}

impl std::fmt::Debug for SinkDestination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkDestination")
            .field("name", &self.name)
            .field("min_level", &self.min_level)
            .field(
                "writers",
                &self.writers.iter().map(|w| w.describe()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Tee over all destinations. Destinations are not exclusive: an error
/// record reaches the general destination as well as the error one.
#[derive(Debug)]
pub struct ComposedSink {
    destinations: Vec<SinkDestination>,
    min_level: Option<SeverityLevel>,
}

impl ComposedSink {
    pub fn new(destinations: Vec<SinkDestination>) -> Self {
        let min_level = destinations.iter().map(|d| d.min_level).min();
        Self {
            destinations,
            min_level,
        }
    }

    pub fn destinations(&self) -> &[SinkDestination] {
        &self.destinations
    }

    pub fn destination(&self, name: &str) -> Option<&SinkDestination> {
        self.destinations.iter().find(|d| d.name == name)
    }

    /// Lowest level any destination accepts; `None` when there are none
    pub fn min_level(&self) -> Option<SeverityLevel> {
        self.min_level
    }

    /// Whether any destination would accept a record at `level`
    pub fn enabled(&self, level: SeverityLevel) -> bool {
        self.min_level.is_some_and(|min| min.admits(level))
    }

    pub fn write(&self, record: &LogRecord) {
        for destination in &self.destinations {
            if destination.admits(record.level) {
                destination.write(record);
            }
        }
    }

    /// Flush every writer of every destination
    pub fn sync(&self) {
        for destination in &self.destinations {
            destination.sync();
        }
    }
}

/// Build the general and error destinations for `config`, with stdout as
/// the console writer.
///
/// Opens (creating if needed) `<base>.log` and `<base>-err.log`.
pub fn build_router(config: &LoggingConfig) -> Result<ComposedSink, PipelineError> {
    build_router_with_console(config, Arc::new(StdoutWriter))
}

/// As [`build_router`], writing console output to `console` instead of
/// stdout
pub fn build_router_with_console(
    config: &LoggingConfig,
    console: Arc<dyn LineWriter>,
) -> Result<ComposedSink, PipelineError> {
    let plain: Arc<dyn LineEncoder> = Arc::new(PlainEncoder);

    let general_file = open_rolling(config, config.general_path())?;
    let error_file = open_rolling(config, config.error_path())?;

    let mut general = SinkDestination::new(GENERAL_DESTINATION, config.min_level, plain.clone())
        .with_writer(general_file);
    let error = SinkDestination::new(ERROR_DESTINATION, SeverityLevel::Error, plain)
        .with_writer(error_file);

    let mut destinations = Vec::with_capacity(3);
    if config.console_color {
        destinations.push(general);
        destinations.push(error);
        destinations.push(
            SinkDestination::new(CONSOLE_DESTINATION, config.min_level, Arc::new(ColorEncoder))
                .with_writer(console),
        );
    } else {
        general = general.with_writer(console);
        destinations.push(general);
        destinations.push(error);
    }

    Ok(ComposedSink::new(destinations))
}

fn open_rolling(
    config: &LoggingConfig,
    path: std::path::PathBuf,
) -> Result<Arc<dyn LineWriter>, PipelineError> {
    let file = RollingFile::open(&path, config.max_size_mb, config.max_backups, config.max_age_days)
        .map_err(|source| PipelineError::OpenSink { path, source })?;
    Ok(Arc::new(file))
}
