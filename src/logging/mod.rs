//! Logging pipeline
//!
//! ```text
//! RawLoggingConfig
//!     ↓  LoggingConfig::from_raw (defaulting or strict)
//! LoggingConfig
//!     ↓  build_router
//! ComposedSink ── general: <base>.log + stdout   (>= min level)
//!              └─ error:   <base>-err.log        (error only)
//!     ↑
//! Logger (debug/info/warn/error)   PipelineLayer (tracing events)
//! ```
//!
//! One [`LoggingPipeline`] is built at startup and its [`Logger`] is handed
//! to whoever needs it. Nothing here is rebuilt while the process runs.

pub mod encoder;
pub mod facade;
pub mod layer;
pub mod record;
pub mod rotation;
pub mod router;
pub mod writer;

pub use encoder::{ColorEncoder, LineEncoder, PlainEncoder};
pub use facade::Logger;
pub use layer::PipelineLayer;
pub use record::{CallerLocation, Field, FieldValue, LogRecord};
pub use rotation::RollingFile;
pub use router::{build_router, build_router_with_console, ComposedSink, SinkDestination};
pub use writer::{LineWriter, MemoryWriter, StdoutWriter};

use std::sync::Arc;
use tracing_subscriber::{filter::LevelFilter, prelude::*, util::TryInitError};

use crate::config::{LoggingConfig, RawLoggingConfig};
use crate::error::PipelineError;

/// The validated configuration, the composed sink and the logger handle
#[derive(Debug, Clone)]
pub struct LoggingPipeline {
    config: LoggingConfig,
    sink: Arc<ComposedSink>,
    logger: Logger,
}

impl LoggingPipeline {
    /// Validate `raw` and open the log files.
    ///
    /// Validation finishes before any file is touched, so a rejected
    /// configuration leaves nothing behind on disk.
    pub fn build(raw: &RawLoggingConfig) -> Result<Self, PipelineError> {
        let config = LoggingConfig::from_raw(raw)?;
        Self::from_config(config)
    }

    pub fn from_config(config: LoggingConfig) -> Result<Self, PipelineError> {
        let sink = Arc::new(build_router(&config)?);
        Ok(Self::with_sink(config, sink))
    }

    /// Use an already composed sink, e.g. one with in-memory writers
    pub fn with_sink(config: LoggingConfig, sink: Arc<ComposedSink>) -> Self {
        let logger = Logger::new(sink.clone()).with_stacktrace_level(config.stacktrace_level);
        Self {
            config,
            sink,
            logger,
        }
    }

    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }

    pub fn sink(&self) -> &Arc<ComposedSink> {
        &self.sink
    }

    pub fn logger(&self) -> Logger {
        self.logger.clone()
    }

    pub fn layer(&self) -> PipelineLayer {
        PipelineLayer::new(self.sink.clone())
    }

    /// Install a global `tracing` subscriber that writes through this
    /// pipeline. Fails if a global subscriber is already set.
    pub fn install_global(&self) -> Result<(), TryInitError> {
        let filter = LevelFilter::from_level(self.config.min_level.to_tracing());
        tracing_subscriber::registry()
            .with(self.layer().with_filter(filter))
            .try_init()
    }
}
