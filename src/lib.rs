pub mod config;
pub mod error;
pub mod level;
pub mod logging;
pub mod request_log;
pub mod server;
pub mod signals;

pub use config::{Config, LoggingConfig, RawLoggingConfig, ValidationPolicy};
pub use error::{AppError, ErrorCollector, ErrorVisibility, PipelineError, RequestError, RequestErrors};
pub use level::SeverityLevel;
pub use logging::{Logger, LoggingPipeline};
pub use request_log::{request_log_middleware, RequestLogEntry, RequestLogState};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize console tracing for commands that run without a pipeline
///
/// Note: This function can only be called once. `start` installs the
/// pipeline's own subscriber instead.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}
