use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::level::SeverityLevel;

pub const DEFAULT_LEVEL: SeverityLevel = SeverityLevel::Info;
pub const DEFAULT_FILE_NAME: &str = "system.log";
pub const DEFAULT_MAX_SIZE_MB: u64 = 100;
pub const DEFAULT_MAX_BACKUPS: usize = 30;
pub const DEFAULT_MAX_AGE_DAYS: u64 = 30;
/// About a century; retention beyond that is indistinguishable from none
pub const MAX_AGE_DAYS: u64 = 36_500;

const LOG_SUFFIX: &str = ".log";
const ERROR_SUFFIX: &str = "-err.log";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: RawLoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Take the client IP from `X-Forwarded-For` / `X-Real-IP` when present
    pub trust_forwarded_headers: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            trust_forwarded_headers: true,
        }
    }
}

/// How missing logging settings are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationPolicy {
    /// Fill every empty/zero setting with its built-in default
    #[default]
    Defaulting,
    /// Every setting is required; all missing ones are reported together
    Strict,
}

/// Logging settings as supplied by the configuration loader.
///
/// Empty strings and zeros mean "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RawLoggingConfig {
    pub level: String,
    pub file_name: String,
    pub max_size_mb: u64,
    pub max_backups: usize,
    pub max_age_days: u64,
    pub policy: ValidationPolicy,
    /// Colorize stdout with a separate console encoder
    pub console_color: bool,
    /// Attach a stacktrace to records at or above this level
    pub stacktrace_level: String,
}

/// Validated logging configuration. Every field is populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub min_level: SeverityLevel,
    pub base_file_name: String,
    pub max_size_mb: u64,
    pub max_backups: usize,
    pub max_age_days: u64,
    pub console_color: bool,
    pub stacktrace_level: Option<SeverityLevel>,
}

impl LoggingConfig {
    /// Validate `raw` under its policy.
    ///
    /// Every setting is first checked for presence, so under
    /// [`ValidationPolicy::Strict`] all missing ones are returned in a single
    /// error even when a supplied value is also malformed. Values are parsed
    /// afterwards: level names case-insensitively in both policies, and
    /// `max_age_days` bounded by [`MAX_AGE_DAYS`].
    pub fn from_raw(raw: &RawLoggingConfig) -> Result<Self, PipelineError> {
        let mut missing = Vec::new();

        let level_name = raw.level.trim();
        if level_name.is_empty() {
            missing.push("level");
        }

        let file_name = if raw.file_name.trim().is_empty() {
            missing.push("file_name");
            DEFAULT_FILE_NAME.to_string()
        } else {
            raw.file_name.clone()
        };

        let max_size_mb = non_zero(raw.max_size_mb, DEFAULT_MAX_SIZE_MB, "max_size_mb", &mut missing);
        let max_backups = non_zero(raw.max_backups, DEFAULT_MAX_BACKUPS, "max_backups", &mut missing);
        let max_age_days = non_zero(raw.max_age_days, DEFAULT_MAX_AGE_DAYS, "max_age_days", &mut missing);

        if raw.policy == ValidationPolicy::Strict && !missing.is_empty() {
            return Err(PipelineError::MissingFields(missing));
        }

        let min_level = if level_name.is_empty() {
            DEFAULT_LEVEL
        } else {
            parse_level(level_name)?
        };

        if max_age_days > MAX_AGE_DAYS {
            return Err(PipelineError::OutOfRange {
                field: "max_age_days",
                value: max_age_days,
                max: MAX_AGE_DAYS,
            });
        }

        let stacktrace_level = match raw.stacktrace_level.trim() {
            "" => None,
            name => Some(parse_level(name)?),
        };

        Ok(Self {
            min_level,
            base_file_name: file_name,
            max_size_mb,
            max_backups,
            max_age_days,
            console_color: raw.console_color,
            stacktrace_level,
        })
    }

    /// The file name with one trailing `.log` removed
    pub fn base_name(&self) -> &str {
        self.base_file_name
            .strip_suffix(LOG_SUFFIX)
            .unwrap_or(&self.base_file_name)
    }

    /// `<base>.log`, receiving every record at or above `min_level`
    pub fn general_path(&self) -> PathBuf {
        PathBuf::from(format!("{}{}", self.base_name(), LOG_SUFFIX))
    }

    /// `<base>-err.log`, receiving error records only
    pub fn error_path(&self) -> PathBuf {
        PathBuf::from(format!("{}{}", self.base_name(), ERROR_SUFFIX))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            min_level: DEFAULT_LEVEL,
            base_file_name: DEFAULT_FILE_NAME.to_string(),
            max_size_mb: DEFAULT_MAX_SIZE_MB,
            max_backups: DEFAULT_MAX_BACKUPS,
            max_age_days: DEFAULT_MAX_AGE_DAYS,
            console_color: false,
            stacktrace_level: None,
        }
    }
}

fn parse_level(name: &str) -> Result<SeverityLevel, PipelineError> {
    name.parse()
        .map_err(|_| PipelineError::InvalidLevel(name.to_string()))
}

fn non_zero<T>(value: T, default: T, field: &'static str, missing: &mut Vec<&'static str>) -> T
where
    T: PartialEq + Default,
{
    if value == T::default() {
        missing.push(field);
        default
    } else {
        value
    }
}

/// Load the configuration file, then apply `TIERED_LOG__*` environment
/// overrides (e.g. `TIERED_LOG__LOGGING__LEVEL=debug`).
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(config::Environment::with_prefix("TIERED_LOG").separator("__"))
        .build()?;

    let cfg: Config = config.try_deserialize()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_raw() -> RawLoggingConfig {
        RawLoggingConfig {
            level: "debug".to_string(),
            file_name: "logs/app.log".to_string(),
            max_size_mb: 10,
            max_backups: 5,
            max_age_days: 7,
            policy: ValidationPolicy::Strict,
            console_color: false,
            stacktrace_level: String::new(),
        }
    }

    #[test]
    fn test_defaulting_fills_everything() {
        let cfg = LoggingConfig::from_raw(&RawLoggingConfig::default()).unwrap();
        assert_eq!(cfg, LoggingConfig::default());
        assert_eq!(cfg.min_level, SeverityLevel::Info);
        assert_eq!(cfg.base_file_name, "system.log");
        assert_eq!(cfg.max_size_mb, 100);
        assert_eq!(cfg.max_backups, 30);
        assert_eq!(cfg.max_age_days, 30);
    }

    #[test]
    fn test_defaulting_keeps_supplied_values() {
        let mut raw = complete_raw();
        raw.policy = ValidationPolicy::Defaulting;
        raw.max_backups = 0;

        let cfg = LoggingConfig::from_raw(&raw).unwrap();
        assert_eq!(cfg.min_level, SeverityLevel::Debug);
        assert_eq!(cfg.base_file_name, "logs/app.log");
        assert_eq!(cfg.max_size_mb, 10);
        assert_eq!(cfg.max_backups, DEFAULT_MAX_BACKUPS);
        assert_eq!(cfg.max_age_days, 7);
    }

    #[test]
    fn test_strict_accepts_complete_config() {
        let cfg = LoggingConfig::from_raw(&complete_raw()).unwrap();
        assert_eq!(cfg.max_backups, 5);
    }

    #[test]
    fn test_strict_reports_every_missing_field() {
        let raw = RawLoggingConfig {
            policy: ValidationPolicy::Strict,
            max_size_mb: 10,
            ..Default::default()
        };

        match LoggingConfig::from_raw(&raw) {
            Err(PipelineError::MissingFields(fields)) => {
                assert_eq!(fields, vec!["level", "file_name", "max_backups", "max_age_days"]);
            }
            other => panic!("expected MissingFields, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_level_fails_under_both_policies() {
        for policy in [ValidationPolicy::Strict, ValidationPolicy::Defaulting] {
            let mut raw = complete_raw();
            raw.policy = policy;
            raw.level = "loud".to_string();
            assert!(matches!(
                LoggingConfig::from_raw(&raw),
                Err(PipelineError::InvalidLevel(name)) if name == "loud"
            ));
        }
    }

    #[test]
    fn test_strict_reports_missing_fields_before_a_bad_level() {
        let raw = RawLoggingConfig {
            level: "loud".to_string(),
            policy: ValidationPolicy::Strict,
            max_size_mb: 10,
            ..Default::default()
        };

        match LoggingConfig::from_raw(&raw) {
            Err(PipelineError::MissingFields(fields)) => {
                assert_eq!(fields, vec!["file_name", "max_backups", "max_age_days"]);
            }
            other => panic!("expected MissingFields, got {:?}", other),
        }
    }

    #[test]
    fn test_max_age_days_is_bounded() {
        for policy in [ValidationPolicy::Strict, ValidationPolicy::Defaulting] {
            let mut raw = complete_raw();
            raw.policy = policy;
            raw.max_age_days = 200_000_000_000_000;
            assert!(matches!(
                LoggingConfig::from_raw(&raw),
                Err(PipelineError::OutOfRange { field: "max_age_days", max: MAX_AGE_DAYS, .. })
            ));
        }

        let mut raw = complete_raw();
        raw.max_age_days = MAX_AGE_DAYS;
        assert_eq!(LoggingConfig::from_raw(&raw).unwrap().max_age_days, MAX_AGE_DAYS);
    }

    #[test]
    fn test_level_is_case_insensitive() {
        let mut raw = complete_raw();
        raw.level = "WARN".to_string();
        assert_eq!(LoggingConfig::from_raw(&raw).unwrap().min_level, SeverityLevel::Warn);
    }

    #[test]
    fn test_stacktrace_level() {
        let mut raw = complete_raw();
        raw.stacktrace_level = "Error".to_string();
        assert_eq!(
            LoggingConfig::from_raw(&raw).unwrap().stacktrace_level,
            Some(SeverityLevel::Error)
        );

        raw.stacktrace_level = "sometimes".to_string();
        assert!(LoggingConfig::from_raw(&raw).is_err());
    }

    #[test]
    fn test_derived_paths_strip_suffix_once() {
        let cfg = LoggingConfig {
            base_file_name: "app.log".to_string(),
            ..Default::default()
        };
        assert_eq!(cfg.general_path(), PathBuf::from("app.log"));
        assert_eq!(cfg.error_path(), PathBuf::from("app-err.log"));

        let cfg = LoggingConfig {
            base_file_name: "app".to_string(),
            ..Default::default()
        };
        assert_eq!(cfg.general_path(), PathBuf::from("app.log"));
        assert_eq!(cfg.error_path(), PathBuf::from("app-err.log"));

        let cfg = LoggingConfig {
            base_file_name: "app.log.log".to_string(),
            ..Default::default()
        };
        assert_eq!(cfg.general_path(), PathBuf::from("app.log.log"));
        assert_eq!(cfg.error_path(), PathBuf::from("app.log-err.log"));
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiered-log.toml");
        std::fs::write(
            &path,
            r#"
[server]
port = 9000

[logging]
level = "debug"
file_name = "logs/api.log"
policy = "strict"
max_size_mb = 1
max_backups = 2
max_age_days = 3
"#,
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.logging.policy, ValidationPolicy::Strict);
        assert_eq!(cfg.logging.file_name, "logs/api.log");
        assert_eq!(cfg.logging.max_backups, 2);
        assert!(!cfg.logging.console_color);
    }
}
