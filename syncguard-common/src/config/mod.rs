//! Configuration system for syncguard.
//!
//! Values resolve in three layers, later layers winning:
//! built-in defaults, the TOML config file, then `SYNCGUARD_*` environment
//! variables. Every resolved value records where it came from.

pub mod env;
pub mod file;
pub mod source;
pub mod validate;

pub use env::{EnvError, EnvParser};
pub use file::{FileConfig, default_config_path};
pub use source::{ConfigSource, Sourced};
pub use validate::{ConfigWarning, Severity, validate_config};

use crate::errors::ErrorCode;
use crate::types::{ThresholdError, Thresholds};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Policy is off unless explicitly enabled.
pub const DEFAULT_AUTO_DISABLE: bool = false;

/// Consecutive failed replication jobs before a connection is disabled.
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 100;

/// Days of only-failed replication jobs before a connection is disabled.
pub const DEFAULT_MAX_FAILURE_WINDOW_DAYS: u32 = 14;

pub const DEFAULT_LOG_LEVEL: &str = "info";

const THRESHOLD_MAX: u32 = Thresholds::UPPER_LIMIT;

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid environment configuration: {}", join_errors(.0))]
    Env(Vec<EnvError>),

    #[error("Invalid configuration: {}", join_errors(.0))]
    Validation(Vec<ConfigWarning>),

    #[error(transparent)]
    Threshold(#[from] ThresholdError),
}

fn join_errors<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ConfigError {
    /// Catalog code for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::ConfigNotFound,
            Self::Read { .. } => ErrorCode::ConfigReadError,
            Self::Parse { .. } => ErrorCode::ConfigParseError,
            Self::Env(_) => ErrorCode::ConfigEnvError,
            Self::Validation(_) | Self::Threshold(_) => ErrorCode::ConfigValidationError,
        }
    }
}

/// Plain policy settings handed to the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PolicyConfig {
    /// Feature toggle; when false the policy never touches a connection.
    pub auto_disable_failing_connections: bool,
    pub max_consecutive_failures: u32,
    pub max_failure_window_days: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            auto_disable_failing_connections: DEFAULT_AUTO_DISABLE,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
            max_failure_window_days: DEFAULT_MAX_FAILURE_WINDOW_DAYS,
        }
    }
}

impl TryFrom<&PolicyConfig> for Thresholds {
    type Error = ThresholdError;

    fn try_from(config: &PolicyConfig) -> Result<Self, Self::Error> {
        Thresholds::new(
            config.max_consecutive_failures,
            config.max_failure_window_days,
        )
    }
}

/// Plain logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<PathBuf>,
}

/// Fully resolved configuration with per-value source tracking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncGuardConfig {
    pub auto_disable_failing_connections: Sourced<bool>,
    pub max_consecutive_failures: Sourced<u32>,
    pub max_failure_window_days: Sourced<u32>,
    pub log_level: Sourced<String>,
    pub log_file: Sourced<Option<PathBuf>>,
}

impl Default for SyncGuardConfig {
    fn default() -> Self {
        Self {
            auto_disable_failing_connections: Sourced::default_value(DEFAULT_AUTO_DISABLE),
            max_consecutive_failures: Sourced::default_value(DEFAULT_MAX_CONSECUTIVE_FAILURES),
            max_failure_window_days: Sourced::default_value(DEFAULT_MAX_FAILURE_WINDOW_DAYS),
            log_level: Sourced::default_value(DEFAULT_LOG_LEVEL.to_string()),
            log_file: Sourced::default_value(None),
        }
    }
}

/// Result of [`SyncGuardConfig::load`].
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: SyncGuardConfig,
    /// File that contributed values, if any.
    pub path: Option<PathBuf>,
    /// Non-fatal validation findings.
    pub warnings: Vec<ConfigWarning>,
}

impl SyncGuardConfig {
    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// used if present and silently skipped otherwise.
    pub fn load(path: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
        match path {
            Some(path) => Self::load_layers(Some(path.to_path_buf()), true),
            None => Self::load_layers(default_config_path(), false),
        }
    }

    fn load_layers(path: Option<PathBuf>, required: bool) -> Result<LoadedConfig, ConfigError> {
        let file = match path {
            Some(path) => match FileConfig::read(&path) {
                Ok(file) => Some((path, file)),
                Err(ConfigError::NotFound { .. }) if !required => None,
                Err(err) => return Err(err),
            },
            None => None,
        };

        let mut parser = EnvParser::new();
        let config = Self::resolve(file.as_ref(), &mut parser);
        if parser.has_errors() {
            return Err(ConfigError::Env(parser.take_errors()));
        }

        let (errors, warnings): (Vec<_>, Vec<_>) = validate_config(&config)
            .into_iter()
            .partition(|finding| finding.severity == Severity::Error);
        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }

        Ok(LoadedConfig {
            config,
            path: file.map(|(path, _)| path),
            warnings,
        })
    }

    /// Merge defaults, an optional parsed file, and the environment.
    pub fn resolve(file: Option<&(PathBuf, FileConfig)>, env: &mut EnvParser) -> Self {
        let mut config = Self::default();

        if let Some((path, file)) = file {
            if let Some(v) = file.policy.auto_disable_failing_connections {
                config.auto_disable_failing_connections = Sourced::from_file(v, path.clone());
            }
            if let Some(v) = file.policy.max_consecutive_failures {
                config.max_consecutive_failures = Sourced::from_file(v, path.clone());
            }
            if let Some(v) = file.policy.max_failure_window_days {
                config.max_failure_window_days = Sourced::from_file(v, path.clone());
            }
            if let Some(v) = &file.logging.level {
                config.log_level = Sourced::from_file(v.clone(), path.clone());
            }
            if let Some(v) = &file.logging.file {
                config.log_file = Sourced::from_file(Some(v.clone()), path.clone());
            }
        }

        config.auto_disable_failing_connections = config
            .auto_disable_failing_connections
            .overridden_by(env.get_bool("AUTO_DISABLE_FAILING_CONNECTIONS", DEFAULT_AUTO_DISABLE));
        config.max_consecutive_failures =
            config
                .max_consecutive_failures
                .overridden_by(env.get_u32_range(
                    "MAX_CONSECUTIVE_FAILURES",
                    DEFAULT_MAX_CONSECUTIVE_FAILURES,
                    1,
                    THRESHOLD_MAX,
                ));
        config.max_failure_window_days =
            config
                .max_failure_window_days
                .overridden_by(env.get_u32_range(
                    "MAX_FAILURE_WINDOW_DAYS",
                    DEFAULT_MAX_FAILURE_WINDOW_DAYS,
                    1,
                    THRESHOLD_MAX,
                ));
        config.log_level = config
            .log_level
            .overridden_by(env.get_log_level("LOG_LEVEL", DEFAULT_LOG_LEVEL));
        config.log_file = config
            .log_file
            .overridden_by(env.get_optional_path("LOG_FILE"));

        config
    }

    pub fn policy(&self) -> PolicyConfig {
        PolicyConfig {
            auto_disable_failing_connections: self.auto_disable_failing_connections.value,
            max_consecutive_failures: self.max_consecutive_failures.value,
            max_failure_window_days: self.max_failure_window_days.value,
        }
    }

    pub fn logging(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level.value.clone(),
            file: self.log_file.value.clone(),
        }
    }

    pub fn thresholds(&self) -> Result<Thresholds, ConfigError> {
        Ok(Thresholds::try_from(&self.policy())?)
    }
}

#[cfg(test)]
pub(crate) fn env_test_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;
    use std::io::Write;

    const POLICY_VARS: [&str; 5] = [
        "SYNCGUARD_AUTO_DISABLE_FAILING_CONNECTIONS",
        "SYNCGUARD_MAX_CONSECUTIVE_FAILURES",
        "SYNCGUARD_MAX_FAILURE_WINDOW_DAYS",
        "SYNCGUARD_LOG_LEVEL",
        "SYNCGUARD_LOG_FILE",
    ];

    fn clear_policy_env() {
        for var in POLICY_VARS {
            // SAFETY: env access is serialized by env_test_lock
            unsafe { std::env::remove_var(var) };
        }
    }

    fn set_env(key: &str, value: &str) {
        // SAFETY: env access is serialized by env_test_lock
        unsafe { std::env::set_var(key, value) };
    }

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_without_file_or_env() {
        let _guard = env_test_lock();
        clear_policy_env();

        let mut parser = EnvParser::new();
        let config = SyncGuardConfig::resolve(None, &mut parser);
        assert_eq!(config.policy(), PolicyConfig::default());
        assert_eq!(config.max_consecutive_failures.source, ConfigSource::Default);
        assert!(!parser.has_errors());
    }

    #[test]
    fn test_file_values_are_sourced() {
        let _guard = env_test_lock();
        clear_policy_env();

        let file = write_config(
            "[policy]\nauto_disable_failing_connections = true\nmax_consecutive_failures = 6\n",
        );
        let loaded = SyncGuardConfig::load(Some(file.path())).unwrap();
        let policy = loaded.config.policy();
        assert!(policy.auto_disable_failing_connections);
        assert_eq!(policy.max_consecutive_failures, 6);
        assert_eq!(policy.max_failure_window_days, DEFAULT_MAX_FAILURE_WINDOW_DAYS);
        assert_eq!(
            loaded.config.max_consecutive_failures.source,
            ConfigSource::File(file.path().to_path_buf())
        );
        assert_eq!(loaded.path.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_env_overrides_file() {
        let _guard = env_test_lock();
        clear_policy_env();

        let file = write_config("[policy]\nmax_failure_window_days = 30\n");
        set_env("SYNCGUARD_MAX_FAILURE_WINDOW_DAYS", "10");
        let loaded = SyncGuardConfig::load(Some(file.path())).unwrap();
        assert_eq!(loaded.config.max_failure_window_days.value, 10);
        assert_eq!(
            loaded.config.max_failure_window_days.env_var.as_deref(),
            Some("SYNCGUARD_MAX_FAILURE_WINDOW_DAYS")
        );
        clear_policy_env();
    }

    #[test]
    fn test_env_errors_are_collected() {
        let _guard = env_test_lock();
        clear_policy_env();

        let file = write_config("");
        set_env("SYNCGUARD_MAX_CONSECUTIVE_FAILURES", "0");
        set_env("SYNCGUARD_AUTO_DISABLE_FAILING_CONNECTIONS", "sometimes");
        let err = SyncGuardConfig::load(Some(file.path())).unwrap_err();
        match &err {
            ConfigError::Env(errors) => assert_eq!(errors.len(), 2),
            other => panic!("expected env error, got {other:?}"),
        }
        assert_eq!(err.error_code(), ErrorCode::ConfigEnvError);
        clear_policy_env();
    }

    #[test]
    fn test_zero_threshold_in_file_fails_validation() {
        let _guard = env_test_lock();
        clear_policy_env();

        let file = write_config("[policy]\nmax_consecutive_failures = 0\n");
        let err = SyncGuardConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert_eq!(err.error_code(), ErrorCode::ConfigValidationError);
    }

    #[test]
    fn test_oversized_window_in_file_fails_validation() {
        let _guard = env_test_lock();
        clear_policy_env();

        let file = write_config("[policy]\nmax_failure_window_days = 200000000\n");
        let err = SyncGuardConfig::load(Some(file.path())).unwrap_err();
        match &err {
            ConfigError::Validation(findings) => {
                assert_eq!(findings.len(), 1);
                assert_eq!(findings[0].field, "max_failure_window_days");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_explicit_missing_path_is_error() {
        let _guard = env_test_lock();
        clear_policy_env();

        let dir = tempfile::tempdir().unwrap();
        let err = SyncGuardConfig::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn test_optional_missing_path_uses_defaults() {
        let _guard = env_test_lock();
        clear_policy_env();

        let dir = tempfile::tempdir().unwrap();
        let loaded = SyncGuardConfig::load_layers(Some(dir.path().join("nope.toml")), false).unwrap();
        assert!(loaded.path.is_none());
        assert_eq!(loaded.config.policy(), PolicyConfig::default());
        // Default config has the policy switched off.
        assert!(
            loaded
                .warnings
                .iter()
                .any(|w| w.field == "auto_disable_failing_connections")
        );
    }

    #[test]
    fn test_thresholds_from_config() {
        let config = SyncGuardConfig {
            max_consecutive_failures: Sourced::default_value(3),
            max_failure_window_days: Sourced::default_value(10),
            ..SyncGuardConfig::default()
        };
        let thresholds = config.thresholds().unwrap();
        assert_eq!(thresholds.warn_consecutive_failures(), 1);
        assert_eq!(thresholds.warn_window_days(), 5);

        let config = SyncGuardConfig {
            max_failure_window_days: Sourced::default_value(Thresholds::UPPER_LIMIT + 1),
            ..SyncGuardConfig::default()
        };
        assert!(matches!(
            config.thresholds(),
            Err(ConfigError::Threshold(ThresholdError::WindowDays(10_001)))
        ));
    }

    #[test]
    fn test_logging_settings_follow_resolved_values() {
        let config = SyncGuardConfig {
            log_level: Sourced::default_value("warn".to_string()),
            log_file: Sourced::default_value(Some(PathBuf::from("/var/log/syncguard.log"))),
            ..SyncGuardConfig::default()
        };
        assert_eq!(
            config.logging(),
            LoggingConfig {
                level: "warn".to_string(),
                file: Some(PathBuf::from("/var/log/syncguard.log")),
            }
        );
    }
}
