//! Logging initialization shared by syncguard binaries.
//!
//! Installs a `tracing-subscriber` registry with an env filter, a stderr fmt
//! layer (compact or JSON), and an optional non-blocking file layer.

use crate::errors::ErrorCode;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "pretty" | "text" | "compact" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{filter}': {source}")]
    Filter {
        filter: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("log file {} has no file name", .0.display())]
    BadFilePath(PathBuf),

    #[error("failed to create log directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
}

impl LoggingError {
    pub fn error_code(&self) -> ErrorCode {
        ErrorCode::InternalLoggingError
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Filter directive, usually a bare level (`info`, `debug`, ...).
    pub level: String,
    pub format: LogFormat,
    /// Write to stderr (otherwise stdout).
    pub stderr: bool,
    /// Also append to this file.
    pub file: Option<PathBuf>,
}

impl LogConfig {
    /// Build from `SYNCGUARD_LOG_LEVEL`, `SYNCGUARD_LOG_FORMAT` and
    /// `SYNCGUARD_LOG_FILE`, falling back to `default_level`.
    pub fn from_env(default_level: &str) -> Self {
        let level = std::env::var("SYNCGUARD_LOG_LEVEL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| default_level.to_string());
        let format = std::env::var("SYNCGUARD_LOG_FORMAT")
            .ok()
            .and_then(|v| LogFormat::parse(&v))
            .unwrap_or_default();
        let file = std::env::var("SYNCGUARD_LOG_FILE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Self {
            level,
            format,
            stderr: false,
            file,
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_stderr(mut self) -> Self {
        self.stderr = true;
        self
    }

    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Filter directive applied to syncguard crates; other crates stay at warn.
    fn filter_directive(&self) -> String {
        let level = self.level.trim();
        if level.contains('=') || level.contains(',') {
            level.to_string()
        } else {
            format!("warn,syncguard={level},syncguard_common={level}")
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            stderr: true,
            file: None,
        }
    }
}

/// Keeps background log writers alive. Drop at process exit to flush.
#[must_use = "dropping the guards stops file logging"]
pub struct LoggingGuards {
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber described by `config`.
pub fn init_logging(config: &LogConfig) -> Result<LoggingGuards, LoggingError> {
    let directive = config.filter_directive();
    let filter = EnvFilter::try_new(&directive).map_err(|source| LoggingError::Filter {
        filter: directive.clone(),
        source,
    })?;

    let (file_sink, file_guard) = match &config.file {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    let file_layer = file_sink.map(|writer| {
        fmt::layer()
            .json()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true)
    });

    let console_layer = match (config.format, config.stderr) {
        (LogFormat::Pretty, true) => fmt::layer().compact().with_writer(std::io::stderr).boxed(),
        (LogFormat::Pretty, false) => fmt::layer().compact().with_writer(std::io::stdout).boxed(),
        (LogFormat::Json, true) => fmt::layer().json().with_writer(std::io::stderr).boxed(),
        (LogFormat::Json, false) => fmt::layer().json().with_writer(std::io::stdout).boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)?;

    Ok(LoggingGuards { _file: file_guard })
}

fn file_writer(
    path: &Path,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard), LoggingError> {
    let file_name = path
        .file_name()
        .ok_or_else(|| LoggingError::BadFilePath(path.to_path_buf()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|source| LoggingError::CreateDir {
        path: dir.clone(),
        source,
    })?;

    let appender = tracing_appender::rolling::never(&dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}
