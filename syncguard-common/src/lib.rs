//! Shared types and utilities for syncguard.
//!
//! This crate carries everything the policy crate and the operator binary
//! agree on: the job and connection model, disable thresholds, layered
//! configuration, the error catalog, and logging setup.

pub mod config;
pub mod errors;
pub mod logging;
pub mod testing;
pub mod types;

pub use config::{
    ConfigError, ConfigSource, ConfigWarning, EnvError, EnvParser, LoadedConfig, LoggingConfig,
    PolicyConfig, Severity, Sourced, SyncGuardConfig, validate_config,
};
pub use errors::{ErrorCategory, ErrorCode, ErrorEntry};
pub use logging::{LogConfig, LogFormat, LoggingError, LoggingGuards, init_logging};
pub use types::{
    Connection, ConnectionId, ConnectionStatus, JobConfigType, JobId, JobRecord, JobStatus,
    JobStatusAndTimestamp, NotificationKind, ThresholdError, Thresholds,
};
