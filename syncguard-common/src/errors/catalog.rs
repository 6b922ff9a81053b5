//! Stable `SG-Exxx` codes with operator-facing remediation.
//!
//! The numeric block a code lives in decides its [`ErrorCategory`]:
//!
//! | Block     | Category     |
//! |-----------|--------------|
//! | 1-99      | Config       |
//! | 100-199   | History      |
//! | 200-299   | Connection   |
//! | 300-399   | Notification |
//! | 500-599   | Internal     |
//!
//! ```rust
//! use syncguard_common::errors::catalog::ErrorCode;
//!
//! let entry = ErrorCode::HistoryMissingLastJob.entry();
//! assert_eq!(entry.code, "SG-E100");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Every failure syncguard can report, numbered by its catalog slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u16)]
#[non_exhaustive]
pub enum ErrorCode {
    ConfigNotFound = 1,
    ConfigReadError = 2,
    ConfigParseError = 3,
    ConfigValidationError = 4,
    ConfigEnvError = 5,

    /// No latest replication job for the connection.
    HistoryMissingLastJob = 100,
    /// The connection never ran a replication job.
    HistoryMissingFirstJob = 101,
    /// Listing was not newest-first.
    HistoryOutOfOrder = 102,
    HistoryStoreUnavailable = 103,

    ConnectionNotFound = 200,
    ConnectionWriteFailed = 201,

    NotificationRequestFailed = 300,

    /// Wraps any evaluation failure handed back to the scheduler.
    InternalEvaluationFailed = 500,
    InternalLoggingError = 501,
    InternalSerdeError = 502,
}

const ALL_CODES: [ErrorCode; 15] = [
    ErrorCode::ConfigNotFound,
    ErrorCode::ConfigReadError,
    ErrorCode::ConfigParseError,
    ErrorCode::ConfigValidationError,
    ErrorCode::ConfigEnvError,
    ErrorCode::HistoryMissingLastJob,
    ErrorCode::HistoryMissingFirstJob,
    ErrorCode::HistoryOutOfOrder,
    ErrorCode::HistoryStoreUnavailable,
    ErrorCode::ConnectionNotFound,
    ErrorCode::ConnectionWriteFailed,
    ErrorCode::NotificationRequestFailed,
    ErrorCode::InternalEvaluationFailed,
    ErrorCode::InternalLoggingError,
    ErrorCode::InternalSerdeError,
];

const RETRY_HISTORY: &[&str] = &[
    "Only evaluate connections after a replication job has completed",
    "Check that the job store contains sync or reset jobs for this connection",
];

impl ErrorCode {
    #[must_use]
    pub const fn code_number(&self) -> u16 {
        *self as u16
    }

    /// `SG-E` followed by the zero-padded number.
    #[must_use]
    pub fn code_string(&self) -> String {
        format!("SG-E{:03}", self.code_number())
    }

    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        ErrorCategory::for_number(self.code_number())
    }

    /// Message and remediation steps, kept side by side so they stay in sync.
    const fn text(&self) -> (&'static str, &'static [&'static str]) {
        match self {
            Self::ConfigNotFound => (
                "Configuration file not found",
                &[
                    "Check the path passed with --config",
                    "Omit --config to use the default location, or defaults if it is absent",
                ],
            ),
            Self::ConfigReadError => (
                "Configuration file could not be read",
                &["Check permissions on the configuration file"],
            ),
            Self::ConfigParseError => (
                "Configuration file is not valid TOML",
                &[
                    "Fix the TOML syntax reported in the error",
                    "Only the [policy] and [logging] tables are recognised",
                ],
            ),
            Self::ConfigValidationError => (
                "Configuration values are out of range",
                &[
                    "max_consecutive_failures and max_failure_window_days must be at least 1",
                    "logging.level must be one of trace, debug, info, warn, error",
                ],
            ),
            Self::ConfigEnvError => (
                "A SYNCGUARD_* environment variable has an invalid value",
                &["Run `syncguard config` to see effective values and their sources"],
            ),
            Self::HistoryMissingLastJob => (
                "Auto-disable was attempted for a connection without a latest replication job",
                RETRY_HISTORY,
            ),
            Self::HistoryMissingFirstJob => (
                "Auto-disable was attempted for a connection that never ran a replication job",
                RETRY_HISTORY,
            ),
            Self::HistoryOutOfOrder => (
                "Job history listing was not ordered newest-first",
                &["Sort the history query by creation time, newest first"],
            ),
            Self::HistoryStoreUnavailable => (
                "Job store is unavailable",
                &[
                    "Check that the job store is reachable",
                    "The evaluation is safe to retry once the store recovers",
                ],
            ),
            Self::ConnectionNotFound => ("Connection not found", &["Check the connection id"]),
            Self::ConnectionWriteFailed => (
                "Connection status could not be updated",
                &[
                    "Check that the connection store is writable",
                    "The evaluation is safe to retry",
                ],
            ),
            Self::NotificationRequestFailed => (
                "Notification request could not be delivered",
                &["Check the notification channel configuration"],
            ),
            Self::InternalEvaluationFailed => (
                "Auto-disable evaluation failed and can be retried",
                &[
                    "Inspect the error chain for the underlying cause",
                    "Let the invoking scheduler retry the evaluation",
                ],
            ),
            Self::InternalLoggingError => (
                "Logging could not be initialized",
                &[
                    "Check that the log file directory exists and is writable",
                    "Unset SYNCGUARD_LOG_FILE to log to stderr only",
                ],
            ),
            Self::InternalSerdeError => (
                "Store snapshot is not valid JSON",
                &["Check the snapshot file passed with --store"],
            ),
        }
    }

    #[must_use]
    pub const fn message(&self) -> &'static str {
        self.text().0
    }

    #[must_use]
    pub const fn remediation(&self) -> &'static [&'static str] {
        self.text().1
    }

    #[must_use]
    pub fn entry(&self) -> ErrorEntry {
        let (message, steps) = self.text();
        ErrorEntry {
            code: self.code_string(),
            category: self.category(),
            message: message.to_owned(),
            remediation: steps.iter().map(|step| (*step).to_owned()).collect(),
        }
    }

    #[must_use]
    pub const fn all() -> &'static [ErrorCode] {
        &ALL_CODES
    }

    /// Parse `SG-E101`, `E101` or `101`, in any case.
    #[must_use]
    pub fn from_code_str(code: &str) -> Option<ErrorCode> {
        let upper = code.trim().to_ascii_uppercase();
        let rest = upper.strip_prefix("SG-").unwrap_or(&upper);
        let number: u16 = rest.strip_prefix('E').unwrap_or(rest).parse().ok()?;
        ALL_CODES.into_iter().find(|c| c.code_number() == number)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code_string(), self.message())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Config,
    History,
    Connection,
    Notification,
    Internal,
}

impl ErrorCategory {
    const fn for_number(number: u16) -> Self {
        match number / 100 {
            0 => Self::Config,
            1 => Self::History,
            2 => Self::Connection,
            3 => Self::Notification,
            _ => Self::Internal,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Config => "Configuration",
            Self::History => "History",
            Self::Connection => "Connection",
            Self::Notification => "Notification",
            Self::Internal => "Internal",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Owned, serializable view of a code for CLI and JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub code: String,
    pub category: ErrorCategory,
    pub message: String,
    pub remediation: Vec<String>,
}

impl ErrorEntry {
    /// Headline plus numbered remediation steps.
    #[must_use]
    pub fn format_full(&self) -> String {
        let mut out = self.format_brief();
        out.push('\n');
        if !self.remediation.is_empty() {
            out.push_str("\nRemediation steps:\n");
            for (n, step) in (1..).zip(&self.remediation) {
                out.push_str(&format!("  {n}. {step}\n"));
            }
        }
        out
    }

    #[must_use]
    pub fn format_brief(&self) -> String {
        format!("[{}] {}", self.code, self.message)
    }
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_brief())
    }
}
