//! Configuration validation.
//!
//! Validation never mutates the config; it reports findings that the loader
//! turns into a hard error (severity `Error`) or surfaces to the operator.

use super::{SyncGuardConfig, env::parse_log_level};
use crate::types::Thresholds;
use serde::Serialize;

/// How serious a validation finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigWarning {
    pub severity: Severity,
    pub field: &'static str,
    pub message: String,
}

impl ConfigWarning {
    fn new(severity: Severity, field: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity,
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.field, self.message)
    }
}

/// Check a resolved config for values the policy cannot use or that make
/// part of it inert.
pub fn validate_config(config: &SyncGuardConfig) -> Vec<ConfigWarning> {
    let mut findings = Vec::new();
    let max_failures = config.max_consecutive_failures.value;
    let max_days = config.max_failure_window_days.value;

    match max_failures {
        0 => findings.push(ConfigWarning::new(
            Severity::Error,
            "max_consecutive_failures",
            "must be at least 1",
        )),
        n if n > Thresholds::UPPER_LIMIT => findings.push(ConfigWarning::new(
            Severity::Error,
            "max_consecutive_failures",
            format!("must be at most {}, got {n}", Thresholds::UPPER_LIMIT),
        )),
        1 => findings.push(ConfigWarning::new(
            Severity::Warning,
            "max_consecutive_failures",
            "warning threshold is 0, consecutive-failure warnings will never be sent",
        )),
        _ => {}
    }

    match max_days {
        0 => findings.push(ConfigWarning::new(
            Severity::Error,
            "max_failure_window_days",
            "must be at least 1",
        )),
        n if n > Thresholds::UPPER_LIMIT => findings.push(ConfigWarning::new(
            Severity::Error,
            "max_failure_window_days",
            format!("must be at most {}, got {n}", Thresholds::UPPER_LIMIT),
        )),
        1 => findings.push(ConfigWarning::new(
            Severity::Warning,
            "max_failure_window_days",
            "warning window is 0 days, every failure after the first day will warn",
        )),
        _ => {}
    }

    if parse_log_level(&config.log_level.value).is_none() {
        findings.push(ConfigWarning::new(
            Severity::Error,
            "logging.level",
            format!(
                "'{}' is not one of trace, debug, info, warn, error",
                config.log_level.value
            ),
        ));
    }

    if !config.auto_disable_failing_connections.value {
        findings.push(ConfigWarning::new(
            Severity::Info,
            "auto_disable_failing_connections",
            "policy is disabled, evaluations will always report disabled=false",
        ));
    }

    findings
}
