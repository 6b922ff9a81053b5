//! Reference notifier and feature-flag implementations.

use crate::ports::{FeatureFlags, NotifierPort, PortError};
use serde::Serialize;
use std::sync::Mutex;
use syncguard_common::{ConnectionId, EnvParser, JobId, JobRecord, JobStatus, NotificationKind};
use tracing::{info, warn};

/// A notification request as handed to a notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationRequest {
    pub kind: NotificationKind,
    pub connection_id: ConnectionId,
    pub job_id: JobId,
    pub job_status: JobStatus,
}

impl NotificationRequest {
    pub fn new(kind: NotificationKind, job: &JobRecord) -> Self {
        Self {
            kind,
            connection_id: job.connection_id,
            job_id: job.id,
            job_status: job.status,
        }
    }
}

/// Emits each request as a structured log event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl NotifierPort for TracingNotifier {
    fn notify(&self, kind: NotificationKind, job: &JobRecord) -> Result<(), PortError> {
        info!(
            notification = %kind,
            connection_id = %job.connection_id,
            job_id = job.id,
            job_status = %job.status,
            "notification requested"
        );
        Ok(())
    }
}

/// Keeps requests in memory so callers can inspect them afterwards.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    requests: Mutex<Vec<NotificationRequest>>,
    fail_next: Mutex<Option<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<NotificationRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn kinds(&self) -> Vec<NotificationKind> {
        self.requests().into_iter().map(|r| r.kind).collect()
    }

    /// Reject the next request with `reason`.
    pub fn fail_next(&self, reason: impl Into<String>) {
        *self.fail_next.lock().unwrap_or_else(|e| e.into_inner()) = Some(reason.into());
    }

    pub fn clear(&self) {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl NotifierPort for RecordingNotifier {
    fn notify(&self, kind: NotificationKind, job: &JobRecord) -> Result<(), PortError> {
        if let Some(reason) = self.fail_next.lock().unwrap_or_else(|e| e.into_inner()).take() {
            return Err(PortError::Notification { kind, reason });
        }
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(NotificationRequest::new(kind, job));
        Ok(())
    }
}

/// Fixed on/off toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticFeatureFlags(pub bool);

impl FeatureFlags for StaticFeatureFlags {
    fn auto_disable_failing_connections(&self) -> bool {
        self.0
    }
}

/// Reads `SYNCGUARD_AUTO_DISABLE_FAILING_CONNECTIONS` on every call, so the
/// toggle can be flipped without restarting a long-lived worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvFeatureFlags {
    default: bool,
}

impl EnvFeatureFlags {
    pub const VAR: &'static str = "AUTO_DISABLE_FAILING_CONNECTIONS";

    pub fn new(default: bool) -> Self {
        Self { default }
    }
}

impl FeatureFlags for EnvFeatureFlags {
    fn auto_disable_failing_connections(&self) -> bool {
        let mut parser = EnvParser::new();
        let value = parser.get_bool(Self::VAR, self.default).value;
        for err in parser.take_errors() {
            warn!(error = %err, fallback = self.default, "ignoring invalid feature flag");
        }
        value
    }
}
