//! Interfaces the policy consumes.
//!
//! Storage, status mutation, notification delivery and feature toggles all
//! live outside the policy. Implementations are shared behind `Arc` so one
//! policy instance can serve several worker threads.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use syncguard_common::{
    Connection, ConnectionId, ErrorCode, JobConfigType, JobRecord, JobStatusAndTimestamp,
    NotificationKind,
};
use thiserror::Error;

/// Failure reported by a port implementation. All variants are treated as
/// transient by the policy.
#[derive(Debug, Error)]
pub enum PortError {
    #[error("connection {0} not found")]
    ConnectionNotFound(ConnectionId),

    #[error("{store} unavailable: {reason}")]
    Unavailable { store: &'static str, reason: String },

    /// Read-side I/O. The policy reports failed status writes as
    /// `PolicyError::ConnectionWrite` whatever the port returned.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed data: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("notification {kind} rejected: {reason}")]
    Notification {
        kind: NotificationKind,
        reason: String,
    },
}

impl PortError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::ConnectionNotFound(_) => ErrorCode::ConnectionNotFound,
            Self::Unavailable { .. } | Self::Io(_) => ErrorCode::HistoryStoreUnavailable,
            Self::Parse(_) => ErrorCode::InternalSerdeError,
            Self::Notification { .. } => ErrorCode::NotificationRequestFailed,
        }
    }
}

/// Read access to a connection's replication job history.
pub trait JobHistoryPort: Send + Sync {
    /// Most recently created replication job, if any.
    fn last_replication_job(&self, connection_id: ConnectionId) -> Result<Option<JobRecord>, PortError>;

    /// Earliest replication job ever created, if any.
    fn first_replication_job(&self, connection_id: ConnectionId) -> Result<Option<JobRecord>, PortError>;

    /// Jobs of `job_types` created at or after `since`, newest first.
    fn list_job_status_and_timestamp(
        &self,
        connection_id: ConnectionId,
        job_types: &[JobConfigType],
        since: DateTime<Utc>,
    ) -> Result<Vec<JobStatusAndTimestamp>, PortError>;
}

pub trait ConnectionPort: Send + Sync {
    fn get_connection(&self, connection_id: ConnectionId) -> Result<Connection, PortError>;
    fn write_connection(&self, connection: &Connection) -> Result<(), PortError>;
}

/// Hands a notification request to whatever delivers it.
pub trait NotifierPort: Send + Sync {
    fn notify(&self, kind: NotificationKind, job: &JobRecord) -> Result<(), PortError>;
}

pub trait FeatureFlags: Send + Sync {
    fn auto_disable_failing_connections(&self) -> bool;
}

/// Everything [`AutoDisablePolicy`](crate::policy::AutoDisablePolicy) talks to.
#[derive(Clone)]
pub struct PolicyPorts {
    pub history: Arc<dyn JobHistoryPort>,
    pub connections: Arc<dyn ConnectionPort>,
    pub notifier: Arc<dyn NotifierPort>,
    pub flags: Arc<dyn FeatureFlags>,
}

impl std::fmt::Debug for PolicyPorts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyPorts")
            .field("auto_disable_failing_connections", &self.flags.auto_disable_failing_connections())
            .finish_non_exhaustive()
    }
}
