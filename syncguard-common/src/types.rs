//! Common types used across syncguard components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a data-sync connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ConnectionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Job identifier, assigned by the job store.
pub type JobId = i64;

/// Lifecycle status of a job.
///
/// The policy only distinguishes `Failed` and `Succeeded`; every other
/// status is transparent to streak counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Incomplete,
    Failed,
    Succeeded,
    Cancelled,
}

impl JobStatus {
    pub fn is_failed(self) -> bool {
        matches!(self, Self::Failed)
    }

    pub fn is_succeeded(self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Incomplete => write!(f, "incomplete"),
            Self::Failed => write!(f, "failed"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// What a job was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobConfigType {
    CheckConnection,
    DiscoverSchema,
    GetSpec,
    Sync,
    ResetConnection,
}

impl JobConfigType {
    /// Job types that move data and therefore count toward failure streaks.
    pub const REPLICATION: [JobConfigType; 2] = [Self::Sync, Self::ResetConnection];

    pub fn is_replication(self) -> bool {
        Self::REPLICATION.contains(&self)
    }
}

/// A full job row as kept by the job store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub connection_id: ConnectionId,
    pub config_type: JobConfigType,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Project the row down to what a history listing returns.
    pub fn status_and_timestamp(&self) -> JobStatusAndTimestamp {
        JobStatusAndTimestamp {
            id: self.id,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Lightweight history entry returned by status/timestamp listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusAndTimestamp {
    pub id: JobId,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Scheduling status of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Active,
    Inactive,
    Deprecated,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
            Self::Deprecated => write!(f, "deprecated"),
        }
    }
}

/// A configured source-to-destination sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: ConnectionStatus,
}

/// Kind of notification the policy may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// The connection was set inactive.
    ConnectionDisabled,
    /// The connection is halfway to being disabled.
    ConnectionDisabledWarning,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectionDisabled => "connection_disabled",
            Self::ConnectionDisabledWarning => "connection_disabled_warning",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors constructing [`Thresholds`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThresholdError {
    #[error("max_consecutive_failures must be in 1..={max}, got {0}", max = Thresholds::UPPER_LIMIT)]
    ConsecutiveFailures(u32),

    #[error("max_failure_window_days must be in 1..={max}, got {0}", max = Thresholds::UPPER_LIMIT)]
    WindowDays(u32),
}

/// Disable thresholds. Warning thresholds are derived as half of each,
/// rounded down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Thresholds {
    max_consecutive_failures: u32,
    max_failure_window_days: u32,
}

impl Thresholds {
    /// Largest accepted value for either threshold. Keeps the lookback
    /// window well inside the representable date range.
    pub const UPPER_LIMIT: u32 = 10_000;

    pub fn new(
        max_consecutive_failures: u32,
        max_failure_window_days: u32,
    ) -> Result<Self, ThresholdError> {
        let in_range = |value: u32| (1..=Self::UPPER_LIMIT).contains(&value);
        if !in_range(max_consecutive_failures) {
            return Err(ThresholdError::ConsecutiveFailures(max_consecutive_failures));
        }
        if !in_range(max_failure_window_days) {
            return Err(ThresholdError::WindowDays(max_failure_window_days));
        }
        Ok(Self {
            max_consecutive_failures,
            max_failure_window_days,
        })
    }

    pub fn max_consecutive_failures(&self) -> u32 {
        self.max_consecutive_failures
    }

    pub fn max_failure_window_days(&self) -> u32 {
        self.max_failure_window_days
    }

    pub fn warn_consecutive_failures(&self) -> u32 {
        self.max_consecutive_failures / 2
    }

    pub fn warn_window_days(&self) -> u32 {
        self.max_failure_window_days / 2
    }
}
