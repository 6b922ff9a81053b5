//! Auto-disable orchestration.
//!
//! Pulls the lookback window, runs scanner → decision engine → deduplicator,
//! and applies the outcome: at most one status write and one notification
//! request per evaluation.

use crate::dedup::{DedupOutcome, WarningDeduplicator};
use crate::decision::{DecisionEngine, Verdict, lookback_start};
use crate::ports::{PolicyPorts, PortError};
use crate::scanner::{StreakSummary, scan_history};
use crate::window::{HistoryWindow, WindowError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use syncguard_common::{
    ConnectionId, ConnectionStatus, ErrorCode, JobConfigType, JobId, JobRecord, NotificationKind,
    Thresholds,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoDisableInput {
    pub connection_id: ConnectionId,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoDisableOutput {
    pub disabled: bool,
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("connection {0} has no replication job; auto-disable should not have been attempted")]
    MissingLastJob(ConnectionId),

    #[error("connection {0} has never run a replication job")]
    MissingFirstJob(ConnectionId),

    #[error("lookback of {days} days before {now} is outside the supported date range")]
    LookbackOutOfRange { now: DateTime<Utc>, days: u32 },

    #[error("failed to deactivate connection {connection_id}: {source}")]
    ConnectionWrite {
        connection_id: ConnectionId,
        #[source]
        source: PortError,
    },

    #[error(transparent)]
    Window(#[from] WindowError),

    #[error(transparent)]
    Port(#[from] PortError),
}

impl PolicyError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::MissingLastJob(_) => ErrorCode::HistoryMissingLastJob,
            Self::MissingFirstJob(_) => ErrorCode::HistoryMissingFirstJob,
            Self::LookbackOutOfRange { .. } => ErrorCode::ConfigValidationError,
            Self::ConnectionWrite { .. } => ErrorCode::ConnectionWriteFailed,
            Self::Window(_) => ErrorCode::HistoryOutOfOrder,
            Self::Port(err) => err.error_code(),
        }
    }
}

/// The single failure category callers see. Whatever went wrong, the
/// evaluation may be retried as a whole.
///
/// The error itself is always [`ErrorCode::InternalEvaluationFailed`]; the
/// cause keeps its own code in [`error_code`](Self::error_code).
#[derive(Debug, Error)]
#[error(
    "auto-disable evaluation for connection {connection_id} failed [{}, cause {}]: {source}",
    Self::RETRY_CODE.code_string(),
    .code.code_string()
)]
pub struct RetryableError {
    pub connection_id: ConnectionId,
    code: ErrorCode,
    #[source]
    source: PolicyError,
}

impl RetryableError {
    pub const RETRY_CODE: ErrorCode = ErrorCode::InternalEvaluationFailed;

    pub fn new(connection_id: ConnectionId, source: PolicyError) -> Self {
        Self {
            connection_id,
            code: source.error_code(),
            source,
        }
    }

    /// Catalog code of the underlying cause.
    pub fn error_code(&self) -> ErrorCode {
        self.code
    }

    pub fn policy_error(&self) -> &PolicyError {
        &self.source
    }

    pub fn into_policy_error(self) -> PolicyError {
        self.source
    }
}

/// Full account of one evaluation, for operator tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    pub connection_id: ConnectionId,
    pub evaluated_at: DateTime<Utc>,
    /// False when the feature flag was off and nothing was fetched.
    pub enabled: bool,
    pub window_len: usize,
    pub summary: StreakSummary,
    pub verdict: Verdict,
    /// Only set for day-window warnings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedup: Option<DedupOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_job_id: Option<JobId>,
    /// Notification requested from the notifier, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationKind>,
    pub notification_delivered: bool,
    pub disabled: bool,
}

impl Evaluation {
    fn skipped(input: &AutoDisableInput) -> Self {
        Self {
            connection_id: input.connection_id,
            evaluated_at: input.now,
            enabled: false,
            window_len: 0,
            summary: StreakSummary::default(),
            verdict: Verdict::NoAction,
            dedup: None,
            last_job_id: None,
            notification: None,
            notification_delivered: false,
            disabled: false,
        }
    }

    pub fn output(&self) -> AutoDisableOutput {
        AutoDisableOutput {
            disabled: self.disabled,
        }
    }
}

pub struct AutoDisablePolicy {
    ports: PolicyPorts,
    engine: DecisionEngine,
    dedup: WarningDeduplicator,
}

impl AutoDisablePolicy {
    pub fn new(ports: PolicyPorts, thresholds: Thresholds) -> Self {
        Self {
            ports,
            engine: DecisionEngine::new(thresholds),
            dedup: WarningDeduplicator::new(&thresholds),
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        self.engine.thresholds()
    }

    /// Decide whether `input.connection_id` should be deactivated, applying
    /// the decision as a side effect.
    pub fn auto_disable_failing_connection(
        &self,
        input: &AutoDisableInput,
    ) -> Result<AutoDisableOutput, RetryableError> {
        self.evaluate_detailed(input).map(|evaluation| evaluation.output())
    }

    /// Same as [`auto_disable_failing_connection`](Self::auto_disable_failing_connection)
    /// but reports every intermediate result.
    pub fn evaluate_detailed(&self, input: &AutoDisableInput) -> Result<Evaluation, RetryableError> {
        if !self.ports.flags.auto_disable_failing_connections() {
            debug!(connection_id = %input.connection_id, "auto-disable feature off, skipping");
            return Ok(Evaluation::skipped(input));
        }

        self.evaluate_enabled(input).map_err(|source| {
            let err = RetryableError::new(input.connection_id, source);
            error!(
                connection_id = %input.connection_id,
                code = %RetryableError::RETRY_CODE.code_string(),
                cause_code = %err.error_code().code_string(),
                error = %err.policy_error(),
                "auto-disable evaluation failed"
            );
            err
        })
    }

    /// Fetch and scan the lookback window without deciding anything.
    pub fn scan(
        &self,
        connection_id: ConnectionId,
        now: DateTime<Utc>,
    ) -> Result<(HistoryWindow, StreakSummary), PolicyError> {
        let days = self.thresholds().max_failure_window_days();
        let since = lookback_start(now, days).ok_or(PolicyError::LookbackOutOfRange { now, days })?;
        let jobs = self.ports.history.list_job_status_and_timestamp(
            connection_id,
            &JobConfigType::REPLICATION,
            since,
        )?;
        let window = HistoryWindow::from_newest_first(jobs)?;
        let summary = scan_history(&window);
        Ok((window, summary))
    }

    fn evaluate_enabled(&self, input: &AutoDisableInput) -> Result<Evaluation, PolicyError> {
        let connection_id = input.connection_id;
        let last_job = self
            .ports
            .history
            .last_replication_job(connection_id)?
            .ok_or(PolicyError::MissingLastJob(connection_id))?;

        let (window, summary) = self.scan(connection_id, input.now)?;
        debug!(
            %connection_id,
            window_len = window.len(),
            consecutive_failures = summary.consecutive_failures,
            last_success_at = ?summary.last_success_at,
            "scanned job history"
        );

        let verdict = self.engine.evaluate(&summary, input.now, || {
            self.ports
                .history
                .first_replication_job(connection_id)?
                .ok_or(PolicyError::MissingFirstJob(connection_id))
        })?;

        let mut evaluation = Evaluation {
            connection_id,
            evaluated_at: input.now,
            enabled: true,
            window_len: window.len(),
            summary,
            verdict,
            dedup: None,
            last_job_id: Some(last_job.id),
            notification: None,
            notification_delivered: false,
            disabled: false,
        };

        match verdict {
            Verdict::NoAction => {
                debug!(%connection_id, "no action");
            }
            Verdict::Disable { reason } => {
                self.disable_connection(connection_id)?;
                warn!(
                    %connection_id,
                    ?reason,
                    consecutive_failures = summary.consecutive_failures,
                    "connection disabled"
                );
                evaluation.disabled = true;
                evaluation.notification = Some(NotificationKind::ConnectionDisabled);
                evaluation.notification_delivered =
                    self.request_notification(NotificationKind::ConnectionDisabled, &last_job);
            }
            Verdict::WarnConsecutive => {
                info!(
                    %connection_id,
                    consecutive_failures = summary.consecutive_failures,
                    "connection halfway to consecutive-failure limit"
                );
                evaluation.notification = Some(NotificationKind::ConnectionDisabledWarning);
                evaluation.notification_delivered = self
                    .request_notification(NotificationKind::ConnectionDisabledWarning, &last_job);
            }
            Verdict::WarnWindow(warning) => {
                let outcome = self.dedup.resolve(&window, &summary, &warning);
                evaluation.dedup = Some(outcome);
                if outcome.should_send() {
                    info!(
                        %connection_id,
                        days_since_first_job = warning.days_since_first_job,
                        "connection halfway to failure-window limit"
                    );
                    evaluation.notification = Some(NotificationKind::ConnectionDisabledWarning);
                    evaluation.notification_delivered = self
                        .request_notification(NotificationKind::ConnectionDisabledWarning, &last_job);
                } else {
                    debug!(%connection_id, ?outcome, "window warning already implied by previous failure");
                }
            }
        }

        Ok(evaluation)
    }

    fn disable_connection(&self, connection_id: ConnectionId) -> Result<(), PolicyError> {
        let mut connection = self.ports.connections.get_connection(connection_id)?;
        connection.status = ConnectionStatus::Inactive;
        self.ports
            .connections
            .write_connection(&connection)
            .map_err(|source| PolicyError::ConnectionWrite {
                connection_id,
                source,
            })
    }

    /// Delivery problems are logged, never fatal: the status change they
    /// describe has already happened.
    fn request_notification(&self, kind: NotificationKind, job: &JobRecord) -> bool {
        match self.ports.notifier.notify(kind, job) {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    connection_id = %job.connection_id,
                    job_id = job.id,
                    %kind,
                    code = %RetryableError::RETRY_CODE.code_string(),
                cause_code = %err.error_code().code_string(),
                    error = %err,
                    "notification request failed"
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for AutoDisablePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoDisablePolicy")
            .field("thresholds", &self.thresholds())
            .finish_non_exhaustive()
    }
}
