//! Disable/warn decision rules.
//!
//! Consecutive-failure rules are checked first since they need nothing
//! beyond the scan. The first-ever job is only fetched when those are
//! inconclusive and the day-window rules have to run.

use crate::scanner::StreakSummary;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use syncguard_common::{JobRecord, NotificationKind, Thresholds};

const SECONDS_PER_DAY: i64 = 86_400;

/// Whole days elapsed from `earlier` to `later`, truncated toward zero.
///
/// Both instants are cut to whole epoch seconds first, so sub-second parts
/// never shift a boundary. Not calendar aware: 47 hours is one day
/// regardless of midnights crossed.
pub fn days_between(later: DateTime<Utc>, earlier: DateTime<Utc>) -> i64 {
    (later.timestamp() - earlier.timestamp()) / SECONDS_PER_DAY
}

/// Start of the lookback window, `days` before `now`. `None` when that
/// instant is outside the representable date range.
pub fn lookback_start(now: DateTime<Utc>, days: u32) -> Option<DateTime<Utc>> {
    Duration::try_days(i64::from(days)).and_then(|span| now.checked_sub_signed(span))
}

/// Which criterion tripped a disable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisableReason {
    /// The streak reached `max_consecutive_failures`.
    ConsecutiveFailures,
    /// No success within `max_failure_window_days` of a connection at least
    /// that old.
    FailureWindow,
}

/// A day-window warning that still has to pass deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowWarning {
    pub first_job_updated_at: DateTime<Utc>,
    pub days_since_first_job: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Verdict {
    NoAction,
    Disable { reason: DisableReason },
    WarnConsecutive,
    WarnWindow(WindowWarning),
}

impl Verdict {
    pub fn is_disable(&self) -> bool {
        matches!(self, Self::Disable { .. })
    }

    /// Notification this verdict asks for before any deduplication.
    pub fn notification(&self) -> Option<NotificationKind> {
        match self {
            Self::NoAction => None,
            Self::Disable { .. } => Some(NotificationKind::ConnectionDisabled),
            Self::WarnConsecutive | Self::WarnWindow(_) => {
                Some(NotificationKind::ConnectionDisabledWarning)
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoAction => "no_action",
            Self::Disable { .. } => "disable",
            Self::WarnConsecutive => "warn_consecutive",
            Self::WarnWindow(_) => "warn_window",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DecisionEngine {
    thresholds: Thresholds,
}

impl DecisionEngine {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Classify a streak.
    ///
    /// `first_job` is called at most once, and only when the consecutive
    /// rules did not decide. Its error is returned unchanged.
    pub fn evaluate<E>(
        &self,
        summary: &StreakSummary,
        now: DateTime<Utc>,
        first_job: impl FnOnce() -> Result<JobRecord, E>,
    ) -> Result<Verdict, E> {
        let failures = summary.consecutive_failures;

        if failures == 0 {
            return Ok(Verdict::NoAction);
        }
        // Edge-triggered: a streak that skips past the threshold never fires.
        if failures == self.thresholds.max_consecutive_failures() {
            return Ok(Verdict::Disable {
                reason: DisableReason::ConsecutiveFailures,
            });
        }
        if failures == self.thresholds.warn_consecutive_failures() {
            return Ok(Verdict::WarnConsecutive);
        }

        let first = first_job()?;
        let days_since_first_job = days_between(now, first.created_at);
        let max_days = i64::from(self.thresholds.max_failure_window_days());
        let warn_days = i64::from(self.thresholds.warn_window_days());

        tracing::debug!(
            consecutive_failures = failures,
            days_since_first_job,
            max_days,
            warn_days,
            has_success = summary.has_success(),
            "evaluating failure window"
        );

        if days_since_first_job >= max_days && !summary.has_success() {
            return Ok(Verdict::Disable {
                reason: DisableReason::FailureWindow,
            });
        }

        let success_stale = summary
            .last_success_at
            .is_none_or(|at| days_between(now, at) >= warn_days);
        if days_since_first_job >= warn_days && success_stale {
            return Ok(Verdict::WarnWindow(WindowWarning {
                first_job_updated_at: first.updated_at,
                days_since_first_job,
            }));
        }

        Ok(Verdict::NoAction)
    }
}
