//! Day-window warning deduplication.
//!
//! Nothing about past notifications is stored. Instead the warning rule is
//! replayed as of the previous failing run: if it would already have fired
//! then, the warning is assumed sent and this one is dropped.

use crate::decision::{WindowWarning, days_between};
use crate::scanner::StreakSummary;
use crate::window::HistoryWindow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use syncguard_common::{JobStatusAndTimestamp, Thresholds};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DedupOutcome {
    Send,
    Suppress { previous_failure_at: DateTime<Utc> },
}

impl DedupOutcome {
    pub fn should_send(&self) -> bool {
        matches!(self, Self::Send)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WarningDeduplicator {
    warn_window_days: i64,
}

impl WarningDeduplicator {
    pub fn new(thresholds: &Thresholds) -> Self {
        Self {
            warn_window_days: i64::from(thresholds.warn_window_days()),
        }
    }

    pub fn resolve(
        &self,
        window: &HistoryWindow,
        summary: &StreakSummary,
        warning: &WindowWarning,
    ) -> DedupOutcome {
        let Some(previous) = previous_failed_job(window) else {
            return DedupOutcome::Send;
        };

        let anchor = summary
            .last_success_at
            .unwrap_or(warning.first_job_updated_at);
        let already_warned = days_between(previous.updated_at, anchor) >= self.warn_window_days;

        if summary.consecutive_failures > 1 && already_warned {
            DedupOutcome::Suppress {
                previous_failure_at: previous.updated_at,
            }
        } else {
            DedupOutcome::Send
        }
    }
}

/// The run before the current one that counts as "previous failure".
///
/// Scans from index 1 for the first failed entry; if none is failed the last
/// entry stands in. `None` when the window holds at most one job.
fn previous_failed_job(window: &HistoryWindow) -> Option<&JobStatusAndTimestamp> {
    let older = window.as_slice().get(1..)?;
    older
        .iter()
        .find(|job| job.status.is_failed())
        .or_else(|| older.last())
}
