//! Failure streak scanning.
//!
//! Walks a newest-first window and reports how many failed jobs sit on top
//! of the most recent success. Statuses other than failed/succeeded are
//! skipped, so a cancelled run in the middle of a streak neither breaks nor
//! extends it.

use crate::window::HistoryWindow;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Result of scanning a history window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreakSummary {
    /// Failed jobs since the most recent success (or since the window began).
    pub consecutive_failures: u32,
    /// `updated_at` of the most recent success in the window.
    pub last_success_at: Option<DateTime<Utc>>,
}

impl StreakSummary {
    pub fn has_success(&self) -> bool {
        self.last_success_at.is_some()
    }
}

/// Reduce a window to its current failure streak.
pub fn scan_history(window: &HistoryWindow) -> StreakSummary {
    let mut summary = StreakSummary::default();

    for job in window {
        if job.status.is_failed() {
            summary.consecutive_failures += 1;
        } else if job.status.is_succeeded() {
            summary.last_success_at = Some(job.updated_at);
            break;
        }
    }

    summary
}
