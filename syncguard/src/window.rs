//! Newest-first job history window.
//!
//! Every index-based rule in the policy ("the job before the current one")
//! relies on this ordering, so it is checked once at construction.

use chrono::{DateTime, Utc};
use syncguard_common::{JobId, JobStatusAndTimestamp};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error(
        "history is not newest-first: job {later_id} (created {later_at}) follows job {earlier_id} (created {earlier_at})"
    )]
    OutOfOrder {
        earlier_id: JobId,
        earlier_at: DateTime<Utc>,
        later_id: JobId,
        later_at: DateTime<Utc>,
    },
}

/// Replication jobs for one connection inside the lookback window,
/// most recent first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryWindow {
    jobs: Vec<JobStatusAndTimestamp>,
}

impl HistoryWindow {
    /// Wrap a listing that claims to be newest-first.
    ///
    /// Entries with equal `created_at` are accepted in any order.
    pub fn from_newest_first(jobs: Vec<JobStatusAndTimestamp>) -> Result<Self, WindowError> {
        if let Some(pair) = jobs.windows(2).find(|pair| pair[0].created_at < pair[1].created_at) {
            return Err(WindowError::OutOfOrder {
                earlier_id: pair[0].id,
                earlier_at: pair[0].created_at,
                later_id: pair[1].id,
                later_at: pair[1].created_at,
            });
        }
        Ok(Self { jobs })
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&JobStatusAndTimestamp> {
        self.jobs.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, JobStatusAndTimestamp> {
        self.jobs.iter()
    }

    pub fn as_slice(&self) -> &[JobStatusAndTimestamp] {
        &self.jobs
    }
}

impl<'a> IntoIterator for &'a HistoryWindow {
    type Item = &'a JobStatusAndTimestamp;
    type IntoIter = std::slice::Iter<'a, JobStatusAndTimestamp>;

    fn into_iter(self) -> Self::IntoIter {
        self.jobs.iter()
    }
}
