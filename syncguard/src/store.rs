//! In-memory job and connection store backed by a JSON snapshot.
//!
//! Reference implementation of [`JobHistoryPort`] and [`ConnectionPort`]
//! used by the CLI and the integration tests.

use crate::ports::{ConnectionPort, JobHistoryPort, PortError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::RwLock;
use syncguard_common::{
    Connection, ConnectionId, JobConfigType, JobRecord, JobStatusAndTimestamp,
};
use tracing::debug;

/// On-disk layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub jobs: Vec<JobRecord>,
}

#[derive(Debug, Default)]
struct StoreState {
    connections: BTreeMap<ConnectionId, Connection>,
    jobs: Vec<JobRecord>,
}

#[derive(Debug, Default)]
pub struct JsonStore {
    state: RwLock<StoreState>,
}

impl JsonStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let store = Self::new();
        for connection in snapshot.connections {
            store.insert_connection(connection);
        }
        for job in snapshot.jobs {
            store.insert_job(job);
        }
        store
    }

    pub fn load(path: &Path) -> Result<Self, PortError> {
        let text = fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&text)?;
        debug!(
            path = %path.display(),
            connections = snapshot.connections.len(),
            jobs = snapshot.jobs.len(),
            "loaded store snapshot"
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// Write the snapshot through a sibling temp file so a crash never
    /// leaves a truncated store behind.
    pub fn save(&self, path: &Path) -> Result<(), PortError> {
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        debug!(path = %path.display(), "saved store snapshot");
        Ok(())
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        Snapshot {
            connections: state.connections.values().cloned().collect(),
            jobs: state.jobs.clone(),
        }
    }

    pub fn insert_connection(&self, connection: Connection) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.connections.insert(connection.id, connection);
    }

    pub fn remove_connection(&self, connection_id: ConnectionId) -> Option<Connection> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.connections.remove(&connection_id)
    }

    pub fn connection(&self, connection_id: ConnectionId) -> Option<Connection> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.connections.get(&connection_id).cloned()
    }

    /// Insert a job, keeping jobs ordered by `(created_at, id)`.
    pub fn insert_job(&self, job: JobRecord) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let key = (job.created_at, job.id);
        let pos = state
            .jobs
            .partition_point(|existing| (existing.created_at, existing.id) <= key);
        state.jobs.insert(pos, job);
    }

    /// Jobs for a connection, oldest first.
    pub fn jobs(&self, connection_id: ConnectionId) -> Vec<JobRecord> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state
            .jobs
            .iter()
            .filter(|job| job.connection_id == connection_id)
            .cloned()
            .collect()
    }

    fn replication_jobs(&self, connection_id: ConnectionId) -> Vec<JobRecord> {
        self.jobs(connection_id)
            .into_iter()
            .filter(|job| job.config_type.is_replication())
            .collect()
    }
}

impl JobHistoryPort for JsonStore {
    fn last_replication_job(&self, connection_id: ConnectionId) -> Result<Option<JobRecord>, PortError> {
        Ok(self.replication_jobs(connection_id).pop())
    }

    fn first_replication_job(&self, connection_id: ConnectionId) -> Result<Option<JobRecord>, PortError> {
        Ok(self.replication_jobs(connection_id).into_iter().next())
    }

    fn list_job_status_and_timestamp(
        &self,
        connection_id: ConnectionId,
        job_types: &[JobConfigType],
        since: DateTime<Utc>,
    ) -> Result<Vec<JobStatusAndTimestamp>, PortError> {
        Ok(self
            .jobs(connection_id)
            .iter()
            .rev()
            .filter(|job| job_types.contains(&job.config_type) && job.created_at >= since)
            .map(JobRecord::status_and_timestamp)
            .collect())
    }
}

impl ConnectionPort for JsonStore {
    fn get_connection(&self, connection_id: ConnectionId) -> Result<Connection, PortError> {
        self.connection(connection_id)
            .ok_or(PortError::ConnectionNotFound(connection_id))
    }

    fn write_connection(&self, connection: &Connection) -> Result<(), PortError> {
        self.insert_connection(connection.clone());
        Ok(())
    }
}
