#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use syncguard::{
    AutoDisableInput, AutoDisablePolicy, JobHistoryPort, JsonStore, PolicyPorts, PortError,
    RecordingNotifier, StaticFeatureFlags,
};
use syncguard_common::{
    Connection, ConnectionId, ConnectionStatus, JobConfigType, JobRecord, JobStatus,
    JobStatusAndTimestamp, Thresholds,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

        let _ = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .json(),
            )
            .with(filter)
            .try_init();
    });
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap()
}

/// One connection with a controllable job history.
pub struct Fixture {
    pub store: Arc<JsonStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub connection_id: ConnectionId,
    pub now: DateTime<Utc>,
    next_id: i64,
}

impl Fixture {
    pub fn new() -> Self {
        let store = Arc::new(JsonStore::new());
        let connection_id = ConnectionId::random();
        store.insert_connection(Connection {
            id: connection_id,
            name: "postgres → snowflake".to_string(),
            status: ConnectionStatus::Active,
        });
        Self {
            store,
            notifier: Arc::new(RecordingNotifier::new()),
            connection_id,
            now: base_time(),
            next_id: 1,
        }
    }

    /// Add a replication job created `age` before `now`.
    pub fn job(&mut self, status: JobStatus, age: Duration) -> &mut Self {
        self.job_of(JobConfigType::Sync, status, age)
    }

    pub fn job_of(&mut self, config_type: JobConfigType, status: JobStatus, age: Duration) -> &mut Self {
        let created_at = self.now - age;
        self.store.insert_job(JobRecord {
            id: self.next_id,
            connection_id: self.connection_id,
            config_type,
            status,
            created_at,
            updated_at: created_at + Duration::minutes(10),
        });
        self.next_id += 1;
        self
    }

    /// Add jobs one hour apart, newest first, the newest an hour before `now`.
    pub fn recent(&mut self, newest_first: &[JobStatus]) -> &mut Self {
        for (i, status) in newest_first.iter().enumerate() {
            self.job(*status, Duration::hours(i as i64 + 1));
        }
        self
    }

    pub fn advance(&mut self, by: Duration) -> &mut Self {
        self.now += by;
        self
    }

    pub fn input(&self) -> AutoDisableInput {
        AutoDisableInput {
            connection_id: self.connection_id,
            now: self.now,
        }
    }

    pub fn ports(&self, enabled: bool) -> PolicyPorts {
        PolicyPorts {
            history: self.store.clone(),
            connections: self.store.clone(),
            notifier: self.notifier.clone(),
            flags: Arc::new(StaticFeatureFlags(enabled)),
        }
    }

    pub fn policy(&self, max_consecutive_failures: u32, max_failure_window_days: u32) -> AutoDisablePolicy {
        let thresholds = Thresholds::new(max_consecutive_failures, max_failure_window_days).unwrap();
        AutoDisablePolicy::new(self.ports(true), thresholds)
    }

    pub fn status(&self) -> ConnectionStatus {
        self.store.connection(self.connection_id).unwrap().status
    }
}

/// Wraps a history port and counts every call.
pub struct CountingHistory {
    inner: Arc<dyn JobHistoryPort>,
    calls: AtomicUsize,
}

impl CountingHistory {
    pub fn new(inner: Arc<dyn JobHistoryPort>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl JobHistoryPort for CountingHistory {
    fn last_replication_job(&self, connection_id: ConnectionId) -> Result<Option<JobRecord>, PortError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.last_replication_job(connection_id)
    }

    fn first_replication_job(&self, connection_id: ConnectionId) -> Result<Option<JobRecord>, PortError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.first_replication_job(connection_id)
    }

    fn list_job_status_and_timestamp(
        &self,
        connection_id: ConnectionId,
        job_types: &[JobConfigType],
        since: DateTime<Utc>,
    ) -> Result<Vec<JobStatusAndTimestamp>, PortError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner
            .list_job_status_and_timestamp(connection_id, job_types, since)
    }
}

/// History port returning canned answers, for shapes a real store never
/// produces.
#[derive(Default)]
pub struct ScriptedHistory {
    pub last: Option<JobRecord>,
    pub first: Option<JobRecord>,
    pub listing: Vec<JobStatusAndTimestamp>,
    pub unavailable: Mutex<Option<String>>,
}

impl JobHistoryPort for ScriptedHistory {
    fn last_replication_job(&self, _: ConnectionId) -> Result<Option<JobRecord>, PortError> {
        if let Some(reason) = self.unavailable.lock().unwrap().clone() {
            return Err(PortError::Unavailable {
                store: "job store",
                reason,
            });
        }
        Ok(self.last.clone())
    }

    fn first_replication_job(&self, _: ConnectionId) -> Result<Option<JobRecord>, PortError> {
        Ok(self.first.clone())
    }

    fn list_job_status_and_timestamp(
        &self,
        _: ConnectionId,
        _: &[JobConfigType],
        _: DateTime<Utc>,
    ) -> Result<Vec<JobStatusAndTimestamp>, PortError> {
        Ok(self.listing.clone())
    }
}

pub fn failed_job(connection_id: ConnectionId, id: i64, at: DateTime<Utc>) -> JobRecord {
    JobRecord {
        id,
        connection_id,
        config_type: JobConfigType::Sync,
        status: JobStatus::Failed,
        created_at: at,
        updated_at: at,
    }
}
