//! Failure-streak auto-disable policy for data-sync connections.
//!
//! Given a connection's replication history, [`AutoDisablePolicy`] decides
//! whether the connection should be set inactive, or whether an early
//! warning is due, based on either a run of consecutive failures or a
//! calendar window without any success.

pub mod decision;
pub mod dedup;
pub mod notify;
pub mod policy;
pub mod ports;
pub mod scanner;
pub mod store;
pub mod window;

pub use decision::{
    DecisionEngine, DisableReason, Verdict, WindowWarning, days_between, lookback_start,
};
pub use dedup::{DedupOutcome, WarningDeduplicator};
pub use notify::{EnvFeatureFlags, NotificationRequest, RecordingNotifier, StaticFeatureFlags, TracingNotifier};
pub use policy::{
    AutoDisableInput, AutoDisableOutput, AutoDisablePolicy, Evaluation, PolicyError, RetryableError,
};
pub use ports::{ConnectionPort, FeatureFlags, JobHistoryPort, NotifierPort, PolicyPorts, PortError};
pub use scanner::{StreakSummary, scan_history};
pub use store::{JsonStore, Snapshot};
pub use window::{HistoryWindow, WindowError};

pub use syncguard_common::{LogConfig, init_logging};
