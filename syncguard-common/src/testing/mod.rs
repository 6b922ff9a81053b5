//! Test support shared across syncguard crates.

pub mod log;

pub use log::{TestGuard, TestLogEntry, TestPhase, init_global_test_logging};
