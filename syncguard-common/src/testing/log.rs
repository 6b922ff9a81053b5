//! JSONL trails for tests.
//!
//! Off by default. With `SYNCGUARD_TEST_LOGGING=1` (or whenever `CI` is
//! set) each guarded test appends its phases to
//! `target/test-logs/<test>.jsonl`, and every `tracing` event emitted while
//! tests run is mirrored into `target/test-logs/all_tests.jsonl`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, Once};
use std::time::Instant;
use tracing_subscriber::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestPhase {
    Setup,
    Execute,
    Verify,
}

impl TestPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Execute => "execute",
            Self::Verify => "verify",
        }
    }
}

impl std::fmt::Display for TestPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of a test trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestLogEntry {
    pub at: DateTime<Utc>,
    pub test: String,
    pub phase: TestPhase,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
}

impl TestLogEntry {
    pub fn new(test: &str, phase: TestPhase, message: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            test: test.to_string(),
            phase,
            message: message.into(),
            data: None,
            elapsed_ms: None,
        }
    }

    #[must_use]
    pub fn with_data(self, data: serde_json::Value) -> Self {
        Self {
            data: Some(data),
            ..self
        }
    }

    #[must_use]
    pub fn with_elapsed_ms(self, elapsed_ms: u64) -> Self {
        Self {
            elapsed_ms: Some(elapsed_ms),
            ..self
        }
    }
}

fn trail_dir() -> PathBuf {
    if let Some(target) = std::env::var_os("CARGO_TARGET_DIR") {
        return PathBuf::from(target).join("test-logs");
    }
    // Integration tests run from the crate directory; walk up to the
    // workspace target dir.
    let cwd = std::env::current_dir().unwrap_or_default();
    cwd.ancestors()
        .map(|dir| dir.join("target"))
        .find(|target| target.is_dir())
        .unwrap_or_else(|| PathBuf::from("target"))
        .join("test-logs")
}

fn open_trail(name: &str) -> Option<File> {
    let dir = trail_dir();
    std::fs::create_dir_all(&dir).ok()?;
    let file_name: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    File::create(dir.join(format!("{file_name}.jsonl"))).ok()
}

static SUBSCRIBER: Once = Once::new();

/// Install a test subscriber that writes JSON to `all_tests.jsonl` and a
/// compact copy to the test harness output. Idempotent.
///
/// The filter comes from `SYNCGUARD_TEST_LOG_LEVEL` (default `debug`).
pub fn init_global_test_logging() {
    SUBSCRIBER.call_once(|| {
        let level = std::env::var("SYNCGUARD_TEST_LOG_LEVEL").unwrap_or_else(|_| "debug".to_string());
        let filter = tracing_subscriber::EnvFilter::try_new(format!(
            "syncguard={level},syncguard_common={level}"
        ))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"));

        let json = open_trail("all_tests").map(|file| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(Mutex::new(file))
                .with_file(true)
                .with_line_number(true)
        });
        let console = tracing_subscriber::fmt::layer()
            .compact()
            .with_test_writer()
            .with_target(true);

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(json)
            .with(console)
            .try_init();
    });
}

fn trail_enabled() -> bool {
    match std::env::var("SYNCGUARD_TEST_LOGGING").ok().as_deref() {
        Some("1" | "true") => true,
        Some("0" | "false") => false,
        _ => std::env::var_os("CI").is_some(),
    }
}

struct Trail {
    test: String,
    started: Instant,
    file: Option<Mutex<File>>,
}

impl Trail {
    fn write(&self, entry: TestLogEntry) {
        let entry = entry.with_elapsed_ms(self.started.elapsed().as_millis() as u64);
        tracing::info!(
            test = %entry.test,
            phase = %entry.phase,
            elapsed_ms = entry.elapsed_ms,
            "{}",
            entry.message
        );

        let Some(file) = &self.file else { return };
        let Ok(line) = serde_json::to_string(&entry) else { return };
        if let Ok(mut file) = file.lock() {
            let _ = writeln!(file, "{line}");
        }
    }
}

/// Per-test trail that records PASS or FAIL when dropped.
///
/// A no-op unless trail logging is enabled.
pub struct TestGuard {
    trail: Option<Trail>,
}

impl TestGuard {
    pub fn new(test: &str) -> Self {
        if !trail_enabled() {
            return Self { trail: None };
        }
        init_global_test_logging();
        let trail = Trail {
            test: test.to_string(),
            started: Instant::now(),
            file: open_trail(test).map(Mutex::new),
        };
        trail.write(TestLogEntry::new(test, TestPhase::Setup, "TEST START"));
        Self { trail: Some(trail) }
    }

    pub fn log(&self, phase: TestPhase, message: impl Into<String>) {
        if let Some(trail) = &self.trail {
            trail.write(TestLogEntry::new(&trail.test, phase, message));
        }
    }

    pub fn log_with_data(&self, phase: TestPhase, message: impl Into<String>, data: serde_json::Value) {
        if let Some(trail) = &self.trail {
            trail.write(TestLogEntry::new(&trail.test, phase, message).with_data(data));
        }
    }
}

impl Drop for TestGuard {
    fn drop(&mut self) {
        let Some(trail) = self.trail.take() else { return };
        let entry = if std::thread::panicking() {
            TestLogEntry::new(&trail.test, TestPhase::Verify, "TEST FAIL")
                .with_data(serde_json::json!({ "reason": "panicked" }))
        } else {
            TestLogEntry::new(&trail.test, TestPhase::Verify, "TEST PASS")
        };
        trail.write(entry);
    }
}

/// Last path segment of a marker fn nested in a test, i.e. the test's name.
#[doc(hidden)]
pub fn test_name_from_marker(path: &'static str) -> &'static str {
    let path = path.strip_suffix("::marker").unwrap_or(path);
    path.rsplit("::").next().unwrap_or(path)
}

/// [`TestGuard`] named after the enclosing test function.
#[macro_export]
macro_rules! test_guard {
    () => {{
        fn marker() {}
        let path = ::std::any::type_name_of_val(&marker);
        $crate::testing::TestGuard::new($crate::testing::log::test_name_from_marker(path))
    }};
}
