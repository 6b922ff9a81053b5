//! End-to-end behaviour of the auto-disable policy against the JSON store.

mod common;

use chrono::Duration;
use common::{CountingHistory, Fixture, ScriptedHistory, failed_job, init_test_logging};
use std::sync::{Arc, Mutex};
use syncguard::{
    AutoDisablePolicy, DedupOutcome, DisableReason, JsonStore, PolicyError, PolicyPorts,
    RecordingNotifier, StaticFeatureFlags, Verdict,
};
use syncguard_common::testing::TestPhase;
use syncguard_common::{
    ConnectionStatus, ErrorCode, JobConfigType, JobStatus, NotificationKind, Thresholds, test_guard,
};
use tracing::info;

use JobStatus::{Cancelled, Failed, Running, Succeeded};

// ============================================================================
// Feature flag
// ============================================================================

#[test]
fn test_flag_off_fetches_nothing() {
    init_test_logging();
    let guard = test_guard!();
    let mut fx = Fixture::new();
    fx.recent(&[Failed, Failed, Failed]);

    let history = Arc::new(CountingHistory::new(fx.store.clone()));
    let mut ports = fx.ports(false);
    ports.history = history.clone();
    let policy = AutoDisablePolicy::new(ports, Thresholds::new(3, 10).unwrap());

    guard.log(TestPhase::Execute, "evaluating with flag off");
    let output = policy.auto_disable_failing_connection(&fx.input()).unwrap();

    assert!(!output.disabled);
    assert_eq!(history.calls(), 0);
    assert!(fx.notifier.requests().is_empty());
    assert_eq!(fx.status(), ConnectionStatus::Active);
}

// ============================================================================
// Consecutive-failure rules (max 3, warn 1)
// ============================================================================

#[test]
fn test_three_failures_disable_and_notify() {
    init_test_logging();
    let mut fx = Fixture::new();
    fx.recent(&[Failed, Failed, Failed, Succeeded]);

    let output = fx.policy(3, 10).auto_disable_failing_connection(&fx.input()).unwrap();

    assert!(output.disabled);
    assert_eq!(fx.status(), ConnectionStatus::Inactive);
    assert_eq!(fx.notifier.kinds(), vec![NotificationKind::ConnectionDisabled]);
}

#[test]
fn test_one_failure_warns() {
    init_test_logging();
    let mut fx = Fixture::new();
    fx.recent(&[Failed, Succeeded]);

    let output = fx.policy(3, 10).auto_disable_failing_connection(&fx.input()).unwrap();

    assert!(!output.disabled);
    assert_eq!(fx.status(), ConnectionStatus::Active);
    assert_eq!(fx.notifier.kinds(), vec![NotificationKind::ConnectionDisabledWarning]);
}

#[test]
fn test_two_failures_do_nothing() {
    init_test_logging();
    let mut fx = Fixture::new();
    fx.recent(&[Failed, Failed, Succeeded]);

    let evaluation = fx.policy(3, 10).evaluate_detailed(&fx.input()).unwrap();

    assert_eq!(evaluation.verdict, Verdict::NoAction);
    assert!(!evaluation.disabled);
    assert!(fx.notifier.requests().is_empty());
}

#[test]
fn test_four_failures_fall_through_to_window_rules() {
    init_test_logging();
    let mut fx = Fixture::new();
    fx.recent(&[Failed, Failed, Failed, Failed]);

    let evaluation = fx.policy(3, 10).evaluate_detailed(&fx.input()).unwrap();
    assert_eq!(evaluation.summary.consecutive_failures, 4);
    assert_eq!(evaluation.verdict, Verdict::NoAction);
    assert_eq!(fx.status(), ConnectionStatus::Active);

    // Same streak on a connection whose first job predates the window.
    let mut fx = Fixture::new();
    fx.recent(&[Failed, Failed, Failed, Failed]).job(Failed, Duration::days(12));

    let evaluation = fx.policy(3, 10).evaluate_detailed(&fx.input()).unwrap();
    assert_eq!(evaluation.summary.consecutive_failures, 4);
    assert_eq!(
        evaluation.verdict,
        Verdict::Disable {
            reason: DisableReason::FailureWindow
        }
    );
    assert_eq!(fx.status(), ConnectionStatus::Inactive);
}

// ============================================================================
// Day-window rules (max 10 days, warn 5)
// ============================================================================

#[test]
fn test_window_without_success_disables() {
    init_test_logging();
    let mut fx = Fixture::new();
    for day in (1..=10).rev() {
        fx.job(Failed, Duration::days(day));
    }

    let evaluation = fx.policy(100, 10).evaluate_detailed(&fx.input()).unwrap();

    assert_eq!(evaluation.window_len, 10);
    assert!(evaluation.disabled);
    assert_eq!(
        evaluation.verdict,
        Verdict::Disable {
            reason: DisableReason::FailureWindow
        }
    );
    assert_eq!(fx.notifier.kinds(), vec![NotificationKind::ConnectionDisabled]);
}

#[test]
fn test_success_in_window_prevents_window_disable() {
    init_test_logging();
    let mut fx = Fixture::new();
    fx.job(Failed, Duration::days(10)).job(Succeeded, Duration::days(9));
    for day in (1..=8).rev() {
        fx.job(Failed, Duration::days(day));
    }

    let evaluation = fx.policy(100, 10).evaluate_detailed(&fx.input()).unwrap();

    assert!(!evaluation.disabled);
    assert_eq!(evaluation.summary.consecutive_failures, 8);
    assert!(matches!(evaluation.verdict, Verdict::WarnWindow(_)));
    // The previous failure already sat 7 days past the success.
    assert!(matches!(evaluation.dedup, Some(DedupOutcome::Suppress { .. })));
    assert!(fx.notifier.requests().is_empty());
}

#[test]
fn test_window_warning_is_sent_once() {
    init_test_logging();
    let guard = test_guard!();
    let mut fx = Fixture::new();
    fx.job(Failed, Duration::days(6)).job(Failed, Duration::hours(1));
    let policy = fx.policy(100, 10);

    let first = policy.evaluate_detailed(&fx.input()).unwrap();
    guard.log_with_data(
        TestPhase::Verify,
        "first evaluation",
        serde_json::to_value(&first).unwrap(),
    );
    assert!(matches!(first.verdict, Verdict::WarnWindow(_)));
    assert_eq!(first.dedup, Some(DedupOutcome::Send));
    assert_eq!(fx.notifier.kinds(), vec![NotificationKind::ConnectionDisabledWarning]);

    fx.advance(Duration::days(1)).job(Failed, Duration::hours(1));
    let second = policy.evaluate_detailed(&fx.input()).unwrap();
    info!(?second, "second evaluation");

    assert!(matches!(second.verdict, Verdict::WarnWindow(_)));
    assert!(matches!(second.dedup, Some(DedupOutcome::Suppress { .. })));
    assert_eq!(second.notification, None);
    assert_eq!(fx.notifier.requests().len(), 1);
}

// ============================================================================
// Streak shape
// ============================================================================

#[test]
fn test_other_statuses_inside_streak_are_ignored() {
    init_test_logging();
    let mut fx = Fixture::new();
    fx.recent(&[Failed, Cancelled, Failed, Running, Failed, Succeeded]);

    let output = fx.policy(3, 10).auto_disable_failing_connection(&fx.input()).unwrap();
    assert!(output.disabled);

    let mut fx = Fixture::new();
    fx.recent(&[Failed, Cancelled, Failed, Succeeded]);
    let evaluation = fx.policy(3, 10).evaluate_detailed(&fx.input()).unwrap();
    assert_eq!(evaluation.summary.consecutive_failures, 2);
    assert_eq!(evaluation.verdict, Verdict::NoAction);
}

#[test]
fn test_non_replication_jobs_are_invisible() {
    init_test_logging();
    let mut fx = Fixture::new();
    fx.recent(&[Failed, Succeeded]);
    fx.job_of(JobConfigType::CheckConnection, Failed, Duration::minutes(30))
        .job_of(JobConfigType::DiscoverSchema, Failed, Duration::minutes(20));

    let evaluation = fx.policy(3, 10).evaluate_detailed(&fx.input()).unwrap();
    assert_eq!(evaluation.summary.consecutive_failures, 1);
    assert_eq!(evaluation.verdict, Verdict::WarnConsecutive);
}

#[test]
fn test_identical_inputs_give_identical_verdicts() {
    init_test_logging();
    let mut fx = Fixture::new();
    fx.recent(&[Failed, Succeeded, Failed]);
    let policy = fx.policy(3, 10);

    let first = policy.evaluate_detailed(&fx.input()).unwrap();
    let second = policy.evaluate_detailed(&fx.input()).unwrap();

    assert_eq!(first, second);
    assert_eq!(fx.notifier.requests().len(), 2);
}

// ============================================================================
// Failures
// ============================================================================

fn scripted_policy(history: ScriptedHistory) -> AutoDisablePolicy {
    let store = Arc::new(JsonStore::new());
    let ports = PolicyPorts {
        history: Arc::new(history),
        connections: store,
        notifier: Arc::new(RecordingNotifier::new()),
        flags: Arc::new(StaticFeatureFlags(true)),
    };
    AutoDisablePolicy::new(ports, Thresholds::new(100, 10).unwrap())
}

#[test]
fn test_no_history_is_retryable() {
    init_test_logging();
    let fx = Fixture::new();
    let err = fx
        .policy(3, 10)
        .auto_disable_failing_connection(&fx.input())
        .unwrap_err();

    assert_eq!(err.error_code(), ErrorCode::HistoryMissingLastJob);
    assert_eq!(err.connection_id, fx.connection_id);
    assert!(err.to_string().contains("SG-E100"));
    assert_eq!(fx.status(), ConnectionStatus::Active);
}

#[test]
fn test_missing_first_job_is_retryable() {
    init_test_logging();
    let fx = Fixture::new();
    let newest = failed_job(fx.connection_id, 2, fx.now - Duration::hours(1));
    let older = failed_job(fx.connection_id, 1, fx.now - Duration::hours(2));
    let policy = scripted_policy(ScriptedHistory {
        last: Some(newest.clone()),
        first: None,
        listing: vec![newest.status_and_timestamp(), older.status_and_timestamp()],
        ..Default::default()
    });

    let err = policy.auto_disable_failing_connection(&fx.input()).unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::HistoryMissingFirstJob);
    assert!(matches!(err.into_policy_error(), PolicyError::MissingFirstJob(_)));
}

#[test]
fn test_out_of_order_history_is_rejected() {
    init_test_logging();
    let fx = Fixture::new();
    let newest = failed_job(fx.connection_id, 2, fx.now - Duration::hours(1));
    let older = failed_job(fx.connection_id, 1, fx.now - Duration::hours(2));
    let policy = scripted_policy(ScriptedHistory {
        last: Some(newest.clone()),
        first: Some(older.clone()),
        listing: vec![older.status_and_timestamp(), newest.status_and_timestamp()],
        ..Default::default()
    });

    let err = policy.auto_disable_failing_connection(&fx.input()).unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::HistoryOutOfOrder);
}

#[test]
fn test_widest_window_evaluates_and_wider_is_rejected() {
    init_test_logging();
    let mut fx = Fixture::new();
    fx.recent(&[Failed, Failed]);

    assert!(Thresholds::new(3, 200_000_000).is_err());
    let output = fx
        .policy(3, Thresholds::UPPER_LIMIT)
        .auto_disable_failing_connection(&fx.input())
        .unwrap();

    assert!(!output.disabled);
    assert_eq!(fx.status(), ConnectionStatus::Active);
}

#[test]
fn test_store_outage_is_retryable() {
    init_test_logging();
    let fx = Fixture::new();
    let policy = scripted_policy(ScriptedHistory {
        unavailable: Mutex::new(Some("connection reset".to_string())),
        ..Default::default()
    });

    let err = policy.auto_disable_failing_connection(&fx.input()).unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::HistoryStoreUnavailable);
    assert!(err.to_string().contains(&fx.connection_id.to_string()));
}

// ============================================================================
// Snapshot round trip
// ============================================================================

#[test]
fn test_disable_persists_through_snapshot() {
    init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");

    let mut fx = Fixture::new();
    fx.recent(&[Failed, Failed, Failed]);
    fx.store.save(&path).unwrap();

    let store = Arc::new(JsonStore::load(&path).unwrap());
    let ports = PolicyPorts {
        history: store.clone(),
        connections: store.clone(),
        notifier: Arc::new(RecordingNotifier::new()),
        flags: Arc::new(StaticFeatureFlags(true)),
    };
    let policy = AutoDisablePolicy::new(ports, Thresholds::new(3, 10).unwrap());
    assert!(policy.auto_disable_failing_connection(&fx.input()).unwrap().disabled);
    store.save(&path).unwrap();

    let reloaded = JsonStore::load(&path).unwrap();
    assert_eq!(
        reloaded.connection(fx.connection_id).map(|c| c.status),
        Some(ConnectionStatus::Inactive)
    );
    assert_eq!(reloaded.jobs(fx.connection_id).len(), 3);
}

// ============================================================================
// Properties
// ============================================================================

mod proptest_policy {
    use super::*;
    use proptest::prelude::*;

    fn status_strategy() -> impl Strategy<Value = JobStatus> {
        prop_oneof![
            3 => Just(Failed),
            2 => Just(Succeeded),
            1 => Just(Cancelled),
            1 => Just(Running),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn test_side_effects_match_verdict(
            statuses in prop::collection::vec(status_strategy(), 1..24),
            max_failures in 1u32..8,
            max_days in 1u32..20,
        ) {
            let mut fx = Fixture::new();
            fx.recent(&statuses);
            let evaluation = fx.policy(max_failures, max_days).evaluate_detailed(&fx.input()).unwrap();

            prop_assert_eq!(evaluation.disabled, evaluation.verdict.is_disable());
            prop_assert_eq!(evaluation.disabled, fx.status() == ConnectionStatus::Inactive);
            prop_assert!(fx.notifier.requests().len() <= 1);
            prop_assert_eq!(fx.notifier.kinds().first().copied(), evaluation.notification);
            if evaluation.disabled {
                prop_assert_eq!(evaluation.notification, Some(NotificationKind::ConnectionDisabled));
            }
        }
    }
}
