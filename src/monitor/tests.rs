//! Tests for the resource monitor loop and worker pool.

use std::sync::Arc;
use std::time::Duration;

use rstest::rstest;
use tokio::time::Instant;

use super::*;
use crate::test_support::ScriptedStatusSource;

fn identity() -> ResourceIdentity {
    ResourceIdentity::new("dev-weu-rg-hub", "vnet", "dev-weu-vnet-hub")
}

fn monitor(poll_secs: u64, timeout_secs: u64) -> ResourceMonitor {
    ResourceMonitor::new(MonitorTiming::new(
        Duration::from_secs(poll_secs),
        Duration::from_secs(timeout_secs),
    ))
}

#[tokio::test(start_paused = true)]
async fn immediate_success_needs_exactly_one_query() {
    let source = ScriptedStatusSource::with_states(&["Succeeded"]);
    let started = Instant::now();

    let outcome = monitor(10, 300).watch(&source, &identity()).await;

    assert_eq!(outcome, MonitorOutcome::Succeeded { queries: 1 });
    assert_eq!(source.query_count(), 1);
    assert_eq!(started.elapsed(), Duration::ZERO, "no sleep before the first query");
}

#[tokio::test(start_paused = true)]
async fn success_after_transitional_states_waits_one_interval_per_retry() {
    let source = ScriptedStatusSource::with_states(&["Creating", "Updating", "Succeeded"]);
    let started = Instant::now();

    let outcome = monitor(10, 300).watch(&source, &identity()).await;

    assert_eq!(outcome, MonitorOutcome::Succeeded { queries: 3 });
    assert_eq!(started.elapsed(), Duration::from_secs(20));
}

#[rstest]
#[case("Failed")]
#[case("Canceled")]
#[tokio::test(start_paused = true)]
async fn failed_terminal_states_stop_the_loop(#[case] terminal: &str) {
    let source = ScriptedStatusSource::with_states(&["Creating", terminal]);

    let outcome = monitor(30, 3600).watch(&source, &identity()).await;

    assert_eq!(
        outcome,
        MonitorOutcome::Failed {
            state: terminal.to_owned()
        }
    );
    assert_eq!(source.query_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn never_settling_resource_times_out_within_one_interval_of_the_deadline() {
    let source = ScriptedStatusSource::with_states(&["Creating"]);
    let poll = Duration::from_secs(10);
    let budget = Duration::from_secs(60);
    let started = Instant::now();

    let outcome = monitor(10, 60).watch(&source, &identity()).await;

    let elapsed = started.elapsed();
    assert!(
        matches!(outcome, MonitorOutcome::TimedOut { .. }),
        "unexpected outcome: {outcome:?}"
    );
    assert!(elapsed >= budget, "returned early after {elapsed:?}");
    assert!(elapsed <= budget + poll, "returned late after {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn uneven_interval_is_clamped_to_the_deadline() {
    let source = ScriptedStatusSource::with_states(&["Creating"]);
    let started = Instant::now();

    let outcome = monitor(40, 100).watch(&source, &identity()).await;

    assert!(matches!(outcome, MonitorOutcome::TimedOut { .. }));
    assert_eq!(started.elapsed(), Duration::from_secs(100));
    assert_eq!(source.query_count(), 3, "queries at 0s, 40s and 80s");
}

#[tokio::test(start_paused = true)]
async fn transient_errors_keep_polling() {
    let source = ScriptedStatusSource::default();
    source.push(Err(StatusError::Transient {
        identity: identity().to_string(),
        message: String::from("connection reset"),
    }));
    source.push(Ok(ProvisioningState::Succeeded));

    let outcome = monitor(5, 60).watch(&source, &identity()).await;

    assert_eq!(outcome, MonitorOutcome::Succeeded { queries: 2 });
}

#[tokio::test(start_paused = true)]
async fn structural_errors_fail_fast() {
    let source = ScriptedStatusSource::default();
    source.push(Err(StatusError::ResourceGroupNotFound {
        resource_group: String::from("dev-weu-rg-hub"),
    }));
    let started = Instant::now();

    let outcome = monitor(5, 60).watch(&source, &identity()).await;

    assert!(
        matches!(outcome, MonitorOutcome::Aborted { ref message } if message.contains("dev-weu-rg-hub")),
        "unexpected outcome: {outcome:?}"
    );
    assert_eq!(source.query_count(), 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

/// Status source whose query never completes.
struct HangingSource;

impl StatusSource for HangingSource {
    fn query<'a>(&'a self, _identity: &'a ResourceIdentity) -> StatusFuture<'a> {
        Box::pin(std::future::pending())
    }
}

#[tokio::test(start_paused = true)]
async fn hanging_query_is_cut_off_at_the_deadline() {
    let started = Instant::now();

    let outcome = monitor(10, 60).watch(&HangingSource, &identity()).await;

    assert!(matches!(outcome, MonitorOutcome::TimedOut { .. }));
    assert_eq!(started.elapsed(), Duration::from_secs(60));
}

#[rstest]
#[case(0, 1)]
#[case(3, 3)]
#[case(12, MAX_MONITOR_WORKERS)]
fn pool_size_is_bounded(#[case] requested: usize, #[case] expected: usize) {
    assert_eq!(MonitorPool::new(requested).size(), expected);
}

#[tokio::test(start_paused = true)]
async fn pool_runs_the_monitor_on_a_worker() {
    let pool = MonitorPool::new(2);
    let source = Arc::new(ScriptedStatusSource::with_states(&["Creating", "Succeeded"]));

    let outcome = pool
        .run(monitor(10, 300), Arc::clone(&source), identity())
        .await;

    assert_eq!(outcome, MonitorOutcome::Succeeded { queries: 2 });
    assert_eq!(source.queried(), vec![identity(), identity()]);
}

/// Status source that panics, standing in for a crashed worker.
struct PanickingSource;

impl StatusSource for PanickingSource {
    fn query<'a>(&'a self, _identity: &'a ResourceIdentity) -> StatusFuture<'a> {
        Box::pin(async { explode() })
    }
}

fn explode() -> Result<ProvisioningState, StatusError> {
    panic!("status source exploded")
}

#[tokio::test]
async fn crashed_worker_is_reported_as_aborted() {
    let pool = MonitorPool::new(1);

    let outcome = pool
        .run(monitor(1, 10), Arc::new(PanickingSource), identity())
        .await;

    assert!(
        matches!(outcome, MonitorOutcome::Aborted { ref message } if message.contains("monitor worker failed")),
        "unexpected outcome: {outcome:?}"
    );
}
