//! Cancellation: in-flight tasks finish, pending tasks are skipped

use crate::helpers::*;
use rollout::core::state::RunStatus;
use rollout::execution::SchedulingStrategy;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_cancel_during_clone_skips_the_rest() {
    // The clone holds the batch open long enough for the cancel to land.
    let harness = Harness::new(
        SITE_ROLLOUT,
        Arc::new(MockFetcher::with_delay(Duration::from_millis(200))),
        SchedulingStrategy::Parallel,
    );

    let handle = harness.cancellation_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel();
    });

    let report = harness.run(SITE_PARAMS).await;

    assert_eq!(report.status, RunStatus::Cancelled);
    assert!(report.failed());

    // The in-flight clone ran to completion.
    assert_eq!(report.task("cleanup").unwrap().status, "succeeded");
    assert_eq!(report.task("clone").unwrap().status, "succeeded");

    // Nothing new was scheduled after the cancel.
    assert_eq!(report.task("rollout").unwrap().status, "skipped");
    assert_eq!(
        report.task("rollout").unwrap().skip_reason.as_deref(),
        Some("run cancelled")
    );
    assert_eq!(report.task("attach-config").unwrap().status, "skipped");
    assert!(harness.store.is_empty().await);
}

#[tokio::test]
async fn test_cancel_before_start_skips_everything() {
    let harness = Harness::new(
        SITE_ROLLOUT,
        Arc::new(MockFetcher::new()),
        SchedulingStrategy::Parallel,
    );
    harness.cancellation_handle().cancel();

    let report = harness.run(SITE_PARAMS).await;

    assert_eq!(report.status, RunStatus::Cancelled);
    assert!(report.tasks.iter().all(|t| t.status == "skipped"));
}
