//! Failure propagation: a failed task skips everything downstream

use crate::helpers::*;
use rollout::core::state::RunStatus;
use rollout::execution::SchedulingStrategy;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_fetch_failure_skips_downstream() {
    let harness = Harness::new(
        SITE_ROLLOUT,
        Arc::new(MockFetcher::failing()),
        SchedulingStrategy::Parallel,
    );

    let report = harness.run(SITE_PARAMS).await;

    assert_eq!(report.status, RunStatus::Failed);
    assert!(report.failed());

    assert_eq!(report.task("cleanup").unwrap().status, "succeeded");

    let clone = report.task("clone").unwrap();
    assert_eq!(clone.status, "failed");
    assert_eq!(clone.error_kind.as_deref(), Some("fetch"));
    assert!(clone.error.as_deref().unwrap().contains("unreachable"));

    let rollout = report.task("rollout").unwrap();
    assert_eq!(rollout.status, "skipped");
    assert_eq!(
        rollout.skip_reason.as_deref(),
        Some("dependency 'clone' failed")
    );

    // Skips propagate transitively down the chain.
    let attach = report.task("attach-config").unwrap();
    assert_eq!(attach.status, "skipped");
    assert_eq!(
        attach.skip_reason.as_deref(),
        Some("dependency 'rollout' was skipped")
    );
}

#[tokio::test]
async fn test_failure_touches_no_resources() {
    let harness = Harness::new(
        SITE_ROLLOUT,
        Arc::new(MockFetcher::failing()),
        SchedulingStrategy::Parallel,
    );

    harness.run(SITE_PARAMS).await;

    // Deploy and configure were skipped, so nothing reached the store.
    assert!(harness.store.is_empty().await);
}

#[tokio::test]
async fn test_missing_config_file_fails_configure_only() {
    // The clone populates the workspace but not the file configure needs.
    let fetcher = Arc::new(MockFetcher::with_files(vec![(
        "README.md".to_string(),
        "demo".to_string(),
    )]));
    let harness = Harness::new(SITE_ROLLOUT, fetcher, SchedulingStrategy::Parallel);

    let report = harness.run(SITE_PARAMS).await;

    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.task("rollout").unwrap().status, "succeeded");

    let attach = report.task("attach-config").unwrap();
    assert_eq!(attach.status, "failed");
    assert_eq!(attach.error_kind.as_deref(), Some("workspace"));

    // The deployment itself still rolled out.
    assert_eq!(harness.store.len().await, 3);
}

const SLOW_CLONE: &str = r#"
name: slow-clone
params:
  - name: repo-url
  - name: image
workspaces:
  - name: shared
tasks:
  - name: fetch-source
    params:
      - name: url
    workspaces: [source]
    steps:
      - name: clone
        action: git-clone
        timeout_secs: 1
        params:
          url: "{{ url }}"
  - name: deploy
    params:
      - name: name
      - name: image
    steps:
      - name: apply
        action: apply-deployment
        params:
          name: "{{ name }}"
          image: "{{ image }}"
pipeline:
  - name: clone
    task: fetch-source
    params:
      url: "{{ repo-url }}"
    workspaces:
      source: shared
  - name: rollout
    task: deploy
    run_after: [clone]
    params:
      name: site
      image: "{{ image }}"
"#;

#[tokio::test]
async fn test_hung_step_times_out_and_fails_task() {
    // The fetcher never returns; the step's one-second timeout must turn
    // the hang into a failure instead of stalling the run.
    let fetcher = Arc::new(MockFetcher::with_delay(Duration::from_secs(3600)));
    let harness = Harness::new(SLOW_CLONE, fetcher, SchedulingStrategy::Parallel);

    let report = harness.run(SITE_PARAMS).await;

    assert_eq!(report.status, RunStatus::Failed);

    let clone = report.task("clone").unwrap();
    assert_eq!(clone.status, "failed");
    assert_eq!(clone.error_kind.as_deref(), Some("timeout"));

    let rollout = report.task("rollout").unwrap();
    assert_eq!(rollout.status, "skipped");
    assert_eq!(
        rollout.skip_reason.as_deref(),
        Some("dependency 'clone' failed")
    );

    assert!(harness.store.is_empty().await);
}
