//! Scheduling strategies over a fan-out DAG

use crate::helpers::*;
use rollout::core::state::RunStatus;
use rollout::execution::SchedulingStrategy;
use std::sync::Arc;
use std::time::Duration;

const FAN_OUT: &str = r#"
name: fan-out
params:
  - name: repo-url
workspaces:
  - name: left-ws
  - name: right-ws
tasks:
  - name: fetch-source
    params:
      - name: url
    workspaces: [source]
    steps:
      - name: clone
        action: git-clone
        params:
          url: "{{ url }}"
  - name: deploy
    params:
      - name: name
    steps:
      - name: apply
        action: apply-deployment
        params:
          name: "{{ name }}"
          image: "site:v1"
pipeline:
  - name: clone-left
    task: fetch-source
    params:
      url: "{{ repo-url }}"
    workspaces:
      source: left-ws
  - name: clone-right
    task: fetch-source
    params:
      url: "{{ repo-url }}"
    workspaces:
      source: right-ws
  - name: fan-in
    task: deploy
    run_after: [clone-left, clone-right]
    params:
      name: site
"#;

const FAN_OUT_PARAMS: &[(&str, &str)] = &[("repo-url", "https://example.com/site.git")];

#[tokio::test]
async fn test_parallel_runs_independent_tasks_in_one_batch() {
    let harness = Harness::new(
        FAN_OUT,
        Arc::new(MockFetcher::with_delay(Duration::from_millis(50))),
        SchedulingStrategy::Parallel,
    );

    let report = harness.run(FAN_OUT_PARAMS).await;
    assert_eq!(report.status, RunStatus::Succeeded);

    // Both clones start before either finishes; the fan-in waits for both.
    assert_events(
        &harness,
        &[
            "started:clone-left",
            "started:clone-right",
            "succeeded:clone-left",
            "succeeded:clone-right",
            "started:fan-in",
            "succeeded:fan-in",
        ],
    );
}

#[tokio::test]
async fn test_sequential_runs_one_task_at_a_time() {
    let harness = Harness::new(
        FAN_OUT,
        Arc::new(MockFetcher::new()),
        SchedulingStrategy::Sequential,
    );

    let report = harness.run(FAN_OUT_PARAMS).await;
    assert_eq!(report.status, RunStatus::Succeeded);

    assert_events(
        &harness,
        &[
            "started:clone-left",
            "succeeded:clone-left",
            "started:clone-right",
            "succeeded:clone-right",
            "started:fan-in",
            "succeeded:fan-in",
        ],
    );
}

#[tokio::test]
async fn test_fan_in_skips_when_one_branch_fails() {
    // One shared failing fetcher fails both branches, but the point is the
    // fan-in: it must not run when any dependency failed.
    let harness = Harness::new(
        FAN_OUT,
        Arc::new(MockFetcher::failing()),
        SchedulingStrategy::Parallel,
    );

    let report = harness.run(FAN_OUT_PARAMS).await;
    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.task("fan-in").unwrap().status, "skipped");
}
