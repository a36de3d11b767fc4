//! Re-running a pipeline converges instead of erroring

use crate::helpers::*;
use rollout::core::state::RunStatus;
use rollout::execution::SchedulingStrategy;
use rollout::remote::{ResourceKind, ResourceStore};
use std::sync::Arc;

#[tokio::test]
async fn test_second_run_converges() {
    let harness = Harness::new(
        SITE_ROLLOUT,
        Arc::new(MockFetcher::new()),
        SchedulingStrategy::Parallel,
    );

    let first = harness.run(SITE_PARAMS).await;
    assert_eq!(first.status, RunStatus::Succeeded);
    assert_eq!(harness.store.len().await, 4);

    let second = harness.run(SITE_PARAMS).await;
    assert_eq!(second.status, RunStatus::Succeeded);

    // No duplicate objects, no conflicts.
    assert_eq!(harness.store.len().await, 4);
}

#[tokio::test]
async fn test_new_image_updates_existing_deployment() {
    let harness = Harness::new(
        SITE_ROLLOUT,
        Arc::new(MockFetcher::new()),
        SchedulingStrategy::Parallel,
    );

    harness.run(SITE_PARAMS).await;

    let report = harness
        .run(&[
            ("repo-url", "https://example.com/site.git"),
            ("image", "site:v2"),
        ])
        .await;
    assert_eq!(report.status, RunStatus::Succeeded);

    let deployment = harness
        .store
        .get(ResourceKind::Deployment, "site")
        .await
        .unwrap();
    assert_eq!(deployment.spec["image"], "site:v2");
    assert_eq!(harness.store.len().await, 4);
}

#[tokio::test]
async fn test_degraded_when_deployment_missing() {
    // A pipeline that configures without deploying first: the config-map
    // lands, the attach is skipped, and the run succeeds degraded.
    const CONFIGURE_ONLY: &str = r#"
name: configure-only
params:
  - name: repo-url
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
        params:
          url: "{{ url }}"
  - name: configure
    workspaces: [source]
    steps:
      - name: apply-config
        action: apply-config
        params:
          name: site-config
          file: config/site.yaml
          deployment: site
pipeline:
  - name: clone
    task: fetch-source
    params:
      url: "{{ repo-url }}"
    workspaces:
      source: shared
  - name: attach-config
    task: configure
    run_after: [clone]
    workspaces:
      source: shared
"#;

    let harness = Harness::new(
        CONFIGURE_ONLY,
        Arc::new(MockFetcher::new()),
        SchedulingStrategy::Parallel,
    );

    let report = harness
        .run(&[("repo-url", "https://example.com/site.git")])
        .await;

    assert_eq!(report.status, RunStatus::Succeeded);
    assert!(report.degraded);
    assert!(harness
        .store
        .get(ResourceKind::ConfigMap, "site-config")
        .await
        .is_ok());
}
