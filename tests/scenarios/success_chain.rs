//! The full deploy chain: clean, clone, deploy, configure

use crate::helpers::*;
use rollout::core::state::RunStatus;
use rollout::execution::SchedulingStrategy;
use rollout::remote::{ResourceKind, ResourceStore};
use rollout::workspace::Workspace;
use std::sync::Arc;

#[tokio::test]
async fn test_chain_succeeds_in_order() {
    let harness = Harness::new(
        SITE_ROLLOUT,
        Arc::new(MockFetcher::new()),
        SchedulingStrategy::Parallel,
    );

    let report = harness.run(SITE_PARAMS).await;

    assert_eq!(report.status, RunStatus::Succeeded);
    assert!(!report.failed());
    assert!(!report.degraded);
    assert_events(
        &harness,
        &[
            "started:cleanup",
            "succeeded:cleanup",
            "started:clone",
            "succeeded:clone",
            "started:rollout",
            "succeeded:rollout",
            "started:attach-config",
            "succeeded:attach-config",
        ],
    );
}

#[tokio::test]
async fn test_chain_materializes_all_objects() {
    let harness = Harness::new(
        SITE_ROLLOUT,
        Arc::new(MockFetcher::new()),
        SchedulingStrategy::Parallel,
    );

    harness.run(SITE_PARAMS).await;

    // Deployment, service, route, and the attached config-map.
    assert_eq!(harness.store.len().await, 4);

    let deployment = harness
        .store
        .get(ResourceKind::Deployment, "site")
        .await
        .unwrap();
    assert_eq!(deployment.spec["image"], "site:v1");
    assert_eq!(deployment.spec["configRef"], "site-config");

    let config = harness
        .store
        .get(ResourceKind::ConfigMap, "site-config")
        .await
        .unwrap();
    assert_eq!(config.spec["site.yaml"], "replicas: 2");
}

#[tokio::test]
async fn test_workspace_content_flows_between_tasks() {
    // The clone task writes into the shared workspace; the configure task
    // later reads the same file through its own binding.
    let fetcher = Arc::new(MockFetcher::with_files(vec![(
        "config/site.yaml".to_string(),
        "replicas: 8".to_string(),
    )]));
    let harness = Harness::new(SITE_ROLLOUT, fetcher, SchedulingStrategy::Parallel);

    let report = harness.run(SITE_PARAMS).await;
    assert_eq!(report.status, RunStatus::Succeeded);

    let config = harness
        .store
        .get(ResourceKind::ConfigMap, "site-config")
        .await
        .unwrap();
    assert_eq!(config.spec["site.yaml"], "replicas: 8");
}

#[tokio::test]
async fn test_cleanup_removes_stale_workspace_content() {
    let harness = Harness::new(
        SITE_ROLLOUT,
        Arc::new(MockFetcher::new()),
        SchedulingStrategy::Parallel,
    );

    // Leftovers from an earlier run must not survive the cleanup task.
    let shared = harness.workspaces.get("shared").unwrap();
    shared.write("stale/old.yaml", b"replicas: 1").await.unwrap();

    let report = harness.run(SITE_PARAMS).await;
    assert_eq!(report.status, RunStatus::Succeeded);

    let files = shared.list().await.unwrap();
    assert_eq!(files, vec!["config/site.yaml".to_string()]);
}

#[tokio::test]
async fn test_default_parameters_apply() {
    // deployment-name has a default; binding only the required parameters
    // must still name the objects "site".
    let harness = Harness::new(
        SITE_ROLLOUT,
        Arc::new(MockFetcher::new()),
        SchedulingStrategy::Parallel,
    );

    harness.run(SITE_PARAMS).await;

    assert!(harness
        .store
        .get(ResourceKind::Service, "site")
        .await
        .is_ok());
}
