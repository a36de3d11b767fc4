//! Bad definitions are rejected before anything runs

use rollout::core::config::PipelineConfig;
use rollout::core::error::{ConfigError, DefinitionError};
use rollout::core::run::Run;
use std::collections::HashMap;

fn definition_error(yaml: &str) -> DefinitionError {
    match PipelineConfig::from_yaml(yaml) {
        Err(ConfigError::Definition(e)) => e,
        Err(other) => panic!("expected a definition error, got: {}", other),
        Ok(_) => panic!("expected the definition to be rejected"),
    }
}

#[tokio::test]
async fn test_unknown_task_reference_is_rejected() {
    let err = definition_error(
        r#"
name: broken
tasks:
  - name: clean
    workspaces: [target]
    steps:
      - name: clean
        action: clean-workspace
workspaces:
  - name: shared
pipeline:
  - name: cleanup
    task: no-such-task
"#,
    );
    assert!(matches!(err, DefinitionError::UnknownTask { .. }));
}

#[tokio::test]
async fn test_cycle_is_rejected() {
    let err = definition_error(
        r#"
name: broken
tasks:
  - name: clean
    workspaces: [target]
    steps:
      - name: clean
        action: clean-workspace
workspaces:
  - name: shared
pipeline:
  - name: a
    task: clean
    run_after: [b]
    workspaces:
      target: shared
  - name: b
    task: clean
    run_after: [a]
    workspaces:
      target: shared
"#,
    );
    assert!(matches!(err, DefinitionError::Cycle(_)));
}

#[tokio::test]
async fn test_step_missing_required_action_param_is_rejected() {
    // git-clone without a url binding can never execute.
    let err = definition_error(
        r#"
name: broken
tasks:
  - name: fetch-source
    workspaces: [source]
    steps:
      - name: clone
        action: git-clone
workspaces:
  - name: shared
pipeline:
  - name: clone
    task: fetch-source
    workspaces:
      source: shared
"#,
    );
    assert!(matches!(err, DefinitionError::MissingStepParameter { .. }));
}

#[tokio::test]
async fn test_unbound_workspace_is_rejected() {
    let err = definition_error(
        r#"
name: broken
tasks:
  - name: clean
    workspaces: [target]
    steps:
      - name: clean
        action: clean-workspace
workspaces:
  - name: shared
pipeline:
  - name: cleanup
    task: clean
"#,
    );
    assert!(matches!(err, DefinitionError::UnboundWorkspace { .. }));
}

#[tokio::test]
async fn test_missing_required_pipeline_param_fails_at_trigger() {
    let pipeline = PipelineConfig::from_yaml(
        r#"
name: needs-image
params:
  - name: image
tasks:
  - name: deploy
    params:
      - name: image
    steps:
      - name: apply
        action: apply-deployment
        params:
          name: site
          image: "{{ image }}"
pipeline:
  - name: rollout
    task: deploy
    params:
      image: "{{ image }}"
"#,
    )
    .unwrap()
    .to_pipeline();

    let err = Run::new(&pipeline, &HashMap::new()).unwrap_err();
    assert!(matches!(err, DefinitionError::UnboundParameter { .. }));
}
