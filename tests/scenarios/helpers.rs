//! Test utility functions for rollout scenarios

use async_trait::async_trait;
use rollout::core::config::PipelineConfig;
use rollout::core::context::RunContext;
use rollout::core::pipeline::Pipeline;
use rollout::core::run::Run;
use rollout::core::state::RunReport;
use rollout::execution::{CancellationHandle, ExecutionEngine, ExecutionEvent, SchedulingStrategy};
use rollout::remote::{FetchError, InMemoryResourceStore, Revision, SourceFetcher};
use rollout::workspace::{InMemoryWorkspace, Workspace};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// Fetcher that writes a fixed tree into the workspace instead of cloning
pub struct MockFetcher {
    files: Vec<(String, String)>,
    fail: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            files: vec![("config/site.yaml".to_string(), "replicas: 2".to_string())],
            fail: false,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    pub fn with_files(files: Vec<(String, String)>) -> Self {
        Self {
            files,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceFetcher for MockFetcher {
    async fn fetch(
        &self,
        url: &str,
        reference: &str,
        workspace: &dyn Workspace,
    ) -> Result<Revision, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail {
            return Err(FetchError::Failed {
                url: url.to_string(),
                reason: "repository unreachable".to_string(),
            });
        }

        for (path, content) in &self.files {
            workspace
                .write(path, content.as_bytes())
                .await
                .map_err(|e| FetchError::Internal(e.to_string()))?;
        }

        Ok(Revision(format!("rev-{}", reference)))
    }
}

/// Everything a scenario needs to drive and observe one pipeline run
pub struct Harness {
    pub pipeline: Pipeline,
    pub store: Arc<InMemoryResourceStore>,
    pub workspaces: HashMap<String, Arc<InMemoryWorkspace>>,
    pub events: Arc<Mutex<Vec<String>>>,
    engine: ExecutionEngine,
    ctx: RunContext,
}

impl Harness {
    pub fn new(yaml: &str, fetcher: Arc<dyn SourceFetcher>, strategy: SchedulingStrategy) -> Self {
        let pipeline = PipelineConfig::from_yaml(yaml)
            .expect("scenario pipeline should be valid")
            .to_pipeline();

        let store = Arc::new(InMemoryResourceStore::new());
        let mut ctx = RunContext::new(Uuid::new_v4(), fetcher, store.clone());

        let mut workspaces = HashMap::new();
        for name in &pipeline.workspaces {
            let workspace = Arc::new(InMemoryWorkspace::new(name.clone()));
            workspaces.insert(name.clone(), workspace.clone());
            ctx.add_workspace(name.clone(), workspace);
        }

        let engine = ExecutionEngine::new(strategy);
        let events = Arc::new(Mutex::new(Vec::new()));
        let recorded = events.clone();
        engine.add_event_handler(move |event| {
            let line = match event {
                ExecutionEvent::TaskStarted { task } => format!("started:{}", task),
                ExecutionEvent::TaskSucceeded { task, .. } => format!("succeeded:{}", task),
                ExecutionEvent::TaskFailed { task, .. } => format!("failed:{}", task),
                ExecutionEvent::TaskSkipped { task, .. } => format!("skipped:{}", task),
                _ => return,
            };
            recorded.lock().unwrap().push(line);
        });

        Self {
            pipeline,
            store,
            workspaces,
            events,
            engine,
            ctx,
        }
    }

    pub fn cancellation_handle(&self) -> CancellationHandle {
        self.engine.cancellation_handle()
    }

    /// Execute one run with the given parameter bindings.
    pub async fn run(&self, params: &[(&str, &str)]) -> RunReport {
        let bindings: HashMap<String, String> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut run = Run::new(&self.pipeline, &bindings).expect("run parameters should resolve");

        self.engine
            .execute(&self.pipeline, &mut run, &self.ctx)
            .await
            .expect("engine should drive the run to a terminal state")
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

/// Assert the recorded task lifecycle matches exactly
pub fn assert_events(harness: &Harness, expected: &[&str]) {
    assert_eq!(
        harness.events(),
        expected.iter().map(|s| s.to_string()).collect::<Vec<_>>()
    );
}

/// The deploy chain most scenarios exercise: clean, clone, deploy, configure
pub const SITE_ROLLOUT: &str = r#"
name: site-rollout
params:
  - name: repo-url
  - name: image
  - name: deployment-name
    default: site
workspaces:
  - name: shared
tasks:
  - name: clean
    workspaces: [target]
    steps:
      - name: clean
        action: clean-workspace
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
      - name: image
    steps:
      - name: apply
        action: apply-deployment
        params:
          name: "{{ name }}"
          image: "{{ image }}"
  - name: configure
    params:
      - name: deployment
    workspaces: [source]
    steps:
      - name: apply-config
        action: apply-config
        params:
          name: site-config
          file: config/site.yaml
          deployment: "{{ deployment }}"
pipeline:
  - name: cleanup
    task: clean
    workspaces:
      target: shared
  - name: clone
    task: fetch-source
    run_after: [cleanup]
    params:
      url: "{{ repo-url }}"
    workspaces:
      source: shared
  - name: rollout
    task: deploy
    run_after: [clone]
    params:
      name: "{{ deployment-name }}"
      image: "{{ image }}"
  - name: attach-config
    task: configure
    run_after: [rollout]
    params:
      deployment: "{{ deployment-name }}"
    workspaces:
      source: shared
"#;

pub const SITE_PARAMS: &[(&str, &str)] = &[
    ("repo-url", "https://example.com/site.git"),
    ("image", "site:v1"),
];
