//! Pipeline domain model
//!
//! A pipeline owns its task templates and a DAG of pipeline tasks. It is a
//! definition only; per-run state lives in [`crate::core::run::Run`].

use crate::core::param::ParamSpec;
use crate::core::task::Task;
use std::collections::{HashMap, HashSet};

/// An instantiation of a task within a pipeline: concrete parameter
/// bindings, workspace bindings, and explicit ordering edges.
#[derive(Debug, Clone)]
pub struct PipelineTask {
    /// Name of this node in the DAG
    pub name: String,

    /// Which task template it runs
    pub task_ref: String,

    /// Parameter bindings: literals or `{{ pipeline-param }}` references
    pub params: HashMap<String, String>,

    /// Pipeline tasks that must succeed before this one becomes ready
    pub run_after: Vec<String>,

    /// Workspace bindings: task workspace name -> pipeline workspace name
    pub workspaces: HashMap<String, String>,
}

/// A pipeline definition
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Pipeline-level parameter schema
    pub params: Vec<ParamSpec>,

    /// Workspace names provisioned for each run
    pub workspaces: Vec<String>,

    /// Task templates by name
    pub tasks: HashMap<String, Task>,

    /// DAG nodes by name
    pub pipeline_tasks: HashMap<String, PipelineTask>,

    /// Deterministic topological order of the DAG
    execution_order: Vec<String>,
}

impl Pipeline {
    /// Assemble a pipeline from already-validated parts.
    ///
    /// Validation (cycles, unknown references, parameter checks) happens in
    /// `PipelineConfig::validate` before this is called.
    pub fn new(
        name: String,
        params: Vec<ParamSpec>,
        workspaces: Vec<String>,
        tasks: HashMap<String, Task>,
        pipeline_tasks: HashMap<String, PipelineTask>,
    ) -> Self {
        let execution_order = Self::topological_sort(&pipeline_tasks);
        Pipeline {
            name,
            params,
            workspaces,
            tasks,
            pipeline_tasks,
            execution_order,
        }
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn pipeline_task(&self, name: &str) -> Option<&PipelineTask> {
        self.pipeline_tasks.get(name)
    }

    /// Topological order consistent with every run_after edge.
    pub fn execution_order(&self) -> &[String] {
        &self.execution_order
    }

    fn topological_sort(tasks: &HashMap<String, PipelineTask>) -> Vec<String> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();

        // Sort for deterministic order
        let mut names: Vec<_> = tasks.keys().cloned().collect();
        names.sort();

        for name in names {
            Self::visit(&name, tasks, &mut visited, &mut result);
        }

        result
    }

    fn visit(
        name: &str,
        tasks: &HashMap<String, PipelineTask>,
        visited: &mut HashSet<String>,
        result: &mut Vec<String>,
    ) {
        if visited.contains(name) {
            return;
        }
        visited.insert(name.to_string());

        if let Some(task) = tasks.get(name) {
            let mut deps = task.run_after.clone();
            deps.sort();
            for dep in &deps {
                Self::visit(dep, tasks, visited, result);
            }
        }

        result.push(name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::PipelineConfig;

    const CHAIN: &str = r#"
name: "site-rollout"
params:
  - name: repo-url
workspaces:
  - name: shared
tasks:
  - name: clean-workspace
    workspaces: [shared]
    steps:
      - name: clear
        action: clean-workspace
  - name: fetch-source
    params:
      - name: url
    workspaces: [shared]
    steps:
      - name: clone
        action: git-clone
        params:
          url: "{{ url }}"
pipeline:
  - name: cleanup
    task: clean-workspace
    workspaces:
      shared: shared
  - name: clone
    task: fetch-source
    run_after: [cleanup]
    params:
      url: "{{ repo-url }}"
    workspaces:
      shared: shared
"#;

    #[test]
    fn test_topological_order_respects_run_after() {
        let config = PipelineConfig::from_yaml(CHAIN).unwrap();
        let pipeline = config.to_pipeline();

        let order = pipeline.execution_order();
        let cleanup = order.iter().position(|n| n == "cleanup").unwrap();
        let clone = order.iter().position(|n| n == "clone").unwrap();
        assert!(cleanup < clone);
    }

    #[test]
    fn test_lookup_by_name() {
        let config = PipelineConfig::from_yaml(CHAIN).unwrap();
        let pipeline = config.to_pipeline();

        assert!(pipeline.task("fetch-source").is_some());
        assert!(pipeline.pipeline_task("clone").is_some());
        assert_eq!(
            pipeline.pipeline_task("clone").unwrap().task_ref,
            "fetch-source"
        );
    }
}
