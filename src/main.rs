use anyhow::{Context, Result};
use rollout::cli::commands::{HistoryCommand, ListCommand, RunCommand, ValidateCommand};
use rollout::cli::output::*;
use rollout::cli::{Cli, Command};
use rollout::core::config::PipelineConfig;
use rollout::core::context::RunContext;
use rollout::core::run::Run;
use rollout::execution::{ExecutionEngine, ExecutionEvent};
use rollout::persistence::{InMemoryHistory, RunHistory, RunSummary, SqliteRunStore};
use rollout::remote::{GitCliFetcher, InMemoryResourceStore, KubectlStore, ResourceStore};
use rollout::workspace::DirWorkspace;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::List(cmd) => list_pipelines(cmd).await?,
        Command::History(cmd) => show_history(cmd).await?,
    }

    Ok(())
}

async fn run_pipeline(cmd: &RunCommand) -> Result<()> {
    let config =
        PipelineConfig::from_file(&cmd.file).context("Failed to load pipeline definition")?;

    println!("{} Loaded pipeline: {}", INFO, style(&config.name).bold());

    let pipeline = config.to_pipeline();

    let params: HashMap<String, String> = cmd.param.iter().cloned().collect();
    for (key, value) in &cmd.param {
        println!(
            "{} Parameter: {} = {}",
            INFO,
            style(key).cyan(),
            style(value).dim()
        );
    }

    let mut run = Run::new(&pipeline, &params).context("Failed to create run")?;

    // Set up history; --no-history keeps the record in memory for this
    // invocation only.
    let history: Arc<dyn RunHistory> = if cmd.no_history {
        Arc::new(InMemoryHistory::new())
    } else {
        Arc::new(SqliteRunStore::with_default_path().await?)
    };

    // Collaborators: git for source, kubectl (or an in-memory store for
    // --dry-run) for the deployment target.
    let fetcher = Arc::new(GitCliFetcher::new(cmd.git_path.clone(), 300));
    let store: Arc<dyn ResourceStore> = if cmd.dry_run {
        println!("{} Dry run: resource changes stay in memory", INFO);
        Arc::new(InMemoryResourceStore::new())
    } else {
        Arc::new(KubectlStore::new(
            cmd.kubectl_path.clone(),
            cmd.namespace.clone(),
            60,
        ))
    };

    let mut ctx = RunContext::new(run.id(), fetcher, store);
    let workspace_root = cmd
        .workspace_root
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            std::env::temp_dir()
                .join("rollout")
                .join(run.id().to_string())
        });
    for name in &pipeline.workspaces {
        ctx.add_workspace(
            name.clone(),
            Arc::new(DirWorkspace::new(name.clone(), workspace_root.join(name))),
        );
    }

    let engine = ExecutionEngine::new(cmd.strategy.into());

    // Console output: one line per event, progress over pipeline tasks.
    let progress = create_progress_bar(pipeline.pipeline_tasks.len());
    let bar = progress.clone();
    engine.add_event_handler(move |event| {
        bar.println(format_execution_event(&event));
        if matches!(
            event,
            ExecutionEvent::TaskSucceeded { .. }
                | ExecutionEvent::TaskFailed { .. }
                | ExecutionEvent::TaskSkipped { .. }
        ) {
            bar.inc(1);
        }
    });

    // Ctrl-C cancels: nothing new is scheduled, in-flight tasks finish.
    let cancel = engine.cancellation_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    println!();
    let report = engine
        .execute(&pipeline, &mut run, &ctx)
        .await
        .context("Run aborted")?;
    progress.finish_and_clear();

    if cmd.keep_workspace {
        println!(
            "{} Workspaces kept at {}",
            INFO,
            style(workspace_root.display()).dim()
        );
    } else {
        for (name, workspace) in ctx.workspaces() {
            if let Err(e) = workspace.release().await {
                warn!("Failed to release workspace '{}': {}", name, e);
            }
        }
    }

    let summary = RunSummary::from_report(&report);
    history.save_run(&summary).await?;
    if !cmd.no_history {
        println!(
            "{} Run saved to history (ID: {})",
            INFO,
            style(&summary.run_id.to_string()[..8]).dim()
        );
    }

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.failed() {
        std::process::exit(1);
    }

    Ok(())
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    match PipelineConfig::from_file(&cmd.file) {
        Ok(config) => {
            println!("{} Pipeline definition is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            println!("  Tasks: {}", style(config.tasks.len()).cyan());
            println!("  Pipeline tasks: {}", style(config.pipeline.len()).cyan());
            println!("  Workspaces: {}", style(config.workspaces.len()).cyan());
            println!("  Parameters: {}", style(config.params.len()).cyan());

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(e).red());
            std::process::exit(1);
        }
    }
}

async fn list_pipelines(cmd: &ListCommand) -> Result<()> {
    let store = SqliteRunStore::with_default_path().await?;
    let pipelines = store.list_pipelines().await?;

    if pipelines.is_empty() {
        println!("{} No pipelines found in history", INFO);
        return Ok(());
    }

    println!("{} Pipelines in history:", INFO);

    for pipeline_name in &pipelines {
        let runs = store.list_runs(pipeline_name).await?;

        if cmd.with_counts {
            let succeeded = runs
                .iter()
                .filter(|r| r.status == rollout::RunStatus::Succeeded)
                .count();
            let failed = runs
                .iter()
                .filter(|r| r.status == rollout::RunStatus::Failed)
                .count();
            println!(
                "  {} ({} runs: {} succeeded, {} failed)",
                style(pipeline_name).bold(),
                style(runs.len()).cyan(),
                style(succeeded).green(),
                style(failed).red()
            );
        } else {
            println!("  {}", style(pipeline_name).bold());
        }
    }

    if cmd.json {
        let mut json_data = Vec::new();
        for pipeline in &pipelines {
            let runs = store.list_runs(pipeline).await.ok();
            json_data.push(serde_json::json!({
                "name": pipeline,
                "run_count": runs.as_ref().map(|r| r.len()).unwrap_or(0)
            }));
        }
        let data = serde_json::json!({ "pipelines": json_data });
        println!("\n{}", serde_json::to_string_pretty(&data)?);
    }

    Ok(())
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = SqliteRunStore::with_default_path().await?;

    if let Some(run_id_str) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id_str).context("Invalid run ID format")?;
        match store.load_run(run_id).await? {
            Some(summary) => print_run_details(&summary, cmd.verbose)?,
            None => println!("{} Run not found", WARN),
        }
        return Ok(());
    }

    let runs = if let Some(pipeline_name) = &cmd.pipeline {
        store.list_runs(pipeline_name).await?
    } else {
        let pipelines = store.list_pipelines().await?;
        let mut all_runs = Vec::new();
        for pipeline in &pipelines {
            all_runs.extend(store.list_runs(pipeline).await?);
        }
        all_runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        all_runs.into_iter().take(cmd.limit).collect()
    };

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(());
    }

    println!("{} Run history (showing latest {}):", INFO, cmd.limit);

    if cmd.json {
        let data = serde_json::json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        for summary in runs.iter().take(cmd.limit) {
            println!("  {}", format_run_summary(summary));
        }
    }

    Ok(())
}

fn print_run_details(summary: &RunSummary, verbose: bool) -> Result<()> {
    println!("{} Run Details", INFO);
    println!("  ID: {}", style(summary.run_id).cyan());
    println!("  Pipeline: {}", style(&summary.pipeline_name).bold());
    println!("  Status: {}", format_status(summary.status));
    if summary.degraded {
        println!("  Degraded: {}", style("yes").yellow());
    }
    println!(
        "  Started: {}",
        style(summary.started_at.to_rfc3339()).dim()
    );
    if let Some(completed) = summary.completed_at {
        println!("  Completed: {}", style(completed.to_rfc3339()).dim());
        if let Ok(duration) = completed.signed_duration_since(summary.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    println!(
        "  Tasks: {} ok, {} failed, {} skipped ({} total)",
        style(summary.succeeded_tasks).green(),
        style(summary.failed_tasks).red(),
        style(summary.skipped_tasks).dim(),
        summary.total_tasks
    );

    if verbose {
        println!("\n  {}", style("Full details:").bold());
        let json = serde_json::to_string_pretty(summary)?;
        for line in json.lines() {
            println!("    {}", line);
        }
    }

    Ok(())
}
