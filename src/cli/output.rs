//! CLI output formatting

use crate::core::state::{RunReport, RunStatus, TaskReport};
use crate::execution::ExecutionEvent;
use crate::persistence::RunSummary;
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar over the pipeline's tasks
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a run status for display
pub fn format_status(status: RunStatus) -> String {
    match status {
        RunStatus::Pending => style("PENDING").dim().to_string(),
        RunStatus::Running => style("RUNNING").yellow().to_string(),
        RunStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        RunStatus::Failed => style("FAILED").red().to_string(),
        RunStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

/// Format a run summary line
pub fn format_run_summary(summary: &RunSummary) -> String {
    let status_icon = match summary.status {
        RunStatus::Succeeded => CHECK,
        RunStatus::Failed => CROSS,
        RunStatus::Running => SPINNER,
        _ => INFO,
    };

    format!(
        "{} {} - {} - {} ({} ok, {} failed, {} skipped)",
        status_icon,
        style(&summary.run_id.to_string()[..8]).dim(),
        style(&summary.pipeline_name).bold(),
        format_status(summary.status),
        style(summary.succeeded_tasks).green(),
        style(summary.failed_tasks).red(),
        style(summary.skipped_tasks).dim(),
    )
}

/// Format one task line of the final report
pub fn format_task_report(task: &TaskReport) -> String {
    match task.status.as_str() {
        "succeeded" => format!("{} {}", CHECK, style(&task.name).green()),
        "failed" => format!(
            "{} {}: {}",
            CROSS,
            style(&task.name).red(),
            style(task.error.as_deref().unwrap_or("unknown error")).dim()
        ),
        "skipped" => format!(
            "{} {} ({})",
            WARN,
            style(&task.name).dim(),
            style(task.skip_reason.as_deref().unwrap_or("skipped")).dim()
        ),
        other => format!("{} {} ({})", INFO, style(&task.name).dim(), other),
    }
}

/// Print the final run report
pub fn print_report(report: &RunReport) {
    println!();
    for task in &report.tasks {
        println!("  {}", format_task_report(task));
    }
    println!();
    let verdict = match report.status {
        RunStatus::Succeeded if report.degraded => format!(
            "{} Run {} {}",
            WARN,
            style(&report.run_id.to_string()[..8]).dim(),
            style("succeeded (degraded)").yellow()
        ),
        RunStatus::Succeeded => format!(
            "{} Run {} {}",
            CHECK,
            style(&report.run_id.to_string()[..8]).dim(),
            style("succeeded").green()
        ),
        RunStatus::Cancelled => format!(
            "{} Run {} {}",
            WARN,
            style(&report.run_id.to_string()[..8]).dim(),
            style("cancelled").yellow()
        ),
        _ => format!(
            "{} Run {} {}",
            CROSS,
            style(&report.run_id.to_string()[..8]).dim(),
            style("failed").red()
        ),
    };
    println!("{}", verdict);
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::RunStarted {
            run_id,
            pipeline_name,
        } => format!(
            "{} Starting pipeline {} ({})",
            ROCKET,
            style(pipeline_name).bold(),
            style(&run_id.to_string()[..8]).dim()
        ),
        ExecutionEvent::TaskStarted { task } => {
            format!("{} {}", SPINNER, style(task).cyan())
        }
        ExecutionEvent::StepStarted { task, step } => format!(
            "{} {} / {}",
            SPINNER,
            style(task).dim(),
            style(step).cyan()
        ),
        ExecutionEvent::StepCompleted {
            task,
            step,
            degraded,
        } => {
            if *degraded {
                format!(
                    "{} {} / {} ({})",
                    WARN,
                    style(task).dim(),
                    style(step).yellow(),
                    style("degraded").dim()
                )
            } else {
                format!("{} {} / {}", CHECK, style(task).dim(), style(step).green())
            }
        }
        ExecutionEvent::TaskSucceeded { task, degraded } => {
            if *degraded {
                format!("{} {} ({})", WARN, style(task).yellow(), style("degraded").dim())
            } else {
                format!("{} {}", CHECK, style(task).green())
            }
        }
        ExecutionEvent::TaskFailed { task, step, error } => format!(
            "{} {} at {}: {}",
            CROSS,
            style(task).red(),
            style(step).dim(),
            style(error).dim()
        ),
        ExecutionEvent::TaskSkipped { task, reason } => format!(
            "{} {} ({})",
            WARN,
            style(task).dim(),
            style(reason).dim()
        ),
        ExecutionEvent::RunCancelled { run_id } => format!(
            "{} Run {} cancelled",
            WARN,
            style(&run_id.to_string()[..8]).dim()
        ),
        ExecutionEvent::RunCompleted { run_id, status } => format!(
            "{} Run ({}) {}",
            INFO,
            style(&run_id.to_string()[..8]).dim(),
            format_status(*status)
        ),
    }
}

/// Format a duration for display
pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(42)), "42s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(3700)), "1h 1m 40s");
    }

    #[test]
    fn test_format_task_report_failed_shows_error() {
        let task = TaskReport {
            name: "rollout".to_string(),
            status: "failed".to_string(),
            error_kind: Some("resource".to_string()),
            error: Some("backend unreachable".to_string()),
            skip_reason: None,
        };
        let line = format_task_report(&task);
        assert!(line.contains("rollout"));
        assert!(line.contains("backend unreachable"));
    }
}
