//! Run command - executes one pipeline in-process and prints the result.

use anyhow::{Result, bail};
use clap::Args;
use console::{Style, style};

use recast_workflow::{RunRequest, StepRecord, StepStatus, WorkflowView};

use super::Context;
use crate::app::App;

/// Arguments for the run command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Account to fetch from (defaults to `[workflow].default_target`)
    #[arg(short, long)]
    pub target: Option<String>,

    /// Number of recent posts to fetch (1-100)
    #[arg(short, long)]
    pub count: Option<usize>,

    /// Only publish posts of this category code (1-6)
    #[arg(long)]
    pub category: Option<u8>,

    /// Per-step timeout in seconds (10-300)
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl From<RunArgs> for RunRequest {
    fn from(args: RunArgs) -> Self {
        RunRequest {
            target: args.target,
            count: args.count,
            category: args.category,
            step_timeout_secs: args.timeout,
            ..RunRequest::default()
        }
    }
}

/// Run the run command. Fails (exit code 1) when the pipeline fails.
pub async fn run(args: RunArgs, ctx: &Context) -> Result<()> {
    let app = App::build(&ctx.config.config)?;
    let request = RunRequest::from(args);

    let record = app.orchestrator.run_to_completion(&request).await?;
    let view = WorkflowView::from(record);

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_view(&view, ctx.verbose);
    }

    if view.record.status != StepStatus::Completed {
        bail!("workflow {} {}", view.record.id, view.record.status);
    }
    Ok(())
}

fn status_style(status: StepStatus) -> Style {
    match status {
        StepStatus::Completed => Style::new().green(),
        StepStatus::Failed | StepStatus::Timeout => Style::new().red(),
        StepStatus::Running => Style::new().yellow(),
        _ => Style::new().dim(),
    }
}

fn print_view(view: &WorkflowView, verbose: bool) {
    let dim = Style::new().dim();
    let record = &view.record;

    println!();
    println!("{}", style("Recast Workflow").bold());
    println!("{}", dim.apply_to("─".repeat(56)));
    println!("  {} {}", dim.apply_to("ID:"), record.id);
    println!(
        "  {} {}",
        dim.apply_to("Status:"),
        status_style(record.status).apply_to(record.status)
    );
    if let Some(target) = record.summary.get("target").and_then(|v| v.as_str()) {
        println!("  {} {}", dim.apply_to("Target:"), target);
    }
    if let Some(total) = record.total_duration {
        println!("  {} {:.2}s", dim.apply_to("Duration:"), total);
    }
    println!();
    println!(
        "  {:<10} {:<10} {:>9}  {}",
        dim.apply_to("STEP"),
        dim.apply_to("STATUS"),
        dim.apply_to("DURATION"),
        dim.apply_to("DETAIL")
    );
    for step in &record.steps {
        print_step(step, verbose);
    }
    println!();
}

fn print_step(step: &StepRecord, verbose: bool) {
    let duration = step
        .duration
        .map(|d| format!("{d:.2}s"))
        .unwrap_or_else(|| "-".to_string());
    let detail = match (&step.error, &step.result) {
        (Some(error), _) => error.clone(),
        (None, Some(result)) if verbose => result.to_string(),
        (None, Some(result)) => brief(result),
        (None, None) => String::new(),
    };

    println!(
        "  {:<10} {:<10} {:>9}  {}",
        step.name.to_string(),
        status_style(step.status).apply_to(step.status.to_string()),
        duration,
        detail
    );
}

/// The `*_count` fields of a step result, e.g. `saved 2, skipped 1`.
fn brief(result: &serde_json::Value) -> String {
    let Some(fields) = result.as_object() else {
        return result.to_string();
    };
    let counts: Vec<String> = fields
        .iter()
        .filter_map(|(key, value)| {
            let name = key.strip_suffix("_count")?;
            Some(format!("{name} {}", value.as_u64()?))
        })
        .collect();
    if counts.is_empty() {
        fields
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or_default()
            .to_string()
    } else {
        counts.join(", ")
    }
}
