//! Status command - queries the server's health endpoint.

use std::time::Duration;

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use serde::{Deserialize, Serialize};

use super::Context;

/// Arguments for the status command.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Seconds to wait for the server to answer
    #[arg(long, default_value_t = 5)]
    pub timeout: u64,
}

/// Health check response from the server.
#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    version: String,
    #[serde(default)]
    active_workflows: usize,
}

/// Status response for JSON output.
#[derive(Debug, Serialize)]
struct StatusOutput {
    running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    health: Option<String>,
    version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    active_workflows: Option<usize>,
    server_url: String,
}

async fn fetch_health(server_url: &str, timeout: Duration) -> Result<HealthResponse> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let url = format!("{}/health", server_url.trim_end_matches('/'));
    let health = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(health)
}

/// Run the status command.
pub async fn run(args: StatusArgs, ctx: &Context) -> Result<()> {
    let result = fetch_health(&ctx.server_url, Duration::from_secs(args.timeout)).await;

    if ctx.json_output {
        let output = StatusOutput {
            running: result.is_ok(),
            health: result.as_ref().ok().map(|h| h.status.clone()),
            version: result.as_ref().ok().map(|h| h.version.clone()),
            active_workflows: result.as_ref().ok().map(|h| h.active_workflows),
            server_url: ctx.server_url.clone(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!();
    println!("{}", style("Recast Server Status").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    println!();

    match result {
        Ok(health) => {
            let badge = if health.status == "ok" {
                Style::new().green().apply_to("● running")
            } else {
                Style::new().yellow().apply_to("● running (store degraded)")
            };
            println!("  {} {}", dim.apply_to("Status:"), badge);
            println!("  {} {}", dim.apply_to("Version:"), health.version);
            println!("  {} {}", dim.apply_to("Active runs:"), health.active_workflows);
            println!("  {} {}", dim.apply_to("Server:"), ctx.server_url);
        }
        Err(e) => {
            println!(
                "  {} {}",
                dim.apply_to("Status:"),
                Style::new().red().apply_to("● not running")
            );
            println!("  {} {}", dim.apply_to("Server:"), ctx.server_url);
            if ctx.verbose {
                println!();
                println!("  {} {}", dim.apply_to("Error:"), e);
            }
            println!();
            println!("  {}", dim.apply_to("Start the server with: recast start"));
        }
    }
    println!();

    Ok(())
}
