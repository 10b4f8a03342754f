//! Recast - fetch, classify, rewrite, and republish social posts.
//!
//! Main entry point for the Recast CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::prelude::*;

mod app;
mod commands;

use commands::{run, start, status};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Recast - fetch, classify, rewrite, and republish social posts
#[derive(Parser)]
#[command(name = "recast")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Server URL (default: http://<bind>:<port> from config)
    #[arg(long, global = true, env = "RECAST_SERVER_URL")]
    pub server: Option<String>,

    /// Path to an extra config file, layered over discovered ones
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the Recast server
    Start(start::StartArgs),

    /// Run the pipeline once and print the result
    Run(run::RunArgs),

    /// Check whether the server is up
    Status(status::StatusArgs),
}

const CONSOLE_FILTER: &str = "recast=info,recast_workflow=info,recast_server=info,recast_social=info,recast_llm=info,recast_store=info,recast_config=info,warn";
const CONSOLE_FILTER_VERBOSE: &str = "recast=debug,recast_workflow=debug,recast_server=debug,recast_social=debug,recast_llm=debug,recast_store=debug,recast_config=debug,info";
const FILE_FILTER: &str = "recast=trace,recast_workflow=trace,recast_server=trace,recast_social=trace,recast_llm=trace,recast_store=trace,recast_config=trace,info";

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = recast_config::load_config_with_options(None, None, cli.config.as_deref())?;
    let logging = loaded.config.logging();

    // Console (human-readable) + daily rolling file
    let log_dir = logging.dir.unwrap_or_else(recast_config::default_log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "recast.log");
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);

    let json_file_layer = logging.json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer.clone())
            .with_filter(tracing_subscriber::EnvFilter::new(FILE_FILTER))
    });
    let text_file_layer = (!logging.json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(writer)
            .with_filter(tracing_subscriber::EnvFilter::new(FILE_FILTER))
    });

    let console_filter = if cli.verbose {
        CONSOLE_FILTER_VERBOSE
    } else {
        CONSOLE_FILTER
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(console_filter)),
        )
        .with(json_file_layer)
        .with(text_file_layer)
        .init();

    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }

    let server_url = cli.server.unwrap_or_else(|| {
        let server = loaded.config.server();
        format!("http://{}:{}", server.bind, server.port)
    });

    let ctx = commands::Context {
        server_url,
        json_output: cli.json,
        verbose: cli.verbose,
        config: loaded,
    };

    match cli.command {
        Commands::Start(args) => start::run(args, &ctx).await,
        Commands::Run(args) => run::run(args, &ctx).await,
        Commands::Status(args) => status::run(args, &ctx).await,
    }
}
