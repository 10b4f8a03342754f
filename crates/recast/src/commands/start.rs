//! Start command - launches the Recast server.

use std::net::{IpAddr, SocketAddr};

use anyhow::{Context as _, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use recast_config::{API_TOKEN_ENV, resolve_secret};
use recast_server::{AppState, Server, ServerConfig};
use recast_workflow::spawn_eviction_sweeper;

use super::Context;
use crate::app::App;

/// Arguments for the start command.
///
/// CLI arguments override config file values.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind to (overrides config)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// API token for authentication (or set RECAST_API_TOKEN env var)
    #[arg(long)]
    pub token: Option<String>,
}

/// Run the start command.
pub async fn run(args: StartArgs, ctx: &Context) -> Result<()> {
    let config = &ctx.config.config;

    if ctx.verbose {
        let sources = ctx.config.loaded_from();
        if sources.is_empty() {
            println!("No config files found, using defaults + CLI args");
        } else {
            for source in sources {
                println!("Loaded config: {}", source.display());
            }
        }
    }

    // ── Server settings ─────────────────────────────────────────────────

    let server_cfg = config.server();
    let bind = args.bind.unwrap_or(server_cfg.bind.clone());
    let ip: IpAddr = bind
        .parse()
        .with_context(|| format!("Invalid bind address '{bind}'"))?;
    let addr = SocketAddr::new(ip, args.port.unwrap_or(server_cfg.port));

    let auth_token = args.token.or_else(|| {
        resolve_secret(server_cfg.auth_token.as_deref(), API_TOKEN_ENV).map(|s| s.value)
    });
    if auth_token.is_none() && !addr.ip().is_loopback() {
        warn!(addr = %addr, "Serving a non-loopback address without an auth token");
    }

    if ctx.verbose {
        println!("Bind address: {}", addr);
        match &auth_token {
            Some(_) => println!("Auth: bearer token"),
            None => println!("Auth: disabled"),
        }
    }

    let server_config = ServerConfig::new(auth_token)
        .with_bind_address(addr)
        .with_rate_limiting(server_cfg.rate_limiting)
        .with_api_rpm(server_cfg.api_rpm)
        .with_request_logging(server_cfg.request_logging)
        .with_cors(server_cfg.cors)
        .with_cors_origins(server_cfg.cors_origins.clone());

    // ── Pipeline ────────────────────────────────────────────────────────

    let app = App::build(config)?;
    let cancel = CancellationToken::new();

    let workflow = config.workflow();
    let sweeper = match workflow.sweep_interval() {
        Some(interval) => {
            info!(
                retention_secs = workflow.retention().as_secs(),
                interval_secs = interval.as_secs(),
                "Starting eviction sweeper"
            );
            Some(spawn_eviction_sweeper(
                app.orchestrator.registry().clone(),
                workflow.retention(),
                interval,
                cancel.clone(),
            ))
        }
        None => None,
    };

    let state = AppState::new(app.orchestrator, app.posts, server_config)
        .with_rate_limits(app.rate_limits);
    let server = Server::from_state(state);

    println!("Recast server starting on http://{}", addr);
    println!("Press Ctrl+C to stop");

    let shutdown = {
        let cancel = cancel.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
            info!("Shutdown requested");
            cancel.cancel();
        }
    };

    let result = server.run_until(addr, shutdown).await;

    // ── Graceful shutdown ──────────────────────────────────────────────

    cancel.cancel();
    if let Some(handle) = sweeper {
        let _ = handle.await;
    }

    result?;
    println!("Recast server stopped");
    Ok(())
}
