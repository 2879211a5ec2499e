//! Demo client for the Airtap tool server.
//!
//! Connects over WebSocket, lists the server's tools, submits a task, checks
//! its status, and prints every envelope it receives.
//!
//! Usage:
//!   API_TOKEN=secret airtap-demo --url ws://localhost:3000
//!
//! Env vars:
//!   AIRTAP_URL  server WebSocket URL (default: ws://localhost:3000)
//!   API_TOKEN   auth token
//!   AIRTAP_TASK task text passed to submit_task
//!
//! Precedence: CLI flag > env var > config file > default.

mod render;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use airtap_client::{driver, ClientBuilder, ClientConfig, ClientError, TransportError, Workflow};

/// Run the discover → submit → poll workflow against an Airtap server.
#[derive(Debug, Parser)]
#[command(name = "airtap-demo", version, about)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Server WebSocket URL.
    #[arg(long)]
    url: Option<String>,
    /// Task text passed to `submit_task`.
    #[arg(long)]
    task: Option<String>,
    /// Keep checking the task status until it finishes.
    #[arg(long)]
    poll_until_done: bool,
    /// Emit logs as JSON.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = load_config(&cli)?;

    // ── Ctrl+C → cooperative shutdown ────────────────────────────────
    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received");
            ctrl_c.cancel();
        }
    });

    let conn = tokio::select! {
        r = ClientBuilder::from_config(&config).connect() => {
            r.with_context(|| format!("connecting to {}", config.endpoint))?
        }
        _ = shutdown.cancelled() => {
            println!("\nExiting...");
            return Ok(());
        }
    };
    println!("Connected to Airtap MCP server");

    let mut workflow = Workflow::new(config.workflow.to_settings());
    let result = driver::run(&conn, &mut workflow, &shutdown, |inbound, action| {
        println!("{}", render::inbound(inbound, action));
    })
    .await;

    conn.close().await;

    match result {
        Ok(outcome) => {
            println!("{}", render::outcome(&outcome));
            Ok(())
        }
        Err(ClientError::Transport(TransportError::Closed)) => {
            println!("Connection to Airtap MCP server closed");
            Ok(())
        }
        Err(e) => {
            tracing::error!(state = workflow.state().name(), error = %e, "workflow failed");
            Err(e.into())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<ClientConfig> {
    let mut config = ClientConfig::load_or_default(cli.config.as_deref())
        .context("loading configuration")?;
    config.apply_env();

    if let Some(url) = &cli.url {
        config.endpoint = url.clone();
    }
    if let Some(task) = &cli.task {
        config.workflow.task = task.clone();
    }
    if cli.poll_until_done {
        config.workflow.poll_until_terminal = true;
    }

    tracing::info!(
        endpoint = %config.endpoint,
        token_set = config.token.is_some(),
        poll_until_terminal = config.workflow.poll_until_terminal,
        "configuration loaded"
    );
    Ok(config)
}
