use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    default_module_specs, ApiClient, Container, EventBus, HeadlessContainer, Orchestrator,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{execute, parse, Reply, HELP};
use config::{load_settings, LoadedSettings};

#[derive(Parser, Debug)]
struct Args {
    /// Settings file; missing files fall back to defaults.
    #[arg(long, default_value = "dashboard.toml")]
    config: PathBuf,
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long)]
    view: Option<String>,
    #[arg(long)]
    scenario: Option<String>,
    #[arg(long)]
    timeout_secs: Option<u64>,
    #[arg(long)]
    log_filter: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let LoadedSettings {
        mut settings,
        problems,
    } = load_settings(&args.config);
    if let Some(v) = args.base_url {
        settings.base_url = v;
    }
    if let Some(v) = args.view {
        settings.default_view = v;
    }
    if let Some(v) = args.scenario {
        settings.default_scenario = v;
    }
    if let Some(v) = args.timeout_secs {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = args.log_filter {
        settings.log_filter = v;
    }

    let filter =
        EnvFilter::try_new(&settings.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    for problem in &problems {
        warn!(config = %args.config.display(), "{problem}");
    }

    let bus = EventBus::new();
    let api = Arc::new(
        ApiClient::with_timeout(settings.base_url.as_str(), settings.request_timeout())
            .context("building HTTP client")?,
    );
    let mut orchestrator = Orchestrator::new(bus, api, settings.default_scenario());
    orchestrator.register_from_specs(default_module_specs(|kind| {
        let container = HeadlessContainer::new(format!("{kind}-container"));
        Some(Arc::new(container) as Arc<dyn Container>)
    }))?;

    info!(base_url = %settings.base_url, "starting dashboard");
    orchestrator
        .initialize(&settings.default_view())
        .await
        .with_context(|| format!("activating default view '{}'", settings.default_view))?;

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(error) => {
                println!("{error}");
                continue;
            }
        };
        match execute(&orchestrator, command).await {
            Ok(Reply::Message(message)) => println!("{message}"),
            Ok(Reply::Quit) => break,
            Err(error) => {
                warn!(error = %format!("{error:#}"), "command failed");
                println!("error: {error:#}");
            }
        }
    }

    orchestrator.teardown().await;
    Ok(())
}
