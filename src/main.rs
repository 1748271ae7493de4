use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

mod accumulator;
mod cli;
mod config;
mod controller;
mod error;
mod executor;
mod forge;
mod jobs;
mod model;
mod partitioner;
mod picker;
mod repo_tool;
mod selector;
mod server;
mod snapshot;

#[cfg(test)]
mod testutil;

use forge::HttpCodeForge;
use jobs::HttpJobSubstrate;
use repo_tool::Git2RepoTool;
use snapshot::SnapshotStore;

fn init_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .init();
}

/// Credentials and transport configuration that, unlike `config::Config`,
/// come from the environment rather than the YAML file: they're secrets,
/// not policy, and don't belong in a file a reviewer might paste into a
/// pull request.
struct Endpoints {
    forge_api_base: String,
    forge_token: String,
    jobs_api_base: String,
    jobs_token: String,
    clone_url_template: String,
}

impl Endpoints {
    fn from_env() -> Result<Self> {
        Ok(Self {
            forge_api_base: std::env::var("TIDE_FORGE_API_BASE")
                .context("TIDE_FORGE_API_BASE must be set")?,
            forge_token: std::env::var("TIDE_FORGE_TOKEN")
                .context("TIDE_FORGE_TOKEN must be set")?,
            jobs_api_base: std::env::var("TIDE_JOBS_API_BASE")
                .context("TIDE_JOBS_API_BASE must be set")?,
            jobs_token: std::env::var("TIDE_JOBS_TOKEN")
                .context("TIDE_JOBS_TOKEN must be set")?,
            clone_url_template: std::env::var("TIDE_CLONE_URL_TEMPLATE")
                .unwrap_or_else(|_| "https://{org}/{repo}".to_string()),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config, cli.dry_run)
        .context("loading configuration")?;
    let listen_addr = cli.listen.clone().unwrap_or_else(|| cfg.listen_addr.clone());
    let addr: SocketAddr = listen_addr
        .parse()
        .with_context(|| format!("parsing listen address {listen_addr}"))?;

    let endpoints = Endpoints::from_env()?;
    let forge = Arc::new(HttpCodeForge::new(endpoints.forge_api_base, endpoints.forge_token));
    let job_substrate = Arc::new(HttpJobSubstrate::new(endpoints.jobs_api_base, endpoints.jobs_token));
    let repo_tool = Arc::new(Git2RepoTool::new(endpoints.clone_url_template));
    let store = Arc::new(SnapshotStore::new());

    if cfg.dry_run {
        tracing::warn!("running in dry-run mode: no merges or job submissions will be made");
    }

    if cli.once {
        run_one(forge, job_substrate, repo_tool, cfg, store).await?;
        return Ok(());
    }

    let server_store = store.clone();
    let server_task = tokio::spawn(async move { server::serve(addr, server_store).await });

    let poll_interval = Duration::from_secs(cfg.poll_interval_secs);
    let mut ticker = tokio::time::interval(poll_interval);
    loop {
        ticker.tick().await;
        let forge = forge.clone();
        let job_substrate = job_substrate.clone();
        let repo_tool = repo_tool.clone();
        let cfg = cfg.clone();
        let store = store.clone();
        tokio::task::spawn_blocking(move || {
            controller::run_iteration_logged(
                forge.as_ref(),
                job_substrate.as_ref(),
                repo_tool.as_ref(),
                &cfg,
                &store,
            );
        })
        .await
        .context("iteration task panicked")?;

        if server_task.is_finished() {
            return server_task
                .await
                .context("status server task panicked")?
                .context("status server exited");
        }
    }
}

async fn run_one(
    forge: Arc<HttpCodeForge>,
    job_substrate: Arc<HttpJobSubstrate>,
    repo_tool: Arc<Git2RepoTool>,
    cfg: config::Config,
    store: Arc<SnapshotStore>,
) -> Result<()> {
    tokio::task::spawn_blocking(move || {
        controller::run_iteration(
            forge.as_ref(),
            job_substrate.as_ref(),
            repo_tool.as_ref(),
            &cfg,
            &store,
        )
    })
    .await
    .context("iteration task panicked")?
    .map_err(anyhow::Error::from)?;
    Ok(())
}
