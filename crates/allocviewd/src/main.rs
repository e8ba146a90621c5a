//! allocviewd: the allocview daemon.
//!
//! Loads a cluster-state document, keeps it published for the explain
//! pipeline, and serves the REST API:
//! - Configuration (`allocview.toml`, CLI overrides)
//! - Cluster-state reload loop
//! - Explain service on a bounded management pool
//! - REST API
//!
//! # Usage
//!
//! ```text
//! allocviewd serve --config /etc/allocview/allocview.toml --state-file cluster-state.json
//! allocviewd check --state-file cluster-state.json
//! ```

mod reloader;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use allocview_api::ApiState;
use allocview_core::AllocviewConfig;
use allocview_explain::{ExplainService, RuleEngine, tenant_resolver};
use allocview_routing::{
    ClusterInfo, ClusterState, ClusterStateDocument, RoutingSnapshot, SnapshotHolder, SnapshotShardSizes,
};

use crate::reloader::StateReloader;

const DEFAULT_LOG_FILTER: &str = "info,allocviewd=debug,allocview=debug";

#[derive(Parser)]
#[command(name = "allocviewd", about = "allocview daemon")]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, global = true, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the allocation explain API.
    Serve {
        /// Path to allocview.toml.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Listen address, overrides `server.listen`.
        #[arg(long)]
        listen: Option<String>,

        /// Cluster-state document, overrides `cluster.state_file`.
        #[arg(long)]
        state_file: Option<PathBuf>,
    },
    /// Validate a configuration and cluster-state document, then print a summary.
    Check {
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        state_file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Serve {
            config,
            listen,
            state_file,
        } => {
            let config = load_config(config.as_deref(), listen, state_file)?;
            run_serve(config).await
        }
        Command::Check { config, state_file } => {
            let config = load_config(config.as_deref(), None, state_file)?;
            run_check(&config)
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Read the config file (or defaults) and apply CLI overrides.
fn load_config(
    path: Option<&Path>,
    listen: Option<String>,
    state_file: Option<PathBuf>,
) -> anyhow::Result<AllocviewConfig> {
    let mut config = match path {
        Some(path) => AllocviewConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => AllocviewConfig::default(),
    };
    if let Some(listen) = listen {
        config.server.listen = listen;
    }
    if let Some(state_file) = state_file {
        config.cluster.state_file = Some(state_file);
    }
    Ok(config)
}

/// The configured state document, or an empty cluster when none is set.
fn initial_state(config: &AllocviewConfig) -> anyhow::Result<ClusterState> {
    match &config.cluster.state_file {
        Some(path) => {
            let document = ClusterStateDocument::from_file(path)
                .with_context(|| format!("failed to read cluster state {}", path.display()))?;
            Ok(document.into_cluster_state()?)
        }
        None => {
            warn!("no cluster state file configured, serving an empty cluster");
            Ok(ClusterState::new(
                RoutingSnapshot::builder().build()?,
                ClusterInfo::default(),
                SnapshotShardSizes::default(),
            ))
        }
    }
}

fn build_api_state(config: &AllocviewConfig, holder: SnapshotHolder) -> anyhow::Result<ApiState> {
    let service = ExplainService::from_holder(
        holder.clone(),
        tenant_resolver(&config.tenancy),
        Arc::new(RuleEngine::from_config(&config.deciders)),
        config.explain.management_workers,
    );
    Ok(ApiState {
        service,
        holder,
        request_timeout: config.server.request_timeout()?,
    })
}

async fn run_serve(config: AllocviewConfig) -> anyhow::Result<()> {
    info!("allocview daemon starting");

    let addr: SocketAddr = config
        .server
        .listen
        .parse()
        .with_context(|| format!("invalid listen address {:?}", config.server.listen))?;

    // ── Cluster state ──────────────────────────────────────────

    let state = initial_state(&config)?;
    info!(
        version = state.snapshot().version(),
        nodes = state.snapshot().nodes().len(),
        unassigned = state.snapshot().unassigned().len(),
        "initial cluster state loaded"
    );
    let holder = SnapshotHolder::new(state);

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Background reload ──────────────────────────────────────

    let reload_handle = match &config.cluster.state_file {
        Some(path) => {
            let reloader = StateReloader::new(path.clone(), holder.clone(), config.cluster.reload_interval()?);
            Some(tokio::spawn(async move {
                reloader.run(shutdown_rx).await;
            }))
        }
        None => None,
    };

    // ── API server ─────────────────────────────────────────────

    let router = allocview_api::build_router(build_api_state(&config, holder)?);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        %addr,
        workers = config.explain.management_workers,
        tenancy = ?config.tenancy.mode,
        "API server listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to install CTRL+C handler");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    if let Some(handle) = reload_handle {
        let _ = handle.await;
    }

    info!("allocview daemon stopped");
    Ok(())
}

fn run_check(config: &AllocviewConfig) -> anyhow::Result<()> {
    config.server.request_timeout()?;
    config.cluster.reload_interval()?;
    let state = initial_state(config)?;
    let snapshot = state.snapshot();
    let summary = serde_json::json!({
        "cluster_name": snapshot.cluster_name(),
        "version": snapshot.version(),
        "nodes": snapshot.nodes().len(),
        "tenants": snapshot.tenants().map(|t| t.as_str()).collect::<Vec<_>>(),
        "unassigned_shards": snapshot.unassigned().len(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
