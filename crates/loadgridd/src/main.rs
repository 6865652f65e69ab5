//! loadgridd — the loadgrid daemon.
//!
//! Assembles a simulated cluster from a `cluster.toml`:
//! - Hosts (one run-loop each)
//! - Dispatcher with the configured placement algorithm
//! - Workload replay at each task's arrival offset
//!
//! # Usage
//!
//! ```text
//! loadgridd run --config cluster.toml --algorithm least-work-left
//! loadgridd validate --config cluster.toml
//! ```

mod cluster;
mod summary;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use loadgrid_core::{Algorithm, ClusterConfig, Task};
use tokio::sync::watch;
use tracing::info;

use crate::summary::{OutputFormat, RunSummary};

#[derive(Parser)]
#[command(name = "loadgridd", about = "loadgrid cluster simulator", version)]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the cluster, replay the workload and wait for it to drain.
    Run {
        /// Cluster configuration file.
        #[arg(short, long, default_value = "cluster.toml")]
        config: PathBuf,

        /// Override the placement algorithm from the config file.
        #[arg(long)]
        algorithm: Option<Algorithm>,

        /// Override the host count from the config file.
        #[arg(long)]
        hosts: Option<usize>,

        /// How often to check whether the cluster has drained, in milliseconds.
        #[arg(long, default_value = "50")]
        poll_ms: u64,

        /// Summary format: text or json.
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
    /// Parse the configuration and report what would run.
    Validate {
        #[arg(short, long, default_value = "cluster.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Run {
            config,
            algorithm,
            hosts,
            poll_ms,
            format,
        } => run(config, algorithm, hosts, Duration::from_millis(poll_ms), format).await,
        Command::Validate { config } => validate(config),
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,loadgridd=debug,loadgrid=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(
    config_path: PathBuf,
    algorithm: Option<Algorithm>,
    hosts: Option<usize>,
    poll: Duration,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let mut config = ClusterConfig::from_file(&config_path)?;
    if let Some(algorithm) = algorithm {
        config.algorithm = algorithm;
    }
    if let Some(hosts) = hosts {
        config.hosts = hosts;
    }
    info!(path = ?config_path, algorithm = %config.algorithm, hosts = config.hosts, "loadgrid starting");

    let dispatcher = cluster::build(&config)?;

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    // ── Replay and drain ───────────────────────────────────────

    let started = tokio::time::Instant::now();
    let replay = cluster::replay(&dispatcher, &config.workload(), shutdown_rx.clone()).await;
    let drained = cluster::wait_drained(&dispatcher, poll, shutdown_rx).await;

    dispatcher.shutdown();
    dispatcher.join().await;

    let summary = RunSummary::collect(&dispatcher, &replay, started, drained);
    println!("{}", summary.render(format)?);

    info!(drained, "loadgrid stopped");
    Ok(())
}

fn validate(config_path: PathBuf) -> anyhow::Result<()> {
    let config = ClusterConfig::from_file(&config_path)?;
    cluster::check(&config)?;

    let mut invalid = 0usize;
    for spec in &config.tasks {
        if let Err(e) = Task::try_from(spec) {
            invalid += 1;
            println!("task {}: {e}", spec.id);
        }
    }

    println!(
        "{}: {} on {} hosts, {} tasks ({} invalid)",
        config_path.display(),
        config.algorithm,
        config.hosts,
        config.tasks.len(),
        invalid
    );
    Ok(())
}
