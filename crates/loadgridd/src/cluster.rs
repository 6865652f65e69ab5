//! Cluster wiring — hosts + dispatcher from a `ClusterConfig`, and workload
//! replay against them.

use std::time::Duration;

use loadgrid_core::{ClusterConfig, TaskSpec};
use loadgrid_dispatcher::{Dispatcher, Placement};
use loadgrid_host::{Host, HostConfig};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// A task the dispatcher refused.
#[derive(Debug, Clone, Serialize)]
pub struct Rejected {
    pub id: u64,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ReplayReport {
    pub submitted: usize,
    pub rejected: Vec<Rejected>,
    /// Replay stopped early on shutdown.
    pub interrupted: bool,
}

/// Fail fast on configurations the placement policy cannot serve.
pub fn check(config: &ClusterConfig) -> anyhow::Result<()> {
    Placement::new(config.algorithm).validate(config.hosts)?;
    Ok(())
}

/// Start the hosts and build the dispatcher over them.
pub fn build(config: &ClusterConfig) -> anyhow::Result<Dispatcher> {
    check(config)?;

    let host_config = HostConfig::from(&config.host);
    let hosts = (0..config.hosts)
        .map(|id| Host::start(id, host_config.clone()))
        .collect();

    let dispatcher = Dispatcher::new(config.algorithm, hosts)?;
    info!(hosts = config.hosts, tick_ms = config.host.tick_ms, "cluster started");
    Ok(dispatcher)
}

/// Submit each task at its arrival offset. Rejections are recorded and
/// replay continues; nothing is retried.
pub async fn replay(
    dispatcher: &Dispatcher,
    workload: &[TaskSpec],
    mut shutdown: watch::Receiver<bool>,
) -> ReplayReport {
    let start = Instant::now();
    let mut report = ReplayReport::default();

    for spec in workload {
        let due = start + Duration::from_millis(spec.arrival_ms);
        tokio::select! {
            biased;
            _ = shutdown_requested(&mut shutdown) => {
                report.interrupted = true;
                break;
            }
            _ = tokio::time::sleep_until(due) => {}
        }

        match dispatcher.submit_spec(spec) {
            Ok(host) => {
                report.submitted += 1;
                debug!(task = spec.id, host, "workload task submitted");
            }
            Err(e) => {
                warn!(task = spec.id, error = %e, "task rejected");
                report.rejected.push(Rejected {
                    id: spec.id,
                    reason: e.to_string(),
                });
            }
        }
    }

    info!(
        submitted = report.submitted,
        rejected = report.rejected.len(),
        interrupted = report.interrupted,
        "workload replayed"
    );
    report
}

/// Poll until every host is idle. Returns `false` if shutdown came first.
pub async fn wait_drained(
    dispatcher: &Dispatcher,
    poll: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> bool {
    loop {
        if dispatcher.is_drained() {
            return true;
        }
        tokio::select! {
            biased;
            _ = shutdown_requested(&mut shutdown) => return false,
            _ = tokio::time::sleep(poll) => {}
        }
    }
}

/// Resolves once the flag is set. Pends forever if the sender is gone.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
