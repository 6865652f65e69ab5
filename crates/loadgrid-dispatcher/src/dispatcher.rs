//! Dispatcher — routes each submitted task to exactly one host.
//!
//! The dispatcher never queues a task itself. It picks a host with the
//! active [`Placement`] and hands the task to that host's `submit`, which
//! is the only lock taken on the routing path.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use loadgrid_core::{Algorithm, Task, TaskSpec};
use loadgrid_host::Host;
use tracing::{debug, info, warn};

use crate::error::DispatchResult;
use crate::placement::Placement;

pub struct Dispatcher {
    placement: Placement,
    /// Fixed after construction; iterated without locking.
    hosts: Vec<Arc<Host>>,
    submitted: AtomicU64,
    /// Tasks routed to each host, by host index.
    placements: Vec<AtomicU64>,
}

impl Dispatcher {
    /// Build a dispatcher over `hosts`.
    ///
    /// Fails with `InvalidConfiguration` when the policy cannot be served by
    /// this many hosts. An empty host list is accepted; submissions then
    /// fail with `ClusterUnavailable`.
    pub fn new(algorithm: Algorithm, hosts: Vec<Arc<Host>>) -> DispatchResult<Self> {
        let placement = Placement::new(algorithm);
        placement.validate(hosts.len())?;

        if hosts.is_empty() {
            warn!(%algorithm, "dispatcher built without hosts");
        }
        info!(%algorithm, hosts = hosts.len(), "dispatcher ready");

        let placements = hosts.iter().map(|_| AtomicU64::new(0)).collect();
        Ok(Self {
            placement,
            hosts,
            submitted: AtomicU64::new(0),
            placements,
        })
    }

    /// Route `task` to a host. Returns the chosen host index once the task
    /// is queued there; execution happens on the host's own loop.
    pub fn submit(&self, task: Task) -> DispatchResult<usize> {
        let index = self.placement.select(&task, &self.hosts)?;
        let task_id = task.id();
        let size = task.size();

        self.hosts[index].submit(task);
        self.submitted.fetch_add(1, Ordering::Relaxed);
        self.placements[index].fetch_add(1, Ordering::Relaxed);

        debug!(
            task = task_id,
            %size,
            host = index,
            algorithm = %self.placement.algorithm(),
            "task placed"
        );
        Ok(index)
    }

    /// Validate an external task description and route it. A spec with an
    /// unknown size class fails with `InvalidTask` and is not queued.
    pub fn submit_spec(&self, spec: &TaskSpec) -> DispatchResult<usize> {
        let task = Task::try_from(spec)?;
        self.submit(task)
    }

    pub fn algorithm(&self) -> Algorithm {
        self.placement.algorithm()
    }

    pub fn hosts(&self) -> &[Arc<Host>] {
        &self.hosts
    }

    /// Total tasks routed so far.
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Tasks routed to each host, by host index.
    pub fn placements(&self) -> Vec<u64> {
        self.placements
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .collect()
    }

    /// True when no host has queued or in-flight work.
    pub fn is_drained(&self) -> bool {
        self.hosts.iter().all(|h| h.queue_size() == 0)
    }

    /// Signal every host to stop.
    pub fn shutdown(&self) {
        for host in &self.hosts {
            host.shutdown();
        }
        info!(hosts = self.hosts.len(), "cluster shutdown requested");
    }

    /// Wait for every host loop to exit.
    pub async fn join(&self) {
        for host in &self.hosts {
            host.join().await;
        }
    }
}
