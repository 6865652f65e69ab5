//! Placement policies — pick the host a task is routed to.
//!
//! Selection is a pure function of the policy and the cluster state read at
//! submission time. Load-based policies read each host's counters under that
//! host's own lock, one host at a time, so a concurrent submission can change
//! a host's load between the read and the enqueue. Placement is best-effort
//! under contention.

use std::sync::Arc;

use loadgrid_core::{Algorithm, SizeClass, Task};
use loadgrid_host::Host;

use crate::error::{DispatchError, DispatchResult};
use crate::load_balancer::RoundRobinBalancer;

/// Hosts required by size-interval placement, one per size class.
pub const SIZE_INTERVAL_MIN_HOSTS: usize = 3;

/// The active placement policy. Only round-robin carries state.
pub enum Placement {
    RoundRobin(RoundRobinBalancer),
    ShortestQueue,
    SizeInterval,
    LeastWorkLeft,
}

impl Placement {
    pub fn new(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::RoundRobin => Placement::RoundRobin(RoundRobinBalancer::new()),
            Algorithm::ShortestQueue => Placement::ShortestQueue,
            Algorithm::SizeIntervalTaskAssignment => Placement::SizeInterval,
            Algorithm::LeastWorkLeft => Placement::LeastWorkLeft,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            Placement::RoundRobin(_) => Algorithm::RoundRobin,
            Placement::ShortestQueue => Algorithm::ShortestQueue,
            Placement::SizeInterval => Algorithm::SizeIntervalTaskAssignment,
            Placement::LeastWorkLeft => Algorithm::LeastWorkLeft,
        }
    }

    /// Check that `host_count` hosts can serve this policy.
    pub fn validate(&self, host_count: usize) -> DispatchResult<()> {
        if matches!(self, Placement::SizeInterval) && host_count < SIZE_INTERVAL_MIN_HOSTS {
            return Err(DispatchError::InvalidConfiguration(format!(
                "{} needs at least {SIZE_INTERVAL_MIN_HOSTS} hosts, got {host_count}",
                self.algorithm()
            )));
        }
        Ok(())
    }

    /// Choose the index of the host that receives `task`.
    pub fn select(&self, task: &Task, hosts: &[Arc<Host>]) -> DispatchResult<usize> {
        if hosts.is_empty() {
            return Err(DispatchError::ClusterUnavailable(task.id()));
        }

        let index = match self {
            Placement::RoundRobin(balancer) => balancer
                .next(hosts.len())
                .ok_or(DispatchError::ClusterUnavailable(task.id()))?,
            Placement::ShortestQueue => hosts
                .iter()
                .enumerate()
                .min_by_key(|(_, host)| host.queue_size())
                .map(|(i, _)| i)
                .ok_or(DispatchError::ClusterUnavailable(task.id()))?,
            Placement::SizeInterval => {
                let index = size_interval_slot(task.size());
                if index >= hosts.len() {
                    return Err(DispatchError::InvalidConfiguration(format!(
                        "no host at slot {index} for {} tasks",
                        task.size()
                    )));
                }
                index
            }
            Placement::LeastWorkLeft => hosts
                .iter()
                .enumerate()
                .min_by_key(|(_, host)| host.work_left())
                .map(|(i, _)| i)
                .ok_or(DispatchError::ClusterUnavailable(task.id()))?,
        };

        Ok(index)
    }
}

/// Fixed host slot for each size class.
fn size_interval_slot(size: SizeClass) -> usize {
    match size {
        SizeClass::Short => 0,
        SizeClass::Medium => 1,
        SizeClass::Long => 2,
    }
}
