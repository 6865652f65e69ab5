//! End-of-run summary, rendered as text or JSON.

use std::fmt::Write as _;
use std::str::FromStr;
use std::time::Duration;

use loadgrid_core::Task;
use loadgrid_dispatcher::Dispatcher;
use serde::Serialize;
use tokio::time::Instant;

use crate::cluster::{Rejected, ReplayReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown format '{other}', expected text or json")),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HostSummary {
    pub id: usize,
    pub placed: u64,
    pub finished: usize,
    /// Execution time of the tasks this host completed.
    pub busy_ms: u64,
    /// Tasks still queued or in flight when the run ended.
    pub pending: usize,
    pub work_left_ms: u64,
    /// Time from workload start to this host's last completion.
    pub last_finish_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub algorithm: String,
    pub drained: bool,
    pub interrupted: bool,
    pub elapsed_ms: u64,
    pub submitted: usize,
    pub rejected: Vec<Rejected>,
    pub hosts: Vec<HostSummary>,
}

impl RunSummary {
    pub fn collect(
        dispatcher: &Dispatcher,
        replay: &ReplayReport,
        started: Instant,
        drained: bool,
    ) -> Self {
        let started_std = started.into_std();
        let placements = dispatcher.placements();

        let hosts = dispatcher
            .hosts()
            .iter()
            .enumerate()
            .map(|(index, host)| {
                let finished = host.finished();
                let last_finish_ms = finished
                    .iter()
                    .filter_map(|t| t.finished_at())
                    .map(|at| at.saturating_duration_since(started_std).as_millis() as u64)
                    .max();
                let busy: Duration = finished.iter().map(Task::duration).sum();
                HostSummary {
                    id: host.id(),
                    placed: placements.get(index).copied().unwrap_or(0),
                    finished: finished.len(),
                    busy_ms: busy.as_millis() as u64,
                    pending: host.queue_size(),
                    work_left_ms: host.work_left().as_millis() as u64,
                    last_finish_ms,
                }
            })
            .collect();

        Self {
            algorithm: dispatcher.algorithm().to_string(),
            drained,
            interrupted: replay.interrupted,
            elapsed_ms: started.elapsed().as_millis() as u64,
            submitted: replay.submitted,
            rejected: replay.rejected.clone(),
            hosts,
        }
    }

    pub fn render(&self, format: OutputFormat) -> anyhow::Result<String> {
        match format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(self)?),
            OutputFormat::Text => Ok(self.to_text()),
        }
    }

    fn to_text(&self) -> String {
        let mut out = String::new();
        let status = if self.drained { "drained" } else { "stopped early" };
        let _ = writeln!(
            out,
            "{} — {} submitted, {} rejected, {} in {}ms",
            self.algorithm,
            self.submitted,
            self.rejected.len(),
            status,
            self.elapsed_ms
        );
        for host in &self.hosts {
            let last = host
                .last_finish_ms
                .map(|ms| format!("{ms}ms"))
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(
                out,
                "  host {:<3} placed {:<5} finished {:<5} busy {}ms  pending {:<5} work left {}ms  last finish {}",
                host.id,
                host.placed,
                host.finished,
                host.busy_ms,
                host.pending,
                host.work_left_ms,
                last
            );
        }
        for r in &self.rejected {
            let _ = writeln!(out, "  rejected task {}: {}", r.id, r.reason);
        }
        out.trim_end().to_string()
    }
}
