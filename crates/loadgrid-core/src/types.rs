//! Shared types used across loadgrid crates.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while turning an external task description into a [`Task`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("unknown size class: {0}")]
    UnknownSizeClass(String),

    #[error("unknown placement algorithm: {0}")]
    UnknownAlgorithm(String),
}

/// Coarse size bucket of a task, used by size-interval placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SizeClass {
    Short,
    Medium,
    Long,
}

impl SizeClass {
    pub fn label(&self) -> &'static str {
        match self {
            SizeClass::Short => "SHORT",
            SizeClass::Medium => "MEDIUM",
            SizeClass::Long => "LONG",
        }
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SizeClass {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SHORT" => Ok(SizeClass::Short),
            "MEDIUM" => Ok(SizeClass::Medium),
            "LONG" => Ok(SizeClass::Long),
            _ => Err(TaskError::UnknownSizeClass(s.to_string())),
        }
    }
}

/// Placement algorithm selected for a dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum Algorithm {
    RoundRobin,
    ShortestQueue,
    SizeIntervalTaskAssignment,
    LeastWorkLeft,
}

impl Algorithm {
    pub const ALL: [Algorithm; 4] = [
        Algorithm::RoundRobin,
        Algorithm::ShortestQueue,
        Algorithm::SizeIntervalTaskAssignment,
        Algorithm::LeastWorkLeft,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Algorithm::RoundRobin => "ROUND_ROBIN",
            Algorithm::ShortestQueue => "SHORTEST_QUEUE",
            Algorithm::SizeIntervalTaskAssignment => "SIZE_INTERVAL_TASK_ASSIGNMENT",
            Algorithm::LeastWorkLeft => "LEAST_WORK_LEFT",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Algorithm {
    type Err = TaskError;

    /// Accepts the canonical names (`LEAST_WORK_LEFT`) as well as
    /// kebab-case (`least-work-left`) and `size-interval`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        match normalized.as_str() {
            "ROUND_ROBIN" => Ok(Algorithm::RoundRobin),
            "SHORTEST_QUEUE" => Ok(Algorithm::ShortestQueue),
            "SIZE_INTERVAL" | "SIZE_INTERVAL_TASK_ASSIGNMENT" => {
                Ok(Algorithm::SizeIntervalTaskAssignment)
            }
            "LEAST_WORK_LEFT" => Ok(Algorithm::LeastWorkLeft),
            _ => Err(TaskError::UnknownAlgorithm(s.to_string())),
        }
    }
}

impl TryFrom<String> for Algorithm {
    type Error = TaskError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A unit of work routed by the dispatcher and executed by a host.
///
/// Identity (`id`, `priority`, `start`, `size`, `preemptible`) is fixed at
/// construction. Only the executing host changes `remaining`, through
/// [`Task::charge`], and stamps completion through [`Task::finish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    id: u64,
    priority: i32,
    start: u64,
    size: SizeClass,
    preemptible: bool,
    duration: Duration,
    remaining: Duration,
    finished_at: Option<Instant>,
}

impl Task {
    /// Create a preemptible task whose arrival order equals its id.
    pub fn new(id: u64, priority: i32, size: SizeClass, duration: Duration) -> Self {
        Self {
            id,
            priority,
            start: id,
            size,
            preemptible: true,
            duration,
            remaining: duration,
            finished_at: None,
        }
    }

    /// Override the arrival order used to break priority ties.
    pub fn with_start(mut self, start: u64) -> Self {
        self.start = start;
        self
    }

    pub fn with_preemptible(mut self, preemptible: bool) -> Self {
        self.preemptible = preemptible;
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn size(&self) -> SizeClass {
        self.size
    }

    pub fn is_preemptible(&self) -> bool {
        self.preemptible
    }

    /// Initial amount of work.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    pub fn is_done(&self) -> bool {
        self.remaining.is_zero()
    }

    pub fn finished_at(&self) -> Option<Instant> {
        self.finished_at
    }

    /// Charge `elapsed` execution time. Saturates at zero and returns the
    /// amount actually charged.
    pub fn charge(&mut self, elapsed: Duration) -> Duration {
        let charged = elapsed.min(self.remaining);
        self.remaining -= charged;
        charged
    }

    /// Stamp the completion time. Later calls keep the first stamp.
    pub fn finish(&mut self, at: Instant) {
        if self.finished_at.is_none() {
            self.finished_at = Some(at);
        }
    }

    /// Host queue order: descending priority, then ascending arrival, then
    /// ascending id. The order is total, so it never depends on what else is
    /// queued.
    pub fn schedule_cmp(&self, other: &Task) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| self.start.cmp(&other.start))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// External description of a task, as read from a workload file.
///
/// The size class is kept as free text so an unknown class surfaces as a
/// [`TaskError`] at submission instead of failing the whole file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub id: u64,
    #[serde(default)]
    pub priority: i32,
    pub size: String,
    pub duration_ms: u64,
    #[serde(default = "default_preemptible")]
    pub preemptible: bool,
    /// Offset from workload start; doubles as the arrival order.
    #[serde(default)]
    pub arrival_ms: u64,
}

fn default_preemptible() -> bool {
    true
}

impl TryFrom<&TaskSpec> for Task {
    type Error = TaskError;

    fn try_from(spec: &TaskSpec) -> Result<Self, Self::Error> {
        let size: SizeClass = spec.size.parse()?;
        Ok(Task::new(
            spec.id,
            spec.priority,
            size,
            Duration::from_millis(spec.duration_ms),
        )
        .with_start(spec.arrival_ms)
        .with_preemptible(spec.preemptible))
    }
}
