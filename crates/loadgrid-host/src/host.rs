//! Host — a simulated worker node with its own queue and run-loop.
//!
//! Each `Host` spawns one background task on construction. The loop wakes
//! on submission, on a tick bounded by the in-flight task's remaining work,
//! or on shutdown, and runs one [`HostState::tick`] per wake-up.
//!
//! # Concurrency
//!
//! The queue, the in-flight slot and the timing fields live in one
//! `HostState` behind one `std::sync::Mutex`. The run-loop and `submit`
//! both mutate it only while holding that lock, and the lock is never held
//! across an `.await`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use loadgrid_core::{HostSettings, Task};
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::state::{HostState, TickReport};

/// Run-loop tuning for a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// Longest wait between iterations while a task is in flight.
    pub tick: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(10),
        }
    }
}

impl From<&HostSettings> for HostConfig {
    fn from(settings: &HostSettings) -> Self {
        Self {
            tick: Duration::from_millis(settings.tick_ms.max(1)),
        }
    }
}

/// Point-in-time copy of a host's scheduling state, read under one lock.
#[derive(Debug, Clone)]
pub struct HostSnapshot {
    pub id: usize,
    pub current: Option<Task>,
    pub queued: Vec<Task>,
    pub finished: usize,
}

/// State shared between the `Host` handle and its run-loop.
struct Shared {
    state: Mutex<HostState>,
    wake: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct Host {
    id: usize,
    shared: Arc<Shared>,
    shutdown_tx: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Host {
    /// Create a host and spawn its run-loop on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn start(id: usize, config: HostConfig) -> Arc<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(HostState::new(Instant::now())),
            wake: Notify::new(),
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let loop_shared = shared.clone();
        let handle = tokio::spawn(async move {
            run_host_loop(id, loop_shared, config.tick, shutdown_rx).await;
        });

        info!(host = id, "host started");

        Arc::new(Self {
            id,
            shared,
            shutdown_tx,
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Queue a task and re-evaluate preemption. Does not run the task.
    pub fn submit(&self, task: Task) {
        let task_id = task.id();
        let priority = task.priority();
        let preempted = self.shared.lock().enqueue(task, Instant::now());

        debug!(host = self.id, task = task_id, priority, "task queued");
        if let Some(swap) = preempted {
            debug!(
                host = self.id,
                evicted = swap.evicted,
                promoted = swap.promoted,
                "preempted on arrival"
            );
        }

        self.shared.wake.notify_one();
    }

    /// Pending tasks plus the in-flight task, if any.
    pub fn queue_size(&self) -> usize {
        self.shared.lock().queue_size()
    }

    /// Remaining work over pending and in-flight tasks, as charged so far.
    pub fn work_left(&self) -> Duration {
        self.shared.lock().work_left()
    }

    /// Signal the run-loop to stop after its current iteration. Idempotent.
    pub fn shutdown(&self) {
        let was_running = !self.shutdown_tx.send_replace(true);
        if was_running {
            info!(host = self.id, "host shutdown requested");
        }
    }

    pub fn is_running(&self) -> bool {
        !*self.shutdown_tx.borrow()
    }

    /// Wait for the run-loop to exit. Returns immediately if it was
    /// already joined.
    pub async fn join(&self) {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    pub fn snapshot(&self) -> HostSnapshot {
        let state = self.shared.lock();
        HostSnapshot {
            id: self.id,
            current: state.current().cloned(),
            queued: state.queued().to_vec(),
            finished: state.finished().len(),
        }
    }

    /// Tasks finalized by this host, in completion order.
    pub fn finished(&self) -> Vec<Task> {
        self.shared.lock().finished().to_vec()
    }

    pub fn is_idle(&self) -> bool {
        self.shared.lock().is_idle()
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
    }
}

/// The run-loop for a single host.
async fn run_host_loop(
    id: usize,
    shared: Arc<Shared>,
    tick: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(host = id, tick_ms = tick.as_millis() as u64, "host loop starting");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let wait = {
            let mut state = shared.lock();
            let report = state.tick(Instant::now());
            log_tick(id, &report);
            state.next_wait(tick)
        };

        match wait {
            Some(wait) if wait.is_zero() => tokio::task::yield_now().await,
            Some(wait) => {
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = shared.wake.notified() => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            None => {
                tokio::select! {
                    _ = shared.wake.notified() => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }

    debug!(host = id, "host loop stopped");
}

fn log_tick(id: usize, report: &TickReport) {
    if let Some(swap) = report.preempted {
        debug!(
            host = id,
            evicted = swap.evicted,
            promoted = swap.promoted,
            "preempted in-flight task"
        );
    }
    if let Some(task) = report.finished {
        debug!(host = id, task, "task finished");
    }
    if let Some(task) = report.promoted {
        debug!(host = id, task, "task promoted");
    }
}
