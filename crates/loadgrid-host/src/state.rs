//! Host scheduling state — the queue/in-flight pair and its step function.
//!
//! `HostState` is plain data with no locking of its own. The owning
//! [`Host`](crate::Host) keeps it behind a single mutex and drives it with
//! [`HostState::tick`] from its run-loop and [`HostState::enqueue`] from
//! `submit`, so every mutation happens inside one critical section.

use std::time::Duration;

use loadgrid_core::Task;
use tokio::time::Instant;

/// A swap performed by the preemption check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preemption {
    /// Task moved back to the queue.
    pub evicted: u64,
    /// Task now in flight.
    pub promoted: u64,
}

/// What a single run-loop iteration did to the in-flight slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub preempted: Option<Preemption>,
    pub finished: Option<u64>,
    pub promoted: Option<u64>,
    /// Execution time charged to the in-flight task this iteration,
    /// including any flush done on preemption.
    pub charged: Duration,
}

#[derive(Debug)]
pub struct HostState {
    current: Option<Task>,
    queue: Vec<Task>,
    finished: Vec<Task>,
    last_tick: Instant,
}

impl HostState {
    pub fn new(now: Instant) -> Self {
        Self {
            current: None,
            queue: Vec::new(),
            finished: Vec::new(),
            last_tick: now,
        }
    }

    /// Queue a task and re-evaluate preemption against the new queue head.
    pub fn enqueue(&mut self, task: Task, now: Instant) -> Option<Preemption> {
        self.queue.push(task);
        self.sort_queue();
        let (preempted, _) = self.check_preempt(now);
        preempted
    }

    /// One run-loop iteration: sort, preempt, retire/promote, advance time.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        let mut report = TickReport::default();

        self.sort_queue();

        let (preempted, flushed) = self.check_preempt(now);
        report.preempted = preempted;
        report.charged += flushed;

        if let Some(done) = self.retire_finished(now) {
            report.finished = Some(done);
        } else {
            report.promoted = self.promote(now);
        }

        report.charged += self.advance(now);
        report
    }

    /// Pending tasks plus one for the in-flight slot when occupied.
    pub fn queue_size(&self) -> usize {
        self.queue.len() + usize::from(self.current.is_some())
    }

    /// Remaining work across the queue and the in-flight task.
    pub fn work_left(&self) -> Duration {
        self.queue
            .iter()
            .chain(self.current.iter())
            .map(Task::remaining)
            .sum()
    }

    pub fn current(&self) -> Option<&Task> {
        self.current.as_ref()
    }

    /// Pending tasks, in schedule order as of the last sort.
    pub fn queued(&self) -> &[Task] {
        &self.queue
    }

    pub fn finished(&self) -> &[Task] {
        &self.finished
    }

    pub fn is_idle(&self) -> bool {
        self.current.is_none() && self.queue.is_empty()
    }

    /// How long the run-loop may wait before the next iteration.
    ///
    /// `None` means nothing is in flight or queued: wait for a submission.
    /// Zero means run again right away (a finished task awaits retirement
    /// or a queued task awaits promotion).
    pub fn next_wait(&self, tick: Duration) -> Option<Duration> {
        match &self.current {
            Some(task) => Some(task.remaining().min(tick)),
            None if !self.queue.is_empty() => Some(Duration::ZERO),
            None => None,
        }
    }

    fn sort_queue(&mut self) {
        self.queue.sort_by(Task::schedule_cmp);
    }

    /// Swap the in-flight task for the queue head when the in-flight task is
    /// preemptible and strictly lower priority. Expects a sorted queue.
    /// A task with no work left is never swapped out; it waits in the slot
    /// for retirement.
    fn check_preempt(&mut self, now: Instant) -> (Option<Preemption>, Duration) {
        let Some(head) = self.queue.first() else {
            return (None, Duration::ZERO);
        };
        let Some(current) = self.current.as_ref() else {
            return (None, Duration::ZERO);
        };
        if current.is_done()
            || !current.is_preemptible()
            || current.priority() >= head.priority()
        {
            return (None, Duration::ZERO);
        }

        // Flush elapsed time before the outgoing task goes back to the queue.
        let flushed = self.advance(now);
        if self.current.as_ref().is_some_and(Task::is_done) {
            return (None, flushed);
        }

        let incoming = self.queue.remove(0);
        let promoted = incoming.id();
        let Some(outgoing) = self.current.replace(incoming) else {
            return (None, flushed);
        };
        let evicted = outgoing.id();
        self.queue.push(outgoing);
        self.sort_queue();

        (Some(Preemption { evicted, promoted }), flushed)
    }

    /// Finalize an in-flight task whose remaining work reached zero.
    fn retire_finished(&mut self, now: Instant) -> Option<u64> {
        if !self.current.as_ref().is_some_and(Task::is_done) {
            return None;
        }
        let mut task = self.current.take()?;
        task.finish(now.into_std());
        let id = task.id();
        self.finished.push(task);
        Some(id)
    }

    /// Move the queue head into an empty in-flight slot.
    fn promote(&mut self, now: Instant) -> Option<u64> {
        if self.current.is_some() || self.queue.is_empty() {
            return None;
        }
        let task = self.queue.remove(0);
        let id = task.id();
        self.current = Some(task);
        self.last_tick = now;
        Some(id)
    }

    /// Charge wall-clock time since the last tick to the in-flight task.
    /// An idle host is never charged.
    fn advance(&mut self, now: Instant) -> Duration {
        let elapsed = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        match self.current.as_mut() {
            Some(task) => task.charge(elapsed),
            None => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadgrid_core::SizeClass;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn task(id: u64, priority: i32, work_ms: u64) -> Task {
        Task::new(id, priority, SizeClass::Short, ms(work_ms))
    }

    #[test]
    fn idle_host_reports_nothing() {
        let t0 = Instant::now();
        let mut state = HostState::new(t0);

        let report = state.tick(t0 + ms(50));
        assert_eq!(report, TickReport::default());
        assert_eq!(state.queue_size(), 0);
        assert_eq!(state.work_left(), Duration::ZERO);
        assert_eq!(state.next_wait(ms(10)), None);
    }

    #[test]
    fn idle_time_is_not_charged_on_promotion() {
        let t0 = Instant::now();
        let mut state = HostState::new(t0);

        state.enqueue(task(1, 0, 100), t0 + ms(500));
        assert_eq!(state.next_wait(ms(10)), Some(Duration::ZERO));

        let report = state.tick(t0 + ms(500));
        assert_eq!(report.promoted, Some(1));
        assert_eq!(report.charged, Duration::ZERO);
        assert_eq!(state.current().unwrap().remaining(), ms(100));
    }

    #[test]
    fn queue_is_sorted_by_priority_then_arrival() {
        let t0 = Instant::now();
        let mut state = HostState::new(t0);
        state.enqueue(task(1, 1, 10), t0);
        state.enqueue(task(2, 7, 10), t0);
        state.enqueue(task(3, 7, 10).with_start(0), t0);
        state.enqueue(task(4, 3, 10), t0);

        let ids: Vec<u64> = state.queued().iter().map(Task::id).collect();
        assert_eq!(ids, vec![3, 2, 4, 1]);

        state.tick(t0);
        assert_eq!(state.current().unwrap().id(), 3);
    }

    #[test]
    fn conservation_across_ticks() {
        let t0 = Instant::now();
        let mut state = HostState::new(t0);
        state.enqueue(task(1, 2, 100), t0);
        state.enqueue(task(2, 1, 60), t0);
        state.enqueue(task(3, 1, 40), t0);
        assert_eq!(state.work_left(), ms(200));
        assert_eq!(state.queue_size(), 3);

        let mut charged = Duration::ZERO;
        for step in 0..=7 {
            charged += state.tick(t0 + ms(step * 5)).charged;
        }
        assert_eq!(charged, ms(35));
        assert_eq!(state.work_left(), ms(200) - charged);
        assert_eq!(state.queue_size(), 3);
    }

    #[test]
    fn preemption_swaps_and_preserves_progress() {
        let t0 = Instant::now();
        let mut state = HostState::new(t0);
        state.enqueue(task(1, 1, 100), t0);
        state.tick(t0);
        state.tick(t0 + ms(30));
        assert_eq!(state.current().unwrap().remaining(), ms(70));

        // Enqueue swaps immediately and flushes the 10ms since the last tick.
        let swap = state.enqueue(task(2, 5, 50), t0 + ms(40));
        assert_eq!(
            swap,
            Some(Preemption {
                evicted: 1,
                promoted: 2
            })
        );

        let current = state.current().unwrap();
        assert_eq!(current.id(), 2);
        assert_eq!(current.remaining(), ms(50));

        let evicted = &state.queued()[0];
        assert_eq!(evicted.id(), 1);
        assert_eq!(evicted.remaining(), ms(60));
        assert_eq!(state.work_left(), ms(110));
        assert_eq!(state.queue_size(), 2);
    }

    #[test]
    fn preemption_happens_within_one_tick() {
        let t0 = Instant::now();
        let mut state = HostState::new(t0);
        state.enqueue(task(1, 1, 100), t0);
        state.tick(t0);

        // Bypass the enqueue-time check to exercise the run-loop path.
        state.queue.push(task(2, 5, 20));
        let report = state.tick(t0 + ms(10));

        assert_eq!(
            report.preempted,
            Some(Preemption {
                evicted: 1,
                promoted: 2
            })
        );
        assert_eq!(report.charged, ms(10));
        assert_eq!(state.current().unwrap().id(), 2);
        assert_eq!(state.queued()[0].remaining(), ms(90));
    }

    #[test]
    fn non_preemptible_task_keeps_the_slot() {
        let t0 = Instant::now();
        let mut state = HostState::new(t0);
        state.enqueue(task(1, 1, 100).with_preemptible(false), t0);
        state.tick(t0);

        assert_eq!(state.enqueue(task(2, 5, 20), t0 + ms(5)), None);
        let report = state.tick(t0 + ms(10));
        assert_eq!(report.preempted, None);
        assert_eq!(state.current().unwrap().id(), 1);
        assert_eq!(state.queued()[0].id(), 2);
    }

    #[test]
    fn equal_priority_does_not_preempt() {
        let t0 = Instant::now();
        let mut state = HostState::new(t0);
        state.enqueue(task(1, 3, 100), t0);
        state.tick(t0);

        assert_eq!(state.enqueue(task(2, 3, 20), t0 + ms(1)), None);
        assert_eq!(state.current().unwrap().id(), 1);
    }

    #[test]
    fn completion_is_final_and_separate_from_promotion() {
        let t0 = Instant::now();
        let mut state = HostState::new(t0);
        state.enqueue(task(1, 5, 20), t0);
        state.enqueue(task(2, 1, 30), t0);
        state.tick(t0);

        // Overshoot clamps at zero.
        let report = state.tick(t0 + ms(25));
        assert_eq!(report.charged, ms(20));
        assert!(state.current().unwrap().is_done());
        assert_eq!(state.next_wait(ms(10)), Some(Duration::ZERO));

        // Retirement iteration does not promote.
        let report = state.tick(t0 + ms(25));
        assert_eq!(report.finished, Some(1));
        assert_eq!(report.promoted, None);
        assert!(state.current().is_none());
        assert_eq!(state.queue_size(), 1);
        assert_eq!(state.work_left(), ms(30));

        let report = state.tick(t0 + ms(26));
        assert_eq!(report.promoted, Some(2));

        assert_eq!(state.finished().len(), 1);
        assert_eq!(state.finished()[0].id(), 1);
        assert!(state.finished()[0].finished_at().is_some());
        assert!(state.queued().iter().all(|t| t.id() != 1));
    }

    #[test]
    fn finished_task_is_not_preempted_on_enqueue() {
        let t0 = Instant::now();
        let mut state = HostState::new(t0);
        state.enqueue(task(1, 1, 20), t0);
        state.tick(t0);
        state.tick(t0 + ms(25));
        assert!(state.current().unwrap().is_done());

        assert_eq!(state.enqueue(task(2, 5, 50), t0 + ms(25)), None);
        assert_eq!(state.current().unwrap().id(), 1);
        assert_eq!(state.queued().iter().map(Task::id).collect::<Vec<_>>(), vec![2]);
        assert_eq!(state.queue_size(), 2);

        let report = state.tick(t0 + ms(25));
        assert_eq!(report.preempted, None);
        assert_eq!(report.finished, Some(1));
        assert_eq!(state.finished()[0].finished_at(), Some((t0 + ms(25)).into_std()));
    }

    #[test]
    fn finished_task_is_not_preempted_on_tick() {
        let t0 = Instant::now();
        let mut state = HostState::new(t0);
        state.enqueue(task(1, 1, 20), t0);
        state.tick(t0);
        state.tick(t0 + ms(20));
        assert!(state.current().unwrap().is_done());

        state.queue.push(task(2, 5, 50));
        let report = state.tick(t0 + ms(21));
        assert_eq!(report.preempted, None);
        assert_eq!(report.finished, Some(1));
        assert_eq!(report.promoted, None);
        assert!(state.queued().iter().all(|t| t.id() != 1));

        let report = state.tick(t0 + ms(21));
        assert_eq!(report.promoted, Some(2));
    }

    #[test]
    fn task_completed_by_the_flush_is_not_requeued() {
        let t0 = Instant::now();
        let mut state = HostState::new(t0);
        state.enqueue(task(1, 1, 20), t0);
        state.tick(t0);
        state.tick(t0 + ms(15));

        // The flush charges the last 5ms and more; the task ends in the slot.
        assert_eq!(state.enqueue(task(2, 5, 50), t0 + ms(30)), None);
        assert!(state.current().unwrap().is_done());
        assert_eq!(state.current().unwrap().id(), 1);
        assert_eq!(state.work_left(), ms(50));

        let report = state.tick(t0 + ms(30));
        assert_eq!(report.finished, Some(1));
        assert_eq!(state.finished().len(), 1);
        assert!(state.queued().iter().all(|t| t.id() != 1));
    }

    #[test]
    fn drains_to_idle() {
        let t0 = Instant::now();
        let mut state = HostState::new(t0);
        state.enqueue(task(1, 0, 10), t0);
        state.enqueue(task(2, 0, 10), t0);

        let mut now = t0;
        for _ in 0..10 {
            state.tick(now);
            now += ms(10);
        }

        assert!(state.is_idle());
        let ids: Vec<u64> = state.finished().iter().map(Task::id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(state.work_left(), Duration::ZERO);
    }

    #[test]
    fn next_wait_is_bounded_by_remaining_work() {
        let t0 = Instant::now();
        let mut state = HostState::new(t0);
        state.enqueue(task(1, 0, 4), t0);
        state.tick(t0);
        assert_eq!(state.next_wait(ms(10)), Some(ms(4)));
        assert_eq!(state.next_wait(ms(2)), Some(ms(2)));
    }
}
