//! Background task scheduler.
//!
//! Moves non-real-time work (encoding, decoding, network callbacks) off the
//! audio paths onto a single dedicated worker thread. Submission never
//! blocks: capacity pressure is only reported, never enforced.
//!
//! ```text
//!  caller threads ──schedule()──▶ [pending queue] ──swap──▶ worker: run batch FIFO
//!                                      │                          │
//!                                      └──── Condvar ◀── active == 0 && queue empty
//!                                                 ▲
//!                                     wait_for_completion()
//! ```

use crate::config::SchedulerConfig;
use crate::error::Result;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use sysinfo::System;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Source of the free-memory figure used by the pressure warning.
pub trait MemoryGauge: Send + Sync {
    /// Currently available memory in bytes.
    fn free_memory_bytes(&self) -> u64;
}

/// Memory gauge backed by the operating system's view of available memory.
pub struct SystemMemoryGauge {
    system: Mutex<System>,
}

impl SystemMemoryGauge {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemMemoryGauge {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGauge for SystemMemoryGauge {
    fn free_memory_bytes(&self) -> u64 {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_memory();
        system.available_memory()
    }
}

struct QueueState {
    pending: VecDeque<Task>,
    /// Tasks submitted but not yet finished (pending + currently running batch).
    active: usize,
    shutdown: bool,
}

struct Shared {
    state: Mutex<QueueState>,
    /// Signals both "work available" and "queue drained".
    cond: Condvar,
    config: SchedulerConfig,
    gauge: Arc<dyn MemoryGauge>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, QueueState>) -> MutexGuard<'a, QueueState> {
        self.cond.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }
}

/// Serial executor for deferred work.
///
/// Tasks run one at a time, in submission order, on the `vocore-background`
/// thread. Share it behind an `Arc`; dropping the last handle drains the
/// queue and joins the worker.
pub struct BackgroundScheduler {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl BackgroundScheduler {
    /// Creates a scheduler that checks system memory under pressure.
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        Self::with_gauge(config, Arc::new(SystemMemoryGauge::new()))
    }

    /// Creates a scheduler with an injectable memory gauge.
    pub fn with_gauge(config: SchedulerConfig, gauge: Arc<dyn MemoryGauge>) -> Result<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                active: 0,
                shutdown: false,
            }),
            cond: Condvar::new(),
            config,
            gauge,
        });

        let worker_shared = shared.clone();
        let worker = thread::Builder::new()
            .name("vocore-background".to_string())
            .spawn(move || run_worker(&worker_shared))?;

        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Queues `task` for execution on the worker thread.
    ///
    /// Never blocks on capacity. When the active count is at the configured
    /// threshold and free memory is below the safety margin a warning is
    /// logged and the task is accepted anyway.
    pub fn schedule<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let active_before = {
            let mut state = self.shared.lock();
            let active_before = state.active;
            state.active += 1;
            state.pending.push_back(Box::new(task));
            self.shared.cond.notify_all();
            active_before
        };

        if active_before >= self.shared.config.max_active_tasks {
            let free = self.shared.gauge.free_memory_bytes();
            if free < self.shared.config.min_free_memory_bytes {
                tracing::warn!(
                    active_tasks = active_before,
                    free_memory_bytes = free,
                    "background task backlog under memory pressure"
                );
            }
        }
    }

    /// Blocks until every submitted task has finished.
    ///
    /// Must not be called from inside a scheduled task: the single worker
    /// would wait on itself. That misuse is logged and returns immediately.
    pub fn wait_for_completion(&self) {
        if self.is_worker_thread() {
            tracing::error!("wait_for_completion called from the background worker, ignoring");
            return;
        }

        let mut state = self.shared.lock();
        while !(state.pending.is_empty() && state.active == 0) {
            state = self.shared.wait(state);
        }
    }

    /// Number of tasks submitted and not yet finished.
    pub fn active_tasks(&self) -> usize {
        self.shared.lock().active
    }

    /// Number of tasks waiting for the worker to pick them up.
    pub fn pending_tasks(&self) -> usize {
        self.shared.lock().pending.len()
    }

    fn is_worker_thread(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|handle| handle.thread().id() == thread::current().id())
    }
}

impl Drop for BackgroundScheduler {
    fn drop(&mut self) {
        {
            let mut state = self.shared.lock();
            state.shutdown = true;
            self.shared.cond.notify_all();
        }

        // The last handle may be released by a task running on the worker.
        if self.is_worker_thread() {
            return;
        }
        if let Some(handle) = self.worker.take()
            && handle.join().is_err()
        {
            tracing::error!("background worker thread panicked");
        }
    }
}

fn run_worker(shared: &Shared) {
    tracing::debug!("background worker started");

    loop {
        let batch = {
            let mut state = shared.lock();
            while state.pending.is_empty() && !state.shutdown {
                state = shared.wait(state);
            }
            if state.pending.is_empty() {
                break;
            }
            // Swap the whole list out so submissions during the drain land in
            // a fresh queue and are picked up on the next pass.
            std::mem::take(&mut state.pending)
        };

        for task in batch {
            if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                tracing::error!("background task panicked");
            }

            let mut state = shared.lock();
            state.active -= 1;
            if state.pending.is_empty() && state.active == 0 {
                shared.cond.notify_all();
            }
        }
    }

    tracing::debug!("background worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FixedGauge {
        free: u64,
        calls: AtomicUsize,
    }

    impl FixedGauge {
        fn new(free: u64) -> Self {
            Self {
                free,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl MemoryGauge for FixedGauge {
        fn free_memory_bytes(&self) -> u64 {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.free
        }
    }

    fn scheduler() -> BackgroundScheduler {
        BackgroundScheduler::with_gauge(
            SchedulerConfig::default(),
            Arc::new(FixedGauge::new(u64::MAX)),
        )
        .unwrap()
    }

    #[test]
    fn test_tasks_run_in_submission_order() {
        let scheduler = scheduler();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..200 {
            let order = order.clone();
            scheduler.schedule(move || order.lock().unwrap().push(i));
        }
        scheduler.wait_for_completion();

        let order = order.lock().unwrap();
        assert_eq!(*order, (0..200).collect::<Vec<_>>());
    }

    #[test]
    fn test_submissions_during_drain_keep_fifo_order() {
        let scheduler = scheduler();
        let order = Arc::new(Mutex::new(Vec::new()));
        let (release_tx, release_rx) = bounded::<()>(0);
        let (started_tx, started_rx) = bounded::<()>(1);

        {
            let order = order.clone();
            scheduler.schedule(move || {
                started_tx.send(()).unwrap();
                // Hold the worker inside the batch while more work arrives
                release_rx.recv().unwrap();
                order.lock().unwrap().push(0);
            });
        }
        started_rx.recv().unwrap();

        for i in 1..50 {
            let order = order.clone();
            scheduler.schedule(move || order.lock().unwrap().push(i));
        }
        assert_eq!(scheduler.pending_tasks(), 49);
        release_tx.send(()).unwrap();

        scheduler.wait_for_completion();
        assert_eq!(*order.lock().unwrap(), (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_counters_are_zero_after_completion() {
        let scheduler = scheduler();
        for _ in 0..20 {
            scheduler.schedule(|| thread::sleep(Duration::from_micros(50)));
        }
        scheduler.wait_for_completion();

        assert_eq!(scheduler.active_tasks(), 0);
        assert_eq!(scheduler.pending_tasks(), 0);
    }

    #[test]
    fn test_wait_for_completion_on_idle_scheduler_returns() {
        let scheduler = scheduler();
        scheduler.wait_for_completion();
        assert_eq!(scheduler.active_tasks(), 0);
    }

    #[test]
    fn test_tasks_can_schedule_follow_up_work() {
        let scheduler = Arc::new(scheduler());
        let hits = Arc::new(AtomicUsize::new(0));

        {
            let inner = scheduler.clone();
            let hits = hits.clone();
            scheduler.schedule(move || {
                hits.fetch_add(1, Ordering::SeqCst);
                let hits = hits.clone();
                inner.schedule(move || {
                    hits.fetch_add(1, Ordering::SeqCst);
                });
            });
        }

        scheduler.wait_for_completion();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_wait_inside_task_does_not_deadlock() {
        let scheduler = Arc::new(scheduler());
        let done = Arc::new(AtomicUsize::new(0));

        {
            let inner = scheduler.clone();
            let done = done.clone();
            scheduler.schedule(move || {
                inner.wait_for_completion();
                done.fetch_add(1, Ordering::SeqCst);
            });
        }

        scheduler.wait_for_completion();
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_task_still_completes() {
        let scheduler = scheduler();
        let after = Arc::new(AtomicUsize::new(0));

        scheduler.schedule(|| panic!("task failure"));
        {
            let after = after.clone();
            scheduler.schedule(move || {
                after.fetch_add(1, Ordering::SeqCst);
            });
        }

        scheduler.wait_for_completion();
        assert_eq!(after.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.active_tasks(), 0);
    }

    #[test]
    fn test_memory_gauge_only_consulted_over_threshold() {
        let gauge = Arc::new(FixedGauge::new(0));
        let config = SchedulerConfig {
            max_active_tasks: 3,
            min_free_memory_bytes: 10_000,
        };
        let scheduler = BackgroundScheduler::with_gauge(config, gauge.clone()).unwrap();
        let (release_tx, release_rx) = bounded::<()>(0);

        scheduler.schedule(move || release_rx.recv().unwrap());
        for _ in 0..4 {
            scheduler.schedule(|| {});
        }

        // Submissions 4 and 5 saw 3 and 4 active tasks
        assert_eq!(gauge.calls.load(Ordering::SeqCst), 2);
        // Soft limit: nothing was rejected
        assert_eq!(scheduler.active_tasks(), 5);

        release_tx.send(()).unwrap();
        scheduler.wait_for_completion();
        assert_eq!(scheduler.active_tasks(), 0);
    }

    #[test]
    fn test_drop_drains_queued_tasks() {
        let hits = Arc::new(AtomicUsize::new(0));
        {
            let scheduler = scheduler();
            for _ in 0..10 {
                let hits = hits.clone();
                scheduler.schedule(move || {
                    hits.fetch_add(1, Ordering::SeqCst);
                });
            }
        }
        assert_eq!(hits.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_system_memory_gauge_reports_memory() {
        let gauge = SystemMemoryGauge::new();
        assert!(gauge.free_memory_bytes() > 0);
    }
}
