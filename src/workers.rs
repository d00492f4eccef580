//! Bounded worker pool with a liveness watchdog.
//!
//! Each build phase (metadata, resize) creates its own [`WorkerPool`],
//! submits one task per picture, and calls [`WorkerPool::wait`].
//!
//! ```text
//! submit ──► bounded queue (capacity = workers) ──► N worker threads
//!    │
//!    └──► keepalive ──► watchdog (recv_timeout) ──► on_timeout()
//! ```
//!
//! ## Semantics
//!
//! - **Backpressure**: `submit` blocks while every worker is busy and the
//!   queue is full.
//! - **No ordering**: tasks run in any order relative to each other.
//! - **Fail fast**: the first task error is recorded. After that, queued
//!   tasks are skipped, `submit` returns [`Halted`], and `wait` returns the
//!   recorded error. Work already done is left in place.
//! - **Panics** are not caught: a panicking task kills its worker, and the
//!   panic is re-raised on the submitting thread at the next `submit` that
//!   finds no live worker, or at `wait`.
//! - **Watchdog**: the timer is reset by every `submit`, not by task
//!   completion. If no submission arrives within the interval before `wait`
//!   has joined every worker, the timeout action runs. The default action
//!   logs and aborts the process. A zero interval disables the watchdog.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

type Task<E> = Box<dyn FnOnce() -> Result<(), E> + Send + 'static>;

/// Called once when the watchdog interval elapses without a submission.
pub type TimeoutAction = Arc<dyn Fn(Duration) + Send + Sync>;

/// Capacity of the keepalive channel between `submit` and the watchdog.
const KEEPALIVE_CAPACITY: usize = 10;

/// Default watchdog action: the pool is wedged, so give up on the process.
pub fn abort_on_timeout() -> TimeoutAction {
    Arc::new(|interval| {
        tracing::error!(
            "Watchdog: no work submitted for {}s, a worker is hung. Aborting.",
            interval.as_secs()
        );
        std::process::abort();
    })
}

/// Returned by [`WorkerPool::submit`] once a task has failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("worker pool halted after a task failed")]
pub struct Halted;

/// Pool sizing and supervision settings.
#[derive(Clone)]
pub struct PoolConfig {
    pub workers: usize,
    pub watchdog: Duration,
    pub progress: bool,
    pub on_timeout: TimeoutAction,
}

impl PoolConfig {
    pub fn new(workers: usize, watchdog: Duration) -> Self {
        Self {
            workers: workers.max(1),
            watchdog,
            progress: false,
            on_timeout: abort_on_timeout(),
        }
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_timeout_action(mut self, action: TimeoutAction) -> Self {
        self.on_timeout = action;
        self
    }
}

impl std::fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolConfig")
            .field("workers", &self.workers)
            .field("watchdog", &self.watchdog)
            .field("progress", &self.progress)
            .finish_non_exhaustive()
    }
}

/// Fixed-size pool of worker threads fed from a bounded queue.
pub struct WorkerPool<E: Send + 'static> {
    sender: Option<Sender<Task<E>>>,
    workers: Vec<JoinHandle<()>>,
    keepalive: Option<Sender<()>>,
    watchdog: Option<JoinHandle<()>>,
    halted: Arc<AtomicBool>,
    failure: Arc<Mutex<Option<E>>>,
    progress: ProgressBar,
}

fn progress_bar(label: &str, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::with_template("{msg:>10} [{bar:40}] {pos}/{len}") {
        bar.set_style(style.progress_chars("=> "));
    }
    bar.set_message(label.to_string());
    bar
}

impl<E: Send + 'static> WorkerPool<E> {
    /// Start `config.workers` worker threads and, unless `config.watchdog`
    /// is zero, the watchdog.
    pub fn new(label: &str, config: &PoolConfig) -> std::io::Result<Self> {
        let (sender, receiver) = bounded::<Task<E>>(config.workers);
        let halted = Arc::new(AtomicBool::new(false));
        let failure = Arc::new(Mutex::new(None));
        let progress = progress_bar(label, config.progress);

        let mut pool = Self {
            sender: Some(sender),
            workers: Vec::with_capacity(config.workers),
            keepalive: None,
            watchdog: None,
            halted: Arc::clone(&halted),
            failure: Arc::clone(&failure),
            progress: progress.clone(),
        };

        for i in 0..config.workers {
            let receiver = receiver.clone();
            let halted = Arc::clone(&halted);
            let failure = Arc::clone(&failure);
            let progress = progress.clone();
            let handle = std::thread::Builder::new()
                .name(format!("{label}-{i}"))
                .spawn(move || worker_loop(receiver, halted, failure, progress))?;
            pool.workers.push(handle);
        }

        if !config.watchdog.is_zero() {
            let (keepalive, beats) = bounded::<()>(KEEPALIVE_CAPACITY);
            let interval = config.watchdog;
            let on_timeout = Arc::clone(&config.on_timeout);
            let watchdog = std::thread::Builder::new()
                .name(format!("{label}-watchdog"))
                .spawn(move || watchdog_loop(beats, interval, on_timeout))?;
            pool.keepalive = Some(keepalive);
            pool.watchdog = Some(watchdog);
        }

        tracing::debug!(workers = config.workers, label, "Worker pool started");
        Ok(pool)
    }

    /// Enqueue a task, blocking while the queue is full.
    pub fn submit<F>(&mut self, task: F) -> Result<(), Halted>
    where
        F: FnOnce() -> Result<(), E> + Send + 'static,
    {
        if self.is_halted() {
            return Err(Halted);
        }
        if let Some(keepalive) = &self.keepalive {
            // A full channel already holds a pending reset
            let _ = keepalive.try_send(());
        }
        let Some(sender) = &self.sender else {
            return Err(Halted);
        };
        self.progress.inc_length(1);
        if sender.send(Box::new(task)).is_err() {
            // Every worker is gone, which only happens when they panicked
            self.join_workers();
            return Err(Halted);
        }
        Ok(())
    }

    /// Whether a task has failed.
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Close the queue, drain it, and stop the watchdog.
    ///
    /// Returns the first task error, if any. Re-raises worker panics.
    pub fn wait(mut self) -> Result<(), E> {
        drop(self.sender.take());
        self.join_workers();
        self.stop_watchdog();
        self.progress.finish_and_clear();

        let failure = self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn join_workers(&mut self) {
        let mut panic = None;
        for handle in self.workers.drain(..) {
            if let Err(payload) = handle.join()
                && panic.is_none()
            {
                panic = Some(payload);
            }
        }
        if let Some(payload) = panic {
            self.stop_watchdog();
            std::panic::resume_unwind(payload);
        }
    }

    fn stop_watchdog(&mut self) {
        drop(self.keepalive.take());
        if let Some(handle) = self.watchdog.take() {
            let _ = handle.join();
        }
    }
}

impl<E: Send + 'static> Drop for WorkerPool<E> {
    fn drop(&mut self) {
        drop(self.sender.take());
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        self.stop_watchdog();
    }
}

fn worker_loop<E>(
    receiver: Receiver<Task<E>>,
    halted: Arc<AtomicBool>,
    failure: Arc<Mutex<Option<E>>>,
    progress: ProgressBar,
) {
    for task in receiver.iter() {
        if !halted.load(Ordering::SeqCst)
            && let Err(err) = task()
        {
            let mut slot = failure.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_none() {
                *slot = Some(err);
            }
            halted.store(true, Ordering::SeqCst);
        }
        progress.inc(1);
    }
}

fn watchdog_loop(beats: Receiver<()>, interval: Duration, on_timeout: TimeoutAction) {
    loop {
        match beats.recv_timeout(interval) {
            Ok(()) => continue,
            Err(RecvTimeoutError::Disconnected) => return,
            Err(RecvTimeoutError::Timeout) => {
                on_timeout(interval);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    fn flag_action() -> (TimeoutAction, Arc<AtomicBool>) {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let action: TimeoutAction = Arc::new(move |_| flag.store(true, Ordering::SeqCst));
        (action, fired)
    }

    fn config(workers: usize, watchdog: Duration) -> (PoolConfig, Arc<AtomicBool>) {
        let (action, fired) = flag_action();
        (
            PoolConfig::new(workers, watchdog).with_timeout_action(action),
            fired,
        )
    }

    // =========================================================================
    // Execution
    // =========================================================================

    #[test]
    fn runs_every_task() {
        let (cfg, fired) = config(4, Duration::from_secs(30));
        let mut pool = WorkerPool::<String>::new("test", &cfg).unwrap();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..100 {
            let count = Arc::clone(&count);
            pool.submit(move || {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
        }

        pool.wait().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 100);
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn concurrency_bounded_by_worker_count() {
        let (cfg, _) = config(2, Duration::from_secs(30));
        let mut pool = WorkerPool::<String>::new("test", &cfg).unwrap();
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..12 {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            pool.submit(move || {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(10));
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
        }

        pool.wait().unwrap();
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn empty_pool_waits_cleanly() {
        let (cfg, fired) = config(3, Duration::from_secs(30));
        let pool = WorkerPool::<String>::new("test", &cfg).unwrap();
        pool.wait().unwrap();
        assert!(!fired.load(Ordering::SeqCst));
    }

    // =========================================================================
    // Failure handling
    // =========================================================================

    #[test]
    fn first_error_is_returned_and_rest_skipped() {
        let (cfg, _) = config(1, Duration::from_secs(30));
        let mut pool = WorkerPool::<String>::new("test", &cfg).unwrap();
        let ran_after = Arc::new(AtomicUsize::new(0));

        pool.submit(|| Err("boom".to_string())).unwrap();
        for _ in 0..20 {
            let ran_after = Arc::clone(&ran_after);
            let submitted = pool.submit(move || {
                ran_after.fetch_add(1, Ordering::SeqCst);
                Err("later".to_string())
            });
            if submitted.is_err() {
                break;
            }
        }

        assert_eq!(pool.wait(), Err("boom".to_string()));
        // Single worker runs FIFO, so everything after the failure was skipped
        assert_eq!(ran_after.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn submit_after_failure_is_halted() {
        let (cfg, _) = config(1, Duration::from_secs(30));
        let mut pool = WorkerPool::<String>::new("test", &cfg).unwrap();
        pool.submit(|| Err("boom".to_string())).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while !pool.is_halted() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(pool.submit(|| Ok(())), Err(Halted));
        assert!(pool.wait().is_err());
    }

    #[test]
    #[should_panic(expected = "task exploded")]
    fn task_panic_propagates_on_wait() {
        let (cfg, _) = config(1, Duration::from_secs(30));
        let mut pool = WorkerPool::<String>::new("test", &cfg).unwrap();
        pool.submit(|| panic!("task exploded")).unwrap();
        let _ = pool.wait();
    }

    // =========================================================================
    // Watchdog
    // =========================================================================

    #[test]
    fn watchdog_fires_when_task_outlives_interval() {
        let (cfg, fired) = config(1, Duration::from_millis(50));
        let mut pool = WorkerPool::<String>::new("test", &cfg).unwrap();

        pool.submit(|| {
            std::thread::sleep(Duration::from_millis(400));
            Ok(())
        })
        .unwrap();

        pool.wait().unwrap();
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn watchdog_quiet_with_steady_submissions() {
        let (cfg, fired) = config(2, Duration::from_secs(2));
        let mut pool = WorkerPool::<String>::new("test", &cfg).unwrap();

        for _ in 0..10 {
            pool.submit(|| {
                std::thread::sleep(Duration::from_millis(5));
                Ok(())
            })
            .unwrap();
        }

        pool.wait().unwrap();
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn zero_interval_disables_watchdog() {
        let (cfg, fired) = config(1, Duration::ZERO);
        let mut pool = WorkerPool::<String>::new("test", &cfg).unwrap();

        pool.submit(|| {
            std::thread::sleep(Duration::from_millis(100));
            Ok(())
        })
        .unwrap();

        pool.wait().unwrap();
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn pool_config_clamps_workers() {
        assert_eq!(PoolConfig::new(0, Duration::from_secs(1)).workers, 1);
    }
}
