//! One-shot timers used for the resubmission lock.
//!
//! [`TokioTimer`] runs on the tokio clock. [`ManualTimer`] keeps a virtual
//! clock that only moves when [`ManualTimer::advance`] is called, which lets
//! callers order timer expiry against other events deterministically.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

use anyhow::{Context, Result};
use tokio::{runtime::Handle, task::AbortHandle};
use tracing::debug;

pub type TimerTask = Box<dyn FnOnce() + Send + 'static>;

pub trait TimerService: Send + Sync {
    /// Runs `task` once after `after` has elapsed unless the returned handle is cancelled first.
    fn schedule(&self, after: Duration, task: TimerTask) -> TimerHandle;
}

#[derive(Debug)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
    abort: Option<AbortHandle>,
}

impl TimerHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

pub struct TokioTimer {
    runtime: Handle,
}

impl TokioTimer {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    pub fn try_current() -> Result<Self> {
        let runtime = Handle::try_current().context("tokio timer requires a running runtime")?;
        Ok(Self::new(runtime))
    }
}

impl TimerService for TokioTimer {
    fn schedule(&self, after: Duration, task: TimerTask) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let join = self.runtime.spawn(async move {
            tokio::time::sleep(after).await;
            if !flag.load(Ordering::SeqCst) {
                task();
            }
        });

        TimerHandle {
            cancelled,
            abort: Some(join.abort_handle()),
        }
    }
}

struct PendingTask {
    id: u64,
    deadline: Duration,
    cancelled: Arc<AtomicBool>,
    task: TimerTask,
}

#[derive(Default)]
struct ManualClock {
    now: Duration,
    next_id: u64,
    pending: Vec<PendingTask>,
}

#[derive(Default)]
pub struct ManualTimer {
    clock: Mutex<ManualClock>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since creation.
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Number of scheduled tasks that are neither fired nor cancelled.
    pub fn pending(&self) -> usize {
        self.lock()
            .pending
            .iter()
            .filter(|task| !task.cancelled.load(Ordering::SeqCst))
            .count()
    }

    /// Moves the clock forward and runs every due task in deadline order.
    /// Returns how many tasks ran.
    pub fn advance(&self, by: Duration) -> usize {
        let mut due = {
            let mut clock = self.lock();
            clock.now += by;
            let now = clock.now;
            let (due, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut clock.pending)
                .into_iter()
                .partition(|task| task.deadline <= now);
            clock.pending = rest;
            due
        };
        due.sort_by_key(|task| (task.deadline, task.id));

        let mut fired = 0;
        for pending in due {
            if pending.cancelled.load(Ordering::SeqCst) {
                debug!(timer_id = pending.id, "skipping cancelled timer");
                continue;
            }
            (pending.task)();
            fired += 1;
        }
        fired
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualClock> {
        self.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TimerService for ManualTimer {
    fn schedule(&self, after: Duration, task: TimerTask) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut clock = self.lock();
        let id = clock.next_id;
        clock.next_id += 1;
        let deadline = clock.now + after;
        clock.pending.push(PendingTask {
            id,
            deadline,
            cancelled: Arc::clone(&cancelled),
            task,
        });

        TimerHandle {
            cancelled,
            abort: None,
        }
    }
}

#[cfg(test)]
#[path = "tests/timer_tests.rs"]
mod tests;
