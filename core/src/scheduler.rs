//! Deferred one-shot actions.
//!
//! RULE: A cancelled handle never fires. Cancellation is idempotent and
//! safe to call after the action already ran.
//!
//! `TokioScheduler` backs the live engine: one sleeping task per action,
//! aborted on cancel. `ManualScheduler` queues actions against a clock and
//! fires them only when asked, for tests and the headless runner.

use crate::{clock::Clock, types::Timestamp};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};
use uuid::Uuid;

pub type ScheduledTask = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone)]
pub struct ScheduleHandle {
    id:        Uuid,
    cancelled: Arc<AtomicBool>,
    abort:     Option<tokio::task::AbortHandle>,
}

impl ScheduleHandle {
    fn new(cancelled: Arc<AtomicBool>, abort: Option<tokio::task::AbortHandle>) -> Self {
        Self { id: Uuid::new_v4(), cancelled, abort }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

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

pub trait Scheduler: Send + Sync {
    /// Run `task` once, `delay_secs` from now, unless the handle is cancelled first.
    fn schedule(&self, delay_secs: u64, task: ScheduledTask) -> ScheduleHandle;
}

// ── Tokio ──────────────────────────────────────────────────────────

pub struct TokioScheduler {
    runtime: tokio::runtime::Handle,
}

impl TokioScheduler {
    pub fn new(runtime: tokio::runtime::Handle) -> Self {
        Self { runtime }
    }

    /// Bind to the runtime the caller is running on, if any.
    pub fn current() -> Option<Self> {
        tokio::runtime::Handle::try_current().ok().map(Self::new)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay_secs: u64, task: ScheduledTask) -> ScheduleHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let join = self.runtime.spawn(async move {
            tokio::time::sleep(Duration::from_secs(delay_secs)).await;
            if flag.load(Ordering::SeqCst) {
                return;
            }
            // The action takes actor locks and touches the store.
            if let Err(e) = tokio::task::spawn_blocking(task).await {
                log::warn!("scheduled action panicked or was aborted: {e}");
            }
        });
        ScheduleHandle::new(cancelled, Some(join.abort_handle()))
    }
}

// ── Manual ─────────────────────────────────────────────────────────

struct PendingTask {
    due:    Timestamp,
    seq:    u64,
    handle: ScheduleHandle,
    task:   ScheduledTask,
}

/// Fires due actions on `run_due`, in due-time then submission order.
pub struct ManualScheduler {
    clock:   Arc<dyn Clock>,
    pending: Mutex<Vec<PendingTask>>,
    seq:     AtomicU64,
}

impl ManualScheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            pending: Mutex::new(Vec::new()),
            seq: AtomicU64::new(0),
        }
    }

    /// Run every action due at or before `clock.now()`. Returns how many fired.
    pub fn run_due(&self) -> usize {
        let now = self.clock.now();
        let mut due: Vec<PendingTask> = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            pending.retain(|p| !p.handle.is_cancelled());
            let (ready, waiting): (Vec<_>, Vec<_>) =
                pending.drain(..).partition(|p| p.due <= now);
            *pending = waiting;
            ready
        };
        due.sort_by_key(|p| (p.due, p.seq));

        // Run outside the queue lock: actions may schedule follow-ups.
        let mut fired = 0;
        for p in due {
            if p.handle.is_cancelled() {
                continue;
            }
            (p.task)();
            fired += 1;
        }
        fired
    }

    /// Live (not cancelled) actions still queued.
    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|p| !p.handle.is_cancelled())
            .count()
    }

    /// Due time of the earliest live action.
    pub fn next_due(&self) -> Option<Timestamp> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|p| !p.handle.is_cancelled())
            .map(|p| p.due)
            .min()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay_secs: u64, task: ScheduledTask) -> ScheduleHandle {
        let handle = ScheduleHandle::new(Arc::new(AtomicBool::new(false)), None);
        let entry = PendingTask {
            due:    self.clock.now() + delay_secs as i64,
            seq:    self.seq.fetch_add(1, Ordering::SeqCst),
            handle: handle.clone(),
            task,
        };
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
        handle
    }
}
