//! Update Scheduler
//!
//! The scheduler batches pending effect re-runs into a single flush.
//!
//! # Algorithm
//!
//! 1. `queue_job` appends a job unless an identical job (same [`JobId`]) is
//!    still waiting to run in the current batch.
//! 2. The first job of a batch schedules one `FlushJobs` microtask.
//! 3. The flush runs jobs in insertion order, reading the queue by live
//!    index, so jobs queued while draining run in the same flush.
//! 4. When the flush ends, normally or by unwinding, the queue is cleared
//!    and the flushing state reset. Only a flush that completed resolves the
//!    `next_tick` handles waiting on it.
//!
//! # Microtasks
//!
//! There is no ambient event loop. Microtasks sit in an explicit FIFO and run
//! when the host calls [`Scheduler::run_microtasks`], typically right after
//! it finished handling an input event.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{Result, RuntimeError};
use crate::reactive::{EffectId, ReactiveEffect};

/// Identity used for queue deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobId {
    /// The job re-runs this effect.
    Effect(EffectId),
    /// A free-standing task.
    Task(u64),
}

impl JobId {
    fn next_task() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        JobId::Task(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A unit of deferred work. Clones share identity.
#[derive(Clone)]
pub struct Job {
    id: JobId,
    run: Arc<dyn Fn() + Send + Sync>,
}

impl Job {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            id: JobId::next_task(),
            run: Arc::new(f),
        }
    }

    /// A job that re-runs `effect`, skipped if the effect was stopped
    /// before the flush reached it.
    ///
    /// All jobs for the same effect share one identity, so an effect queued
    /// several times in a batch runs once.
    pub fn for_effect<T: 'static>(effect: &ReactiveEffect<T>) -> Self {
        let effect = effect.clone();
        Self {
            id: JobId::Effect(effect.id()),
            run: Arc::new(move || {
                if effect.is_active() {
                    effect.run();
                }
            }),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn run(&self) {
        (self.run)()
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Job").field(&self.id).finish()
    }
}

type Callback = Box<dyn FnOnce() + Send>;

enum Microtask {
    FlushJobs,
    Callback(Callback),
}

/// A `next_tick` registration waiting for the current flush.
struct Waiter {
    callback: Option<Callback>,
    done: oneshot::Sender<()>,
}

impl Waiter {
    fn into_microtask(self) -> Microtask {
        Microtask::Callback(Box::new(move || {
            if let Some(callback) = self.callback {
                callback();
            }
            let _ = self.done.send(());
        }))
    }
}

#[derive(Default)]
struct QueueState {
    queue: Vec<Job>,
    flush_index: usize,
    /// Set when the flush microtask is scheduled, cleared when it ends.
    flush_pending: bool,
    draining: bool,
    after_flush: Vec<Waiter>,
    run_counts: HashMap<JobId, usize>,
}

/// Job queue plus microtask queue.
pub struct Scheduler {
    state: Mutex<QueueState>,
    microtasks: Mutex<VecDeque<Microtask>>,
    max_recursion: usize,
}

impl Scheduler {
    pub fn new(max_recursion: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            microtasks: Mutex::new(VecDeque::new()),
            max_recursion,
        }
    }

    /// Queue `job` for the next flush.
    pub fn queue_job(&self, job: Job) {
        let mut state = self.state.lock();

        let start = state.flush_index;
        if state.queue[start..].iter().any(|queued| queued.id == job.id) {
            return;
        }
        state.queue.push(job);

        if !state.flush_pending {
            state.flush_pending = true;
            self.microtasks.lock().push_back(Microtask::FlushJobs);
        }
    }

    /// Drop a queued job that has not run yet. Returns whether one was
    /// removed.
    pub fn invalidate_job(&self, id: JobId) -> bool {
        let mut state = self.state.lock();
        let start = state.flush_index;
        match state.queue[start..].iter().position(|queued| queued.id == id) {
            Some(offset) => {
                state.queue.remove(start + offset);
                true
            }
            None => false,
        }
    }

    /// Jobs queued but not yet run.
    pub fn pending_jobs(&self) -> usize {
        let state = self.state.lock();
        state.queue.len() - state.flush_index
    }

    /// Whether a flush is scheduled or in progress.
    pub fn is_flush_pending(&self) -> bool {
        self.state.lock().flush_pending
    }

    /// Register a continuation for after the pending flush.
    ///
    /// With no flush pending, the handle resolves on the next microtask.
    pub fn next_tick(&self, callback: Option<Callback>) -> NextTick {
        let (done, rx) = oneshot::channel();
        let waiter = Waiter { callback, done };

        {
            let mut state = self.state.lock();
            if state.flush_pending {
                state.after_flush.push(waiter);
                return NextTick::new(rx);
            }
        }

        self.microtasks.lock().push_back(waiter.into_microtask());
        NextTick::new(rx)
    }

    /// Drain the microtask queue, including microtasks queued while draining.
    ///
    /// Returns the number of microtasks run. A panicking job or callback
    /// propagates; microtasks behind it stay queued.
    pub fn run_microtasks(&self) -> usize {
        let mut ran = 0;
        loop {
            let Some(task) = self.microtasks.lock().pop_front() else {
                break;
            };
            ran += 1;
            match task {
                Microtask::FlushJobs => self.flush(),
                Microtask::Callback(callback) => callback(),
            }
        }
        ran
    }

    /// Run every queued job now.
    pub fn flush(&self) {
        {
            let mut state = self.state.lock();
            if state.draining {
                return;
            }
            state.draining = true;
            debug!(jobs = state.queue.len(), "flushing jobs");
        }

        let guard = FlushGuard { scheduler: self };
        let mut ran = 0usize;

        loop {
            let job = {
                let mut state = self.state.lock();
                if state.flush_index >= state.queue.len() {
                    break;
                }
                let job = state.queue[state.flush_index].clone();
                state.flush_index += 1;

                let count = state.run_counts.entry(job.id).or_insert(0);
                *count += 1;
                if *count > self.max_recursion {
                    warn!(
                        job = ?job.id,
                        limit = self.max_recursion,
                        "maximum recursive updates exceeded, skipping job"
                    );
                    continue;
                }
                job
            };

            job.run();
            ran += 1;
        }

        drop(guard);
        debug!(ran, "flush finished");
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending_jobs", &self.pending_jobs())
            .field("flush_pending", &self.is_flush_pending())
            .field("microtasks", &self.microtasks.lock().len())
            .finish()
    }
}

/// Resets the queue when a flush ends, including by unwinding.
struct FlushGuard<'a> {
    scheduler: &'a Scheduler,
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        let waiters = {
            let mut state = self.scheduler.state.lock();
            state.queue.clear();
            state.flush_index = 0;
            state.flush_pending = false;
            state.draining = false;
            state.run_counts.clear();
            std::mem::take(&mut state.after_flush)
        };

        // An aborted flush drops its waiters, which rejects their handles.
        if std::thread::panicking() {
            return;
        }

        let mut microtasks = self.scheduler.microtasks.lock();
        microtasks.extend(waiters.into_iter().map(Waiter::into_microtask));
    }
}

/// Handle returned by `next_tick`.
///
/// Resolves with `Ok(())` once the flush it waits on completed and its
/// continuation (if any) ran, or with [`RuntimeError::FlushAborted`] if that
/// flush panicked. It can be awaited on any executor or polled without one
/// through [`is_resolved`](Self::is_resolved).
#[derive(Debug)]
pub struct NextTick {
    rx: oneshot::Receiver<()>,
    outcome: Option<bool>,
}

impl NextTick {
    fn new(rx: oneshot::Receiver<()>) -> Self {
        Self { rx, outcome: None }
    }

    fn check(&mut self) -> Option<bool> {
        if self.outcome.is_none() {
            match self.rx.try_recv() {
                Ok(()) => self.outcome = Some(true),
                Err(oneshot::error::TryRecvError::Closed) => self.outcome = Some(false),
                Err(oneshot::error::TryRecvError::Empty) => {}
            }
        }
        self.outcome
    }

    /// Whether the handle has resolved successfully.
    pub fn is_resolved(&mut self) -> bool {
        self.check() == Some(true)
    }

    /// Whether the flush this handle waited on panicked.
    pub fn is_aborted(&mut self) -> bool {
        self.check() == Some(false)
    }
}

impl Future for NextTick {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(ok) = self.outcome {
            return Poll::Ready(if ok { Ok(()) } else { Err(RuntimeError::FlushAborted) });
        }

        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(())) => {
                self.outcome = Some(true);
                Poll::Ready(Ok(()))
            }
            Poll::Ready(Err(_)) => {
                self.outcome = Some(false);
                Poll::Ready(Err(RuntimeError::FlushAborted))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
