//! Bounded worker pool for blocking jobs (remote song resolution).
//!
//! `submit` returns a [`TaskHandle`] immediately. The handle is filled exactly once by the
//! worker that ran the job; the owner may poll it, block on it, or cancel it before a
//! worker picks it up.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Sender};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Why a task produced no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("task cancelled")]
    Cancelled,
    #[error("task panicked")]
    Panicked,
}

enum Slot<T> {
    Pending,
    Done(Result<T, TaskError>),
    Taken,
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
    cancelled: AtomicBool,
}

impl<T> Shared<T> {
    fn complete(&self, result: Result<T, TaskError>) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(*slot, Slot::Pending) {
            *slot = Slot::Done(result);
        }
        self.ready.notify_all();
    }
}

/// Awaitable, cancellable result of a submitted job.
pub struct TaskHandle<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("finished", &self.is_finished())
            .field("cancelled", &self.shared.cancelled.load(Ordering::Relaxed))
            .finish()
    }
}

impl<T> TaskHandle<T> {
    fn pending() -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot::Pending),
                ready: Condvar::new(),
                cancelled: AtomicBool::new(false),
            }),
        }
    }

    /// A handle that is already complete; used when the pool is gone.
    fn completed(result: Result<T, TaskError>) -> Self {
        let handle = Self::pending();
        handle.shared.complete(result);
        handle
    }

    /// True once a result (or cancellation) is available.
    pub fn is_finished(&self) -> bool {
        let slot = self.shared.slot.lock().unwrap_or_else(PoisonError::into_inner);
        !matches!(*slot, Slot::Pending)
    }

    /// Take the result if the job has finished. Returns `None` while pending and after the
    /// result has already been taken.
    pub fn try_take(&self) -> Option<Result<T, TaskError>> {
        let mut slot = self.shared.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Done(result) => Some(result),
            other => {
                *slot = other;
                None
            }
        }
    }

    /// Block until the job finishes and take its result.
    ///
    /// Returns `Cancelled` if the result was already taken by another holder.
    pub fn wait(&self) -> Result<T, TaskError> {
        let mut slot = self.shared.slot.lock().unwrap_or_else(PoisonError::into_inner);
        while matches!(*slot, Slot::Pending) {
            slot = self
                .shared
                .ready
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Done(result) => result,
            _ => Err(TaskError::Cancelled),
        }
    }

    /// Ask the pool to skip the job if no worker has started it yet.
    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::Relaxed);
    }
}

/// Fixed set of worker threads pulling jobs from a shared channel.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `threads` workers (at least one) named `<name>-<n>`.
    pub fn new(name: &str, threads: usize) -> std::io::Result<Self> {
        let (sender, receiver) = unbounded::<Job>();
        let mut workers = Vec::new();
        for idx in 0..threads.max(1) {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("{name}-{idx}"))
                .spawn(move || {
                    for job in receiver {
                        job();
                    }
                })?;
            workers.push(handle);
        }
        tracing::debug!(name, threads = workers.len(), "worker pool started");
        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    /// Queue a job and return its handle without waiting.
    pub fn submit<T, F>(&self, job: F) -> TaskHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let Some(sender) = self.sender.as_ref() else {
            return TaskHandle::completed(Err(TaskError::Cancelled));
        };

        let handle = TaskHandle::pending();
        let shared = Arc::clone(&handle.shared);
        let wrapped: Job = Box::new(move || {
            if shared.cancelled.load(Ordering::Relaxed) {
                shared.complete(Err(TaskError::Cancelled));
                return;
            }
            let result = panic::catch_unwind(AssertUnwindSafe(job)).map_err(|_| TaskError::Panicked);
            shared.complete(result);
        });

        if sender.send(wrapped).is_err() {
            return TaskHandle::completed(Err(TaskError::Cancelled));
        }
        handle
    }

    /// Stop accepting jobs and join the workers once the queue drains.
    pub fn shutdown(&mut self) {
        self.sender.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::warn!("worker thread exited with a panic");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
