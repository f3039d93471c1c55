//! Fixed-size worker pool.
//!
//! Workers are long-lived named OS threads draining one shared FIFO channel.
//! Each submission gets its own completion channel, so a [`TaskHandle`]
//! resolves exactly once: to the job's value, to
//! [`PoolError::TaskPanicked`] if the job panicked, or to
//! [`PoolError::TaskLost`] if the job was dropped without running. A
//! panicking job never takes its worker down.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tracing::{debug, info};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Errors produced by the task pool.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The pool was asked for zero workers.
    #[error("task pool needs at least one worker")]
    InvalidSize,
    /// Work was submitted after shutdown began.
    #[error("task pool is stopped")]
    PoolStopped,
    /// The job panicked; carries the panic message.
    #[error("task panicked: {0}")]
    TaskPanicked(String),
    /// The job was dropped before it could report a result.
    #[error("task was dropped before producing a result")]
    TaskLost,
    /// The OS refused to start a worker thread.
    #[error("failed to spawn worker: {0}")]
    Spawn(String),
}

/// Pending result of a submitted job.
#[must_use = "dropping a TaskHandle discards the job's result"]
pub struct TaskHandle<T> {
    result: Receiver<Result<T, PoolError>>,
}

impl<T> TaskHandle<T> {
    /// Block until the job finishes.
    pub fn join(self) -> Result<T, PoolError> {
        self.result.recv().unwrap_or(Err(PoolError::TaskLost))
    }
}

/// Pool of `size` worker threads.
pub struct TaskPool {
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

impl TaskPool {
    /// Spawn `size` workers. `size` must be at least 1.
    pub fn new(size: usize) -> Result<Self, PoolError> {
        if size == 0 {
            return Err(PoolError::InvalidSize);
        }
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        let mut workers = Vec::with_capacity(size);
        for worker_id in 0..size {
            let receiver = Arc::clone(&receiver);
            let handle = thread::Builder::new()
                .name(format!("ontomatch-worker-{worker_id}"))
                .spawn(move || worker_loop(worker_id, receiver))
                .map_err(|err| PoolError::Spawn(err.to_string()))?;
            workers.push(handle);
        }
        info!(workers = size, "task_pool_started");

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            size,
        })
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Queue `work` for execution on some worker.
    pub fn submit<T, F>(&self, work: F) -> Result<TaskHandle<T>, PoolError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (done, result) = mpsc::channel();
        let job: Job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(work))
                .map_err(|payload| PoolError::TaskPanicked(panic_message(&*payload)));
            // The caller may have dropped its handle.
            let _ = done.send(outcome);
        });

        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = guard.as_ref().ok_or(PoolError::PoolStopped)?;
        sender.send(job).map_err(|_| PoolError::PoolStopped)?;
        Ok(TaskHandle { result })
    }

    /// Stop accepting work, run what is already queued, then join every worker.
    ///
    /// Idempotent. Also runs on drop.
    pub fn shutdown(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(sender) = sender else {
            return;
        };
        drop(sender);

        let workers = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        let current = thread::current().id();
        for handle in workers {
            // A job shutting down its own pool cannot join itself.
            if handle.thread().id() == current {
                continue;
            }
            let _ = handle.join();
        }
        info!(workers = self.size, "task_pool_stopped");
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(worker_id: usize, receiver: Arc<Mutex<Receiver<Job>>>) {
    debug!(worker_id, "worker_started");
    loop {
        // The guard is released before the job runs.
        let message = match receiver.lock() {
            Ok(guard) => guard.recv(),
            Err(_) => break,
        };
        match message {
            Ok(job) => job(),
            Err(_) => break,
        }
    }
    debug!(worker_id, "worker_exited");
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
