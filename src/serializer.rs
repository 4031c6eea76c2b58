//! Single-worker FIFO execution context
//!
//! A [`Serializer`] moves a resource onto one dedicated worker thread and runs
//! submitted jobs against it strictly one at a time, in submission order.
//!
//! Architecture:
//! 1. Callers wrap an operation in a closure `FnOnce(&mut S)`
//! 2. The closure is sent over an unbounded mpsc channel (never blocks the caller)
//! 3. The worker thread receives jobs in FIFO order and runs each to completion
//! 4. Blocking callers get their result back over a oneshot channel
//!
//! Because only the worker ever touches the resource, the resource itself needs
//! no locking, and a job submitted after another observes its effects.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum SerializerError {
    #[error("Serializer worker has stopped")]
    Stopped,

    #[error("Job panicked before producing a result")]
    JobPanicked,

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SerializerError>;

type Job<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

/// Cloneable submission handle for a running worker
pub struct Submitter<S> {
    tx: mpsc::UnboundedSender<Job<S>>,
}

impl<S> Clone for Submitter<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<S: 'static> Submitter<S> {
    /// Fire-and-forget: enqueue `job` and return immediately
    pub fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.tx
            .send(Box::new(job))
            .map_err(|_| SerializerError::Stopped)
    }

    /// Enqueue `job` and wait for its result
    ///
    /// Only the jobs ahead of this one in the queue are waited for.
    pub async fn call<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut S) -> T + Send + 'static,
        T: Send + 'static,
    {
        let reply_rx = self.enqueue_call(job)?;
        reply_rx.await.map_err(|_| SerializerError::JobPanicked)
    }

    fn enqueue_call<F, T>(&self, job: F) -> Result<oneshot::Receiver<T>>
    where
        F: FnOnce(&mut S) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.submit(move |resource| {
            // Receiver may have gone away if the caller was cancelled
            let _ = reply_tx.send(job(resource));
        })?;
        Ok(reply_rx)
    }

    /// Handle that does not keep the worker alive
    pub fn downgrade(&self) -> WeakSubmitter<S> {
        WeakSubmitter {
            tx: self.tx.downgrade(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Weak counterpart of [`Submitter`]
pub struct WeakSubmitter<S> {
    tx: mpsc::WeakUnboundedSender<Job<S>>,
}

impl<S> Clone for WeakSubmitter<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<S: 'static> WeakSubmitter<S> {
    /// `None` once the owning [`Serializer`] has been dropped
    pub fn upgrade(&self) -> Option<Submitter<S>> {
        self.tx.upgrade().map(|tx| Submitter { tx })
    }

    /// Like [`Submitter::call`], but holds the strong handle only while enqueueing
    ///
    /// The owner can therefore shut the worker down while this call is waiting;
    /// the job still runs as part of the drain.
    pub async fn call<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut S) -> T + Send + 'static,
        T: Send + 'static,
    {
        let reply_rx = {
            let submitter = self.upgrade().ok_or(SerializerError::Stopped)?;
            submitter.enqueue_call(job)?
        };
        reply_rx.await.map_err(|_| SerializerError::JobPanicked)
    }
}

/// Owner of the worker thread
///
/// Dropping the serializer closes the queue; the worker drains every job that
/// was already submitted, drops the resource, and is joined.
pub struct Serializer<S> {
    submitter: Option<Submitter<S>>,
    worker: Option<JoinHandle<()>>,
}

impl<S: Send + 'static> Serializer<S> {
    /// Spawn the worker thread and hand it `resource`
    pub fn spawn(name: &str, resource: S) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel::<Job<S>>();

        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run_worker(resource, rx))?;

        debug!(worker = name, "Serializer worker spawned");

        Ok(Self {
            submitter: Some(Submitter { tx }),
            worker: Some(worker),
        })
    }

    pub fn submitter(&self) -> Result<&Submitter<S>> {
        self.submitter.as_ref().ok_or(SerializerError::Stopped)
    }

    pub fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.submitter()?.submit(job)
    }

    pub async fn call<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut S) -> T + Send + 'static,
        T: Send + 'static,
    {
        self.submitter()?.call(job).await
    }

    pub fn downgrade(&self) -> Result<WeakSubmitter<S>> {
        Ok(self.submitter()?.downgrade())
    }
}

impl<S> Drop for Serializer<S> {
    fn drop(&mut self) {
        // Closing the channel lets the worker finish the backlog and exit
        self.submitter.take();

        if let Some(worker) = self.worker.take() {
            if worker.thread().id() == thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                error!("Serializer worker terminated abnormally");
            }
        }
    }
}

fn run_worker<S>(mut resource: S, mut rx: mpsc::UnboundedReceiver<Job<S>>) {
    let mut processed: u64 = 0;

    while let Some(job) = rx.blocking_recv() {
        if panic::catch_unwind(AssertUnwindSafe(|| job(&mut resource))).is_err() {
            error!("Serialized job panicked, continuing with next job");
        }
        processed += 1;
    }

    debug!(processed, "Serializer queue drained, worker exiting");
}
