//! Bounded Ingestion Pipeline
//!
//! This module decouples request admission from store mutation. Handlers
//! enqueue a [`Job`] and return fast; a fixed pool of worker tasks drains the
//! queue and executes the jobs against the store.
//!
//! ## Why Bound Everything?
//!
//! A design that spawns one task per incoming request turns a burst of
//! admissions into an unbounded number of concurrent store mutations:
//! unpredictable lock contention, memory spikes, and no way to say "no".
//! Here two numbers cap the damage regardless of the external request rate:
//!
//! - `workers` caps how many jobs execute against the store at once
//! - `queue_capacity` caps how many admitted jobs wait in memory
//!
//! ## Admission Bound
//!
//! ```text
//!  Submit ──► [ Semaphore: queue_capacity + workers permits ]
//!                │ permit held from admission until the job finishes
//!                ▼
//!            [ FIFO queue ] ──► worker 0 ──► Store
//!                          └──► worker 1 ──► Store
//! ```
//!
//! A single semaphore models "C queued + W in-flight": every admitted job
//! holds one permit until its worker finishes it. With `queue_capacity = 0`
//! and one worker, the first (in-flight) job is admitted and a second
//! submission is turned away: back-pressure with zero buffering.
//!
//! ## Saturation Behavior
//!
//! The admission policy is fixed at construction so caller code stays
//! predictable: [`AdmissionPolicy::Block`] degrades to added latency,
//! [`AdmissionPolicy::Reject`] degrades to an explicit
//! [`SubmitError::Busy`]. Latency-sensitive admission paths should prefer
//! fast rejection over unbounded queuing and map `Busy`/`Timeout` to a
//! 503-equivalent response.

use crate::pipeline::job::{Job, JobError, JobKind};
use crate::store::Store;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What `submit` does when the pipeline is saturated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionPolicy {
    /// Suspend the caller until a slot frees up.
    Block,
    /// Fail immediately with [`SubmitError::Busy`].
    Reject,
}

/// Errors produced by job submission.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum SubmitError {
    /// The queue is full (reject policy). Recoverable: back off and retry,
    /// or surface a "try again" response.
    #[error("ingestion pipeline is at capacity")]
    Busy,

    /// The admission deadline elapsed before a slot freed up (blocking
    /// policy). Recoverable, same as `Busy`.
    #[error("timed out waiting for pipeline capacity")]
    Timeout,

    /// The pipeline has been stopped. Submitting after `stop` is a lifecycle
    /// bug in the caller.
    #[error("ingestion pipeline is closed")]
    Closed,
}

/// Callback invoked when a worker fails a job.
///
/// Receives the job's key (if it targeted one) and the error. The default
/// hook just logs at `warn`.
pub type FailureHook = Arc<dyn Fn(Option<&str>, &JobError) + Send + Sync>;

/// A job that has passed admission, together with the permit it holds.
struct Admitted {
    job: Job,
    admitted_at: Instant,
    /// Released when this struct drops, after the worker is done.
    _permit: OwnedSemaphorePermit,
}

/// The bounded admission queue plus its worker pool.
///
/// Runs from construction until [`stop`](Pipeline::stop); stopping drains
/// the queue (in-flight and queued jobs finish) and then joins the workers.
///
/// # Example
///
/// ```ignore
/// use vitalgrid::pipeline::{AdmissionPolicy, Job, Pipeline};
/// use vitalgrid::store::Store;
/// use bytes::Bytes;
/// use std::sync::Arc;
///
/// let store = Arc::new(Store::new(16));
/// let pipeline = Pipeline::new(Arc::clone(&store), 4, 256, AdmissionPolicy::Reject);
///
/// pipeline.submit(Job::put("vitals:42", Bytes::from("..."))).await?;
/// pipeline.stop().await;
/// ```
pub struct Pipeline {
    /// Sender side of the job queue; taken on `stop`.
    tx: Mutex<Option<mpsc::UnboundedSender<Admitted>>>,

    /// Admission bound: `queue_capacity + workers` permits.
    permits: Arc<Semaphore>,

    policy: AdmissionPolicy,

    /// Worker task handles; drained under this lock on `stop`.
    workers: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl Pipeline {
    /// Creates a pipeline and starts its worker pool.
    ///
    /// # Arguments
    ///
    /// * `store` - The store workers execute against
    /// * `workers` - Fixed number of worker tasks (clamped to at least 1)
    /// * `queue_capacity` - Admitted jobs that may wait beyond the ones
    ///   in-flight; zero means a job is only admitted when a worker is free
    /// * `policy` - What `submit` does when the bound is reached
    pub fn new(
        store: Arc<Store>,
        workers: usize,
        queue_capacity: usize,
        policy: AdmissionPolicy,
    ) -> Self {
        let log_failure: FailureHook = Arc::new(|key: Option<&str>, error: &JobError| {
            warn!(key = key.unwrap_or("<none>"), error = %error, "Ingest job failed");
        });
        Self::with_failure_hook(store, workers, queue_capacity, policy, log_failure)
    }

    /// Creates a pipeline with a custom failure hook.
    ///
    /// The hook runs on the worker task for every failed job; keep it cheap.
    pub fn with_failure_hook(
        store: Arc<Store>,
        workers: usize,
        queue_capacity: usize,
        policy: AdmissionPolicy,
        on_failure: FailureHook,
    ) -> Self {
        let workers = workers.max(1);
        let permits = Arc::new(Semaphore::new(queue_capacity + workers));

        let (tx, rx) = mpsc::unbounded_channel();
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let handles = (0..workers)
            .map(|id| {
                tokio::spawn(worker_loop(
                    id,
                    Arc::clone(&store),
                    Arc::clone(&rx),
                    Arc::clone(&on_failure),
                ))
            })
            .collect();

        info!(
            workers = workers,
            queue_capacity = queue_capacity,
            policy = ?policy,
            "Ingestion pipeline started"
        );

        Self {
            tx: Mutex::new(Some(tx)),
            permits,
            policy,
            workers: tokio::sync::Mutex::new(handles),
        }
    }

    /// The admission policy this pipeline was built with.
    pub fn policy(&self) -> AdmissionPolicy {
        self.policy
    }

    /// Submits a job for execution.
    ///
    /// Under [`AdmissionPolicy::Block`] this suspends until the pipeline has
    /// room; under [`AdmissionPolicy::Reject`] a saturated pipeline fails
    /// immediately with [`SubmitError::Busy`]. After [`stop`](Pipeline::stop)
    /// every submission fails with [`SubmitError::Closed`].
    ///
    /// On success the pipeline owns the job; attach an ack with
    /// [`Job::with_ack`] if you need the execution result.
    pub async fn submit(&self, job: Job) -> Result<(), SubmitError> {
        let tx = self.sender()?;

        let permit = match self.policy {
            AdmissionPolicy::Block => Arc::clone(&self.permits)
                .acquire_owned()
                .await
                .map_err(|_| SubmitError::Closed)?,
            AdmissionPolicy::Reject => {
                Arc::clone(&self.permits)
                    .try_acquire_owned()
                    .map_err(|err| match err {
                        TryAcquireError::NoPermits => SubmitError::Busy,
                        TryAcquireError::Closed => SubmitError::Closed,
                    })?
            }
        };

        self.enqueue(&tx, job, permit)
    }

    /// Submits a job with a bounded wait for admission.
    ///
    /// Blocks for a slot like [`AdmissionPolicy::Block`], but gives up with
    /// [`SubmitError::Timeout`] once `timeout` elapses; the job is not
    /// enqueued in that case. Use this so a persistently saturated pipeline
    /// can never wedge a caller forever.
    pub async fn submit_timeout(&self, job: Job, timeout: Duration) -> Result<(), SubmitError> {
        let tx = self.sender()?;

        let acquire = Arc::clone(&self.permits).acquire_owned();
        let permit = match tokio::time::timeout(timeout, acquire).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(SubmitError::Closed),
            Err(_) => return Err(SubmitError::Timeout),
        };

        self.enqueue(&tx, job, permit)
    }

    fn sender(&self) -> Result<mpsc::UnboundedSender<Admitted>, SubmitError> {
        self.tx
            .lock()
            .unwrap()
            .as_ref()
            .cloned()
            .ok_or(SubmitError::Closed)
    }

    fn enqueue(
        &self,
        tx: &mpsc::UnboundedSender<Admitted>,
        job: Job,
        permit: OwnedSemaphorePermit,
    ) -> Result<(), SubmitError> {
        tx.send(Admitted {
            job,
            admitted_at: Instant::now(),
            _permit: permit,
        })
        .map_err(|_| SubmitError::Closed)
    }

    /// Stops the pipeline.
    ///
    /// No new jobs are accepted; queued and in-flight jobs are drained, then
    /// the workers exit and are joined. Idempotent: a second call returns
    /// once the first drain has finished.
    pub async fn stop(&self) {
        // Closing admission first: take the sender so `submit` fails with
        // Closed, and close the semaphore to wake blocked submitters.
        let tx = self.tx.lock().unwrap().take();
        self.permits.close();
        drop(tx);

        // The lock is held across the joins, so a concurrent `stop` waits
        // for this drain to finish instead of returning early.
        let mut workers = self.workers.lock().await;
        for handle in workers.drain(..) {
            if let Err(err) = handle.await {
                warn!(error = %err, "Ingest worker terminated abnormally");
            }
        }

        info!("Ingestion pipeline stopped");
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("policy", &self.policy)
            .field("available_permits", &self.permits.available_permits())
            .field("closed", &self.tx.lock().unwrap().is_none())
            .finish()
    }
}

/// One worker: dequeue, execute, repeat until the queue closes and drains.
async fn worker_loop(
    id: usize,
    store: Arc<Store>,
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Admitted>>>,
    on_failure: FailureHook,
) {
    debug!(worker = id, "Ingest worker started");

    loop {
        // Hold the receiver lock only while dequeuing, never while executing.
        let admitted = {
            let mut rx = rx.lock().await;
            rx.recv().await
        };

        let Some(admitted) = admitted else {
            // Channel closed and drained: time to exit.
            break;
        };

        execute(id, &store, admitted, &on_failure);
    }

    debug!(worker = id, "Ingest worker exited");
}

/// Executes one admitted job; failures are reported and never escape.
fn execute(worker: usize, store: &Store, admitted: Admitted, on_failure: &FailureHook) {
    let Admitted {
        job,
        admitted_at,
        _permit,
    } = admitted;

    let key_owned = job.key().map(str::to_owned);
    let key = key_owned.as_deref();

    // A job that outlived its deadline in the queue is skipped, not run:
    // executing it would hold shard locks for work nobody is waiting on.
    let expired = job
        .deadline
        .map(|deadline| admitted_at.elapsed() > deadline)
        .unwrap_or(false);

    let result = if expired {
        Err(JobError::DeadlineExceeded)
    } else {
        run_job(store, job.kind)
    };

    match result {
        Ok(()) => {
            if let Some(ack) = job.ack {
                let _ = ack.send(Ok(()));
            }
        }
        Err(error) => {
            debug!(worker = worker, key = key.unwrap_or("<none>"), error = %error, "Job failed");
            on_failure(key, &error);
            if let Some(ack) = job.ack {
                let _ = ack.send(Err(error));
            }
        }
    }
}

fn run_job(store: &Store, kind: JobKind) -> Result<(), JobError> {
    match kind {
        JobKind::Put { key, payload, ttl } => {
            match ttl {
                Some(ttl) => store.set_with_ttl(key, payload, ttl)?,
                None => store.set(key, payload)?,
            };
            Ok(())
        }
        JobKind::Remove { key } => {
            store.delete(&key);
            Ok(())
        }
        JobKind::Apply(f) => f(store),
    }
}
