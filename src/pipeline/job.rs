//! Ingestion Jobs
//!
//! A [`Job`] carries everything a worker needs to perform one store mutation:
//! the operation itself, an optional acknowledgment channel for callers that
//! want a synchronous result, and an optional deadline measured from the
//! moment the job was admitted.
//!
//! Once a job is accepted by the pipeline it is owned by the pipeline until a
//! worker finishes with it; the submitting side keeps only the acknowledgment
//! handle, if it asked for one.

use crate::store::{Store, StoreError};
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;

/// A boxed mutation to run against the store from inside a worker.
pub type ApplyFn = Box<dyn FnOnce(&Store) -> Result<(), JobError> + Send + 'static>;

/// Errors produced while a worker executes a single job.
///
/// A job failure is isolated to that job: it is reported through the failure
/// hook and the job's acknowledgment channel, and the worker moves on.
#[derive(Debug, Clone, Error)]
pub enum JobError {
    /// The store rejected the mutation.
    #[error("store rejected job: {0}")]
    Store(#[from] StoreError),

    /// The job's deadline elapsed before a worker could execute it.
    #[error("job deadline elapsed before execution")]
    DeadlineExceeded,

    /// Application-level processing failed (e.g., malformed payload).
    #[error("job execution failed: {0}")]
    Failed(String),
}

/// The operation a job performs.
pub enum JobKind {
    /// Store a payload under a key, with an optional TTL.
    Put {
        key: String,
        payload: Bytes,
        ttl: Option<Duration>,
    },
    /// Delete a key.
    Remove { key: String },
    /// Run an arbitrary mutation against the store.
    ///
    /// This routes host-defined work through the same admission bound as
    /// regular writes.
    Apply(ApplyFn),
}

impl std::fmt::Debug for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::Put { key, payload, ttl } => f
                .debug_struct("Put")
                .field("key", key)
                .field("payload_len", &payload.len())
                .field("ttl", ttl)
                .finish(),
            JobKind::Remove { key } => f.debug_struct("Remove").field("key", key).finish(),
            JobKind::Apply(_) => f.debug_struct("Apply").finish_non_exhaustive(),
        }
    }
}

/// One unit of work for the ingestion pipeline.
#[derive(Debug)]
pub struct Job {
    pub(crate) kind: JobKind,
    pub(crate) ack: Option<oneshot::Sender<Result<(), JobError>>>,
    pub(crate) deadline: Option<Duration>,
}

impl Job {
    /// A job that stores `payload` under `key` without expiry.
    pub fn put(key: impl Into<String>, payload: Bytes) -> Self {
        Self {
            kind: JobKind::Put {
                key: key.into(),
                payload,
                ttl: None,
            },
            ack: None,
            deadline: None,
        }
    }

    /// A job that stores `payload` under `key` with a TTL.
    pub fn put_with_ttl(key: impl Into<String>, payload: Bytes, ttl: Duration) -> Self {
        Self {
            kind: JobKind::Put {
                key: key.into(),
                payload,
                ttl: Some(ttl),
            },
            ack: None,
            deadline: None,
        }
    }

    /// A job that deletes `key`.
    pub fn remove(key: impl Into<String>) -> Self {
        Self {
            kind: JobKind::Remove { key: key.into() },
            ack: None,
            deadline: None,
        }
    }

    /// A job that runs an arbitrary mutation against the store.
    pub fn apply<F>(f: F) -> Self
    where
        F: FnOnce(&Store) -> Result<(), JobError> + Send + 'static,
    {
        Self {
            kind: JobKind::Apply(Box::new(f)),
            ack: None,
            deadline: None,
        }
    }

    /// Attaches a deadline, measured from admission.
    ///
    /// A worker that dequeues this job after the deadline has elapsed skips
    /// it and reports [`JobError::DeadlineExceeded`] instead of executing it.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Attaches an acknowledgment channel.
    ///
    /// The returned handle resolves once a worker has finished (or failed)
    /// the job. Without it, the job is fire-and-forget.
    pub fn with_ack(mut self) -> (Self, JobAck) {
        let (tx, rx) = oneshot::channel();
        self.ack = Some(tx);
        (self, JobAck { rx })
    }

    /// The key this job targets, if it targets one.
    pub fn key(&self) -> Option<&str> {
        match &self.kind {
            JobKind::Put { key, .. } | JobKind::Remove { key } => Some(key),
            JobKind::Apply(_) => None,
        }
    }
}

/// Caller-side handle for a job's result.
#[derive(Debug)]
pub struct JobAck {
    rx: oneshot::Receiver<Result<(), JobError>>,
}

impl JobAck {
    /// Waits for the job to be executed.
    ///
    /// Resolves to the worker's result, or to [`JobError::Failed`] if the
    /// pipeline dropped the job without executing it (e.g., a worker
    /// panicked).
    pub async fn wait(self) -> Result<(), JobError> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(JobError::Failed("job was dropped before execution".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_key() {
        assert_eq!(Job::put("k", Bytes::from("v")).key(), Some("k"));
        assert_eq!(Job::remove("k").key(), Some("k"));
        assert_eq!(Job::apply(|_| Ok(())).key(), None);
    }

    #[test]
    fn test_debug_does_not_dump_payload() {
        let job = Job::put("k", Bytes::from("confidential"));
        let rendered = format!("{:?}", job);
        assert!(rendered.contains("payload_len"));
        assert!(!rendered.contains("confidential"));
    }

    #[tokio::test]
    async fn test_ack_reports_drop_as_failure() {
        let (job, ack) = Job::put("k", Bytes::from("v")).with_ack();
        drop(job);

        assert!(matches!(ack.wait().await, Err(JobError::Failed(_))));
    }
}
