//! Ingestion Pipeline Module
//!
//! This module provides the bounded admission path in front of the store:
//! a FIFO queue with a hard capacity plus a fixed pool of worker tasks.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Admission boundary                       │
//! │              (HTTP/RPC handler, host code)                  │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │ submit(job): block / reject / timeout
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Pipeline                              │
//! │                                                             │
//! │   [ bounded FIFO queue ]──┬──► worker 0 ──┐                 │
//! │                           ├──► worker 1 ──┼──► Store        │
//! │                           └──► worker W ──┘                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Bounded admission**: at most `queue_capacity` jobs wait, at most
//!   `workers` jobs execute, no matter the external request rate
//! - **Back-pressure**: saturation blocks or rejects, never buffers
//!   unboundedly
//! - **Failure isolation**: one bad job is reported and skipped, the worker
//!   loop keeps going
//! - **Clean drain**: `stop` finishes every admitted job before returning

pub mod ingest;
pub mod job;

// Re-export commonly used types
pub use ingest::{AdmissionPolicy, FailureHook, Pipeline, SubmitError};
pub use job::{ApplyFn, Job, JobAck, JobError, JobKind};
