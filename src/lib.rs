//! # vitalgrid - An Embeddable In-Memory Data Grid
//!
//! vitalgrid is a concurrency-safe, memory-resident key-value engine built as
//! a hot-path cache for latency-sensitive services, fronted by a bounded
//! async ingestion pipeline. It is a library, not a network service: a host
//! process embeds it and puts its own routing layer in front.
//!
//! ## Features
//!
//! - **Sharded Storage**: independently-locked shards with stable FNV-1a
//!   routing keep writers out of each other's way
//! - **TTL Support**: entries expire lazily on access and actively via a
//!   background reaper
//! - **Bounded Ingestion**: a fixed worker pool behind a bounded queue caps
//!   concurrent store mutations and buffered work, with block-or-reject
//!   back-pressure at admission
//! - **Allocation Recycling**: lock-free pools reuse the short-lived scratch
//!   buffers that payloads pass through at the store boundary
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                               vitalgrid                                 │
//! │                                                                         │
//! │  ┌─────────────┐    ┌──────────────────────────────────┐                │
//! │  │ Admission   │───>│           Pipeline               │                │
//! │  │ (host code) │    │  bounded queue + W worker tasks  │                │
//! │  └─────────────┘    └───────────────┬──────────────────┘                │
//! │                                     │                                   │
//! │                                     ▼                                   │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────────┐    │
//! │  │ PayloadCodec│    │                  Store                       │    │
//! │  │ (Recycler)  │    │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐ │    │
//! │  │             │    │  │Shard 0 │ │Shard 1 │ │Shard 2 │ │...N    │ │    │
//! │  └─────────────┘    │  │RwLock  │ │RwLock  │ │RwLock  │ │shards  │ │    │
//! │                     │  └────────┘ └────────┘ └────────┘ └────────┘ │    │
//! │                     └──────────────────────────────────────────────┘    │
//! │                                     ▲                                   │
//! │                                     │                                   │
//! │                     ┌───────────────┴─────────────────┐                 │
//! │                     │            Reaper               │                 │
//! │                     │     (Background Tokio Task)     │                 │
//! │                     └─────────────────────────────────┘                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use vitalgrid::{DataGrid, GridConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let grid = DataGrid::new(GridConfig::default())?;
//!
//!     // Writes go through the bounded pipeline
//!     let ack = grid.put_json("vitals:p42", &observation).await?;
//!     ack.wait().await?;
//!
//!     // Reads hit the store directly
//!     let read: Option<Observation> = grid.get_json("vitals:p42")?;
//!
//!     grid.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! The pieces also compose individually: a host that doesn't need JSON
//! payloads can build a [`Store`], a [`Reaper`], and a [`Pipeline`] by hand;
//! see each module.
//!
//! ## Module Overview
//!
//! - [`store`]: sharded store with TTL support and the expiry reaper
//! - [`pipeline`]: bounded admission queue and worker pool
//! - [`recycler`]: lock-free pool for short-lived scratch objects
//! - [`codec`]: JSON payload codec running over recycled buffers
//! - [`config`]: construction-time configuration
//! - [`grid`]: the facade bundling everything above
//!
//! ## Design Highlights
//!
//! ### Sharded Locking
//!
//! One map behind one lock turns every concurrent writer into a queue. The
//! store splits the keyspace across N independently-locked shards; a key's
//! shard is a pure function of the key, fixed at construction, so operations
//! on a single key are linearizable under its shard lock while unrelated
//! keys never contend.
//!
//! ### Bounded Concurrency
//!
//! Spawning one task per incoming request lets a burst create unbounded
//! concurrent mutations. The pipeline replaces that with W workers reading
//! from a bounded queue: W caps in-flight mutations, the queue caps buffered
//! ones, and admission either blocks or rejects. It never buffers without
//! limit.
//!
//! ### Lazy + Active Expiry
//!
//! Expired entries are removed at read time (so a stale value is never
//! observable) and by the background reaper (so write-once-read-never keys
//! still get reclaimed).

pub mod codec;
pub mod config;
pub mod grid;
pub mod pipeline;
pub mod recycler;
pub mod store;

// Re-export commonly used types for convenience
pub use codec::{CodecError, PayloadCodec};
pub use config::{ConfigError, GridConfig};
pub use grid::{DataGrid, GridError};
pub use pipeline::{AdmissionPolicy, Job, JobAck, JobError, Pipeline, SubmitError};
pub use recycler::{Recycle, Recycler};
pub use store::{start_reaper, Entry, Reaper, ReaperConfig, Store, StoreError};

/// Version of vitalgrid
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
