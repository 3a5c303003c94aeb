//! Sharded Store Module
//!
//! This module provides the key-value core of vitalgrid: a concurrency-safe,
//! sharded in-memory store with TTL support and a background expiry reaper.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Store                               │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │...N     │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ shards  │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │
//!              ┌─────────────┴─────────────┐
//!              │         Reaper            │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Sharded Storage**: independent shard locks bound contention to 1/N
//!   of the keyspace
//! - **Stable Routing**: FNV-1a shard assignment, fixed at construction
//! - **TTL Support**: entries can carry an absolute expiration instant
//! - **Lazy Expiry**: expired entries are removed on access
//! - **Active Expiry**: the reaper reclaims entries nothing reads anymore
//!
//! ## Example
//!
//! ```
//! use vitalgrid::store::Store;
//! use bytes::Bytes;
//! use std::time::Duration;
//!
//! let store = Store::new(16);
//!
//! // Basic operations
//! store.set("name", Bytes::from("vitalgrid")).unwrap();
//! assert_eq!(store.get("name"), Some(Bytes::from("vitalgrid")));
//!
//! // Set with TTL
//! store
//!     .set_with_ttl("session", Bytes::from("token123"), Duration::from_secs(3600))
//!     .unwrap();
//! ```

pub mod engine;
pub mod reaper;

// Re-export commonly used types
pub use engine::{Entry, Store, StoreError, StoreStats, DEFAULT_SHARD_COUNT};
pub use reaper::{start_reaper, Reaper, ReaperConfig};
