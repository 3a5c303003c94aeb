//! Data Grid Facade
//!
//! [`DataGrid`] wires the whole engine together from one [`GridConfig`]:
//! the sharded store, the background reaper, the bounded ingestion pipeline,
//! and the pooled payload codec. It is the surface a host process embeds.
//!
//! ## Admission Contract
//!
//! Writes go through [`submit`](DataGrid::submit): a routing layer calling it
//! from a request handler should treat [`SubmitError::Busy`] and
//! [`SubmitError::Timeout`] as retryable capacity signals (a 503-equivalent
//! to its own caller), and [`SubmitError::Closed`] as a lifecycle bug.
//! Reads bypass the pipeline and hit the store directly.

use crate::codec::{CodecError, PayloadCodec};
use crate::config::{ConfigError, GridConfig};
use crate::pipeline::{Job, JobAck, Pipeline, SubmitError};
use crate::store::{Reaper, Store};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the grid's typed ingest helpers.
#[derive(Debug, Error)]
pub enum GridError {
    /// The payload could not be encoded or decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The pipeline refused the submission.
    #[error(transparent)]
    Submit(#[from] SubmitError),
}

/// An embedded data-grid instance: store + reaper + pipeline + codec.
///
/// # Example
///
/// ```ignore
/// use vitalgrid::{DataGrid, GridConfig};
///
/// let grid = DataGrid::new(GridConfig::default())?;
///
/// let ack = grid.put_json("vitals:p42", &observation).await?;
/// ack.wait().await?;
///
/// let observation: Option<Observation> = grid.get_json("vitals:p42")?;
///
/// grid.shutdown().await;
/// ```
#[derive(Debug)]
pub struct DataGrid {
    store: Arc<Store>,
    pipeline: Pipeline,
    reaper: Reaper,
    codec: PayloadCodec,
}

impl DataGrid {
    /// Builds the grid and starts its background tasks.
    ///
    /// Must run inside a tokio runtime: the reaper and the worker pool are
    /// spawned here.
    pub fn new(config: GridConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let store = Arc::new(Store::new(config.shard_count));
        let reaper = Reaper::start(Arc::clone(&store), config.reaper.clone());
        let pipeline = Pipeline::new(
            Arc::clone(&store),
            config.workers,
            config.queue_capacity,
            config.policy,
        );
        let codec = PayloadCodec::new(config.codec_pool_capacity);

        Ok(Self {
            store,
            pipeline,
            reaper,
            codec,
        })
    }

    /// Direct access to the store, for reads and synchronous mutation.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Submits a job through the bounded pipeline.
    pub async fn submit(&self, job: Job) -> Result<(), SubmitError> {
        self.pipeline.submit(job).await
    }

    /// Submits a job with a bounded wait for admission.
    pub async fn submit_timeout(&self, job: Job, timeout: Duration) -> Result<(), SubmitError> {
        self.pipeline.submit_timeout(job, timeout).await
    }

    /// Encodes a value as JSON and submits it for ingestion.
    ///
    /// Returns the acknowledgment handle; `wait` it if the caller needs the
    /// write confirmed, drop it for fire-and-forget.
    pub async fn put_json<T: Serialize>(
        &self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<JobAck, GridError> {
        let payload = self.codec.encode(value)?;
        let (job, ack) = Job::put(key, payload).with_ack();
        self.pipeline.submit(job).await?;
        Ok(ack)
    }

    /// Encodes a value as JSON and submits it for ingestion with a TTL.
    pub async fn put_json_with_ttl<T: Serialize>(
        &self,
        key: impl Into<String>,
        value: &T,
        ttl: Duration,
    ) -> Result<JobAck, GridError> {
        let payload = self.codec.encode(value)?;
        let (job, ack) = Job::put_with_ttl(key, payload, ttl).with_ack();
        self.pipeline.submit(job).await?;
        Ok(ack)
    }

    /// Reads a key and decodes its payload as JSON.
    ///
    /// `Ok(None)` means the key is absent or expired; a present payload that
    /// fails to decode is an error.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CodecError> {
        match self.store.get(key) {
            Some(payload) => self.codec.decode(&payload).map(Some),
            None => Ok(None),
        }
    }

    /// Shuts the grid down: drains the pipeline, then stops the reaper.
    ///
    /// The store itself stays readable; only ingestion and sweeping end.
    pub async fn shutdown(&self) {
        self.pipeline.stop().await;
        self.reaper.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ReaperConfig;
    use bytes::Bytes;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Observation {
        patient: String,
        heart_rate: u32,
    }

    fn small_config() -> GridConfig {
        GridConfig {
            shard_count: 4,
            workers: 2,
            queue_capacity: 16,
            reaper: ReaperConfig::fixed(Duration::from_millis(20)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let config = GridConfig {
            workers: 0,
            ..small_config()
        };
        assert!(DataGrid::new(config).is_err());
    }

    #[tokio::test]
    async fn test_put_and_get_json_round_trip() {
        let grid = DataGrid::new(small_config()).unwrap();

        let obs = Observation {
            patient: "p-42".to_string(),
            heart_rate: 72,
        };

        let ack = grid.put_json("vitals:p42", &obs).await.unwrap();
        ack.wait().await.unwrap();

        let read: Option<Observation> = grid.get_json("vitals:p42").unwrap();
        assert_eq!(read, Some(obs));

        grid.shutdown().await;
    }

    #[tokio::test]
    async fn test_get_json_missing_key() {
        let grid = DataGrid::new(small_config()).unwrap();

        let read: Option<Observation> = grid.get_json("absent").unwrap();
        assert_eq!(read, None);

        grid.shutdown().await;
    }

    #[tokio::test]
    async fn test_ttl_ingest_expires() {
        let grid = DataGrid::new(small_config()).unwrap();

        let obs = Observation {
            patient: "p-1".to_string(),
            heart_rate: 60,
        };

        let ack = grid
            .put_json_with_ttl("vitals:p1", &obs, Duration::from_millis(30))
            .await
            .unwrap();
        ack.wait().await.unwrap();
        assert!(grid.store().exists("vitals:p1"));

        tokio::time::sleep(Duration::from_millis(120)).await;

        // Reaped in the background; and lazily gone either way
        let read: Option<Observation> = grid.get_json("vitals:p1").unwrap();
        assert_eq!(read, None);

        grid.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_closes_ingestion_but_not_reads() {
        let grid = DataGrid::new(small_config()).unwrap();

        let ack = grid.put_json("k", &"value").await.unwrap();
        ack.wait().await.unwrap();

        grid.shutdown().await;

        let result = grid.submit(Job::put("k2", Bytes::from("v"))).await;
        assert_eq!(result, Err(SubmitError::Closed));

        // Reads still work after shutdown
        let read: Option<String> = grid.get_json("k").unwrap();
        assert_eq!(read, Some("value".to_string()));
    }
}
