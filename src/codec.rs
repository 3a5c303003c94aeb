//! Payload Codec
//!
//! JSON encoding for values crossing the store boundary. Serialization runs
//! through a recycled scratch buffer: the scratch is borrowed, filled, copied
//! into an exact-size `Bytes`, and returned to the pool, so a steady-state
//! ingest path allocates only the final frozen payload per record.

use crate::recycler::Recycler;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Errors produced while encoding or decoding payloads.
///
/// Both variants are input errors: they are rejected synchronously and never
/// retried automatically.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The value could not be serialized to JSON.
    #[error("failed to encode payload: {0}")]
    Encode(#[source] serde_json::Error),

    /// The stored bytes are not valid JSON for the requested type.
    #[error("failed to decode payload: {0}")]
    Decode(#[source] serde_json::Error),
}

/// JSON codec with pooled scratch buffers.
pub struct PayloadCodec {
    scratch: Recycler<Vec<u8>>,
}

impl PayloadCodec {
    /// Creates a codec retaining at most `pool_capacity` idle scratch
    /// buffers.
    pub fn new(pool_capacity: usize) -> Self {
        Self {
            scratch: Recycler::new(pool_capacity),
        }
    }

    /// Serializes a value into an immutable payload.
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<Bytes, CodecError> {
        let mut buf = self.scratch.get();

        let result = serde_json::to_writer(&mut buf, value)
            .map(|_| Bytes::copy_from_slice(&buf))
            .map_err(CodecError::Encode);

        self.scratch.put(buf);
        result
    }

    /// Deserializes a payload read back out of the store.
    pub fn decode<T: DeserializeOwned>(&self, payload: &Bytes) -> Result<T, CodecError> {
        serde_json::from_slice(payload).map_err(CodecError::Decode)
    }
}

impl Default for PayloadCodec {
    fn default() -> Self {
        Self::new(64)
    }
}

impl std::fmt::Debug for PayloadCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadCodec")
            .field("idle_buffers", &self.scratch.idle())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Observation {
        patient: String,
        heart_rate: u32,
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let codec = PayloadCodec::new(4);
        let obs = Observation {
            patient: "p-42".to_string(),
            heart_rate: 72,
        };

        let payload = codec.encode(&obs).unwrap();
        let decoded: Observation = codec.decode(&payload).unwrap();

        assert_eq!(decoded, obs);
    }

    #[test]
    fn test_scratch_buffer_is_recycled() {
        let codec = PayloadCodec::new(4);

        codec.encode(&"first").unwrap();
        assert_eq!(codec.scratch.idle(), 1);

        // The second encode reuses the pooled scratch and returns it again
        let payload = codec.encode(&"second").unwrap();
        assert_eq!(codec.scratch.idle(), 1);
        assert_eq!(payload, Bytes::from("\"second\""));
    }

    #[test]
    fn test_decode_rejects_malformed_payload() {
        let codec = PayloadCodec::new(4);
        let payload = Bytes::from("not json at all");

        let result: Result<Observation, _> = codec.decode(&payload);
        assert!(matches!(result, Err(CodecError::Decode(_))));
    }
}
