//! Message envelope and the record serialization contract.
//!
//! An [`Envelope`] is what crosses the broker: a topic, an optional
//! partitioning key, and an opaque payload. The bus never inspects the
//! payload. The payload bytes are always a complete canonical-JSON
//! encoding of exactly one typed record -- partial writes are never
//! published, because [`encode`] produces the full byte vector before
//! anything is handed to the broker.
//!
//! # Decode failure classes
//!
//! [`decode`] distinguishes two failures:
//!
//! - [`DecodeError::Malformed`] -- the bytes do not parse as JSON at all.
//! - [`DecodeError::Shape`] -- valid JSON that does not match the
//!   expected record type (wrong field types, missing required fields).
//!
//! Both are skippable at the subscriber; the split exists so logs can
//! tell corrupt bytes apart from a producer/consumer type mismatch.
//!
//! Records are backward-tolerant: optional fields carry
//! `#[serde(default)]`, so a structurally valid but semantically
//! incomplete record decodes with default values instead of failing.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// A single message as it crosses the broker.
///
/// # Examples
///
/// ```
/// use swarmlink::types::Envelope;
///
/// let envelope = Envelope::new("objectives", b"{}".to_vec())
///     .with_key(b"OBJ-1".to_vec());
/// assert_eq!(envelope.topic, "objectives");
/// assert_eq!(envelope.key.as_deref(), Some(&b"OBJ-1"[..]));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Logical channel name. A contract between one producer/consumer pair.
    pub topic: String,

    /// Optional partitioning key. Publishers set it to the record id so
    /// records with the same id land on the same partition.
    pub key: Option<Vec<u8>>,

    /// Opaque serialized record. The bus never inspects it.
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Creates an envelope with no partitioning key.
    pub fn new(topic: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            key: None,
            payload,
        }
    }

    /// Sets the partitioning key (builder pattern).
    pub fn with_key(mut self, key: Vec<u8>) -> Self {
        self.key = Some(key);
        self
    }
}

/// A typed record that can travel on the bus.
///
/// Each subscription is bound to exactly one `Record` type at setup time;
/// the type is never inferred per message. The `record_id` is assigned by
/// the producer, must be stable, and doubles as the partitioning key and
/// the downstream idempotency key (consumer-side concern -- the bus does
/// not enforce it).
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Producer-assigned unique identifier for this record.
    fn record_id(&self) -> &str;
}

/// A record failed to serialize before publishing. Nothing was sent.
#[derive(Debug, Error)]
#[error("record serialization failed: {0}")]
pub struct EncodeError(#[from] serde_json::Error);

/// A payload failed to deserialize at the consumer.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The bytes are not valid JSON.
    #[error("malformed payload: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The bytes are valid JSON but do not match the expected record type.
    #[error("payload does not match expected record shape: {0}")]
    Shape(#[source] serde_json::Error),
}

/// Serializes a record to its canonical JSON byte form.
///
/// Field order follows struct declaration order, so equal records always
/// produce identical bytes.
///
/// # Errors
///
/// Returns [`EncodeError`] if serialization fails; nothing is published
/// in that case.
pub fn encode<R: Record>(record: &R) -> Result<Vec<u8>, EncodeError> {
    Ok(serde_json::to_vec(record)?)
}

/// Deserializes payload bytes back into the expected record type.
///
/// # Errors
///
/// - [`DecodeError::Malformed`] if the bytes are not JSON.
/// - [`DecodeError::Shape`] if the JSON does not fit the record type.
pub fn decode<R: Record>(payload: &[u8]) -> Result<R, DecodeError> {
    let value: serde_json::Value =
        serde_json::from_slice(payload).map_err(DecodeError::Malformed)?;
    serde_json::from_value(value).map_err(DecodeError::Shape)
}
