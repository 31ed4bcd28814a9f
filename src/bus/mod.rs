//! Message bus client: publish/subscribe over an at-least-once log broker.
//!
//! # Architecture
//!
//! The bus has three layers:
//!
//! 1. **[`Publisher`] / [`Subscriber`]** -- the typed API agents use.
//!    A publisher serializes a record and blocks until the broker confirms
//!    acceptance; a subscriber runs a bounded-poll loop that deserializes
//!    each delivery and dispatches it to a handler.
//!
//! 2. **[`Broker`] / [`BrokerConsumer`]** -- the transport seam. Broker
//!    implementations move opaque [`Envelope`]s; they never interpret
//!    payloads, deserialize records, or decide dispatch policy.
//!
//! 3. **Backends** -- [`RedisStreamBroker`](redis_stream::RedisStreamBroker)
//!    for production (consumer groups over Redis Streams) and
//!    [`InMemoryBroker`](memory::InMemoryBroker) for tests and embedded
//!    pipelines.
//!
//! All shared state lives in the broker: neither publisher nor subscriber
//! holds a mutable cache that needs cross-thread synchronization.
//! Concurrency across the pipeline comes from running multiple independent
//! publisher/subscriber instances.

pub mod memory;
pub mod publisher;
pub mod redis_stream;
pub mod subscriber;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::Envelope;

pub use memory::InMemoryBroker;
pub use publisher::{PublishError, Publisher};
pub use redis_stream::RedisStreamBroker;
pub use subscriber::{HandlerError, Subscriber};

/// Errors from the broker transport layer.
///
/// Connection and read errors are not locally recoverable: the subscriber
/// loop propagates them to its caller, who is expected to restart the
/// subscription. Poll timeouts are not errors; they surface as
/// `Ok(None)` from [`BrokerConsumer::poll`].
#[derive(Debug, Error)]
pub enum BusError {
    /// Broker connection or setup failed.
    #[error("broker connection failed: {message}")]
    Connection {
        /// Human-readable description of the failure.
        message: String,
        /// The underlying error, if available.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A broker operation failed after the connection was established.
    #[error("broker error on topic {topic}: {message}")]
    Broker {
        /// The topic the operation targeted.
        topic: String,
        /// Human-readable description of the failure.
        message: String,
        /// The underlying error, if available.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// One record handed out by a [`BrokerConsumer`].
///
/// The `ack_id` identifies this delivery for offset commit; it is opaque
/// to everything above the broker layer.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// The envelope as it crossed the broker.
    pub envelope: Envelope,
    pub(crate) ack_id: String,
}

impl Delivery {
    /// Creates a delivery. Broker implementations only.
    pub(crate) fn new(envelope: Envelope, ack_id: impl Into<String>) -> Self {
        Self {
            envelope,
            ack_id: ack_id.into(),
        }
    }
}

/// A durable log broker that queues envelopes for consumer groups.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Hands an envelope to the broker and waits for acceptance.
    ///
    /// Returns only after the broker has durably queued the bytes. The
    /// publisher bounds this wait with its flush timeout.
    ///
    /// # Errors
    ///
    /// [`BusError::Broker`] if the broker rejects or cannot store the
    /// envelope, [`BusError::Connection`] on connection failure.
    async fn publish(&self, envelope: Envelope) -> Result<(), BusError>;

    /// Opens a consumer for `topic` within `group`.
    ///
    /// Consumers sharing a group share offsets: each record is delivered
    /// to exactly one member of the group, in publish order within a
    /// partition. A new group starts from the earliest retained record.
    ///
    /// # Errors
    ///
    /// [`BusError::Connection`] if the consumer cannot be set up.
    async fn consumer(&self, topic: &str, group: &str)
        -> Result<Box<dyn BrokerConsumer>, BusError>;
}

/// A group-scoped consumer handle, produced by [`Broker::consumer`].
#[async_trait]
pub trait BrokerConsumer: Send {
    /// Blocks up to `timeout` waiting for the next record.
    ///
    /// Returns `Ok(None)` when the timeout elapses with nothing to
    /// deliver -- a normal outcome, never an error. The bounded wait is
    /// what lets the subscriber loop observe cancellation promptly
    /// without busy-spinning.
    ///
    /// # Errors
    ///
    /// [`BusError::Broker`] on any non-timeout read failure. These are
    /// fatal to the subscription.
    async fn poll(&mut self, timeout: Duration) -> Result<Option<Delivery>, BusError>;

    /// Commits the offset for a delivery, marking it consumed for the
    /// whole group.
    ///
    /// # Errors
    ///
    /// [`BusError::Broker`] if the commit cannot be recorded.
    async fn ack(&mut self, delivery: &Delivery) -> Result<(), BusError>;
}

impl BusError {
    pub(crate) fn connection(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub(crate) fn broker(
        topic: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Broker {
            topic: topic.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
