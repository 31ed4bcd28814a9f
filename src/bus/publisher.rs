//! Flush-confirmed record publishing.
//!
//! [`Publisher::send`] returns success only after the broker has accepted
//! the serialized bytes. On timeout it returns
//! [`PublishError::DeadlineExceeded`], which means delivery is
//! *unconfirmed*, not necessarily failed: the record may still reach the
//! broker after the deadline. Callers must treat that variant as
//! retryable and rely on producer-assigned record ids for downstream
//! idempotency.

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::bus::{Broker, BusError};
use crate::constants::FLUSH_TIMEOUT;
use crate::types::envelope::{encode, EncodeError, Envelope, Record};

/// Errors from a publish attempt.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The topic name was empty. Nothing was sent.
    #[error("topic name must not be empty")]
    InvalidTopic,

    /// The record failed to serialize. Nothing was sent.
    #[error(transparent)]
    Serialize(#[from] EncodeError),

    /// The broker connection failed or rejected the envelope.
    #[error(transparent)]
    Connection(#[from] BusError),

    /// The flush timeout elapsed before the broker confirmed acceptance.
    ///
    /// Delivery is unconfirmed, not disproved. Retryable; broker-side
    /// dedup is out of scope, so retries may duplicate.
    #[error("publish to topic {topic} unconfirmed after flush timeout")]
    DeadlineExceeded {
        /// The topic the publish targeted.
        topic: String,
    },
}

/// Publishes typed records to a broker topic, blocking until confirmed.
///
/// # Examples
///
/// ```no_run
/// use swarmlink::bus::{InMemoryBroker, Publisher};
/// use swarmlink::types::Objective;
///
/// # async fn example() -> Result<(), swarmlink::bus::PublishError> {
/// let publisher = Publisher::new(InMemoryBroker::new());
/// let objective = Objective {
///     id: "OBJ-1".to_string(),
///     description: "expand into new markets".to_string(),
/// };
/// publisher.send("objectives", &objective).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Publisher<B> {
    broker: B,
    flush_timeout: Duration,
}

impl<B: Broker> Publisher<B> {
    /// Creates a publisher with the default 15 s flush timeout.
    pub fn new(broker: B) -> Self {
        Self {
            broker,
            flush_timeout: FLUSH_TIMEOUT,
        }
    }

    /// Overrides the flush timeout (builder pattern).
    pub fn with_flush_timeout(mut self, flush_timeout: Duration) -> Self {
        self.flush_timeout = flush_timeout;
        self
    }

    /// Serializes `record` and publishes it to `topic`.
    ///
    /// The record id becomes the envelope's partitioning key, so updates
    /// for the same record keep their publish order within a partition.
    ///
    /// # Errors
    ///
    /// - [`PublishError::InvalidTopic`] for an empty topic name.
    /// - [`PublishError::Serialize`] if encoding fails; nothing is sent.
    /// - [`PublishError::Connection`] on broker/connection failure.
    /// - [`PublishError::DeadlineExceeded`] if the broker has not
    ///   confirmed within the flush timeout (unconfirmed, retryable).
    pub async fn send<R: Record>(&self, topic: &str, record: &R) -> Result<(), PublishError> {
        if topic.is_empty() {
            return Err(PublishError::InvalidTopic);
        }

        let payload = encode(record)?;
        let envelope =
            Envelope::new(topic, payload).with_key(record.record_id().as_bytes().to_vec());

        match tokio::time::timeout(self.flush_timeout, self.broker.publish(envelope)).await {
            Ok(Ok(())) => {
                debug!(topic, record_id = record.record_id(), "record published");
                Ok(())
            }
            Ok(Err(err)) => Err(err.into()),
            Err(_) => Err(PublishError::DeadlineExceeded {
                topic: topic.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::InMemoryBroker;
    use crate::types::Objective;

    fn objective() -> Objective {
        Objective {
            id: "OBJ-1".to_string(),
            description: "x".to_string(),
        }
    }

    #[tokio::test]
    async fn send_rejects_empty_topic() {
        let publisher = Publisher::new(InMemoryBroker::new());
        let result = publisher.send("", &objective()).await;
        assert!(matches!(result, Err(PublishError::InvalidTopic)));
    }

    #[tokio::test]
    async fn send_confirms_against_in_memory_broker() {
        let publisher = Publisher::new(InMemoryBroker::new());
        publisher.send("objectives", &objective()).await.unwrap();
    }

    #[tokio::test]
    async fn deadline_exceeded_when_broker_never_confirms() {
        struct StalledBroker;

        #[async_trait::async_trait]
        impl Broker for StalledBroker {
            async fn publish(&self, _envelope: Envelope) -> Result<(), BusError> {
                std::future::pending().await
            }

            async fn consumer(
                &self,
                _topic: &str,
                _group: &str,
            ) -> Result<Box<dyn crate::bus::BrokerConsumer>, BusError> {
                unreachable!("not used in this test")
            }
        }

        let publisher =
            Publisher::new(StalledBroker).with_flush_timeout(Duration::from_millis(20));
        let result = publisher.send("objectives", &objective()).await;
        assert!(
            matches!(result, Err(PublishError::DeadlineExceeded { ref topic }) if topic == "objectives")
        );
    }
}
