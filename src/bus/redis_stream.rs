//! Redis Streams broker backend.
//!
//! Maps the broker contract onto Redis Streams primitives:
//!
//! | Operation | Redis command |
//! |-----------|---------------|
//! | publish   | `XADD {prefix}:stream:{topic} *` |
//! | consumer setup | `XGROUP CREATE ... 0 MKSTREAM` (idempotent) |
//! | poll      | `XREADGROUP GROUP ... COUNT 1 BLOCK {ms} ... >` |
//! | ack       | `XACK` |
//!
//! Streams give the at-least-once, log-ordered, consumer-group semantics
//! the bus contract requires: entries are durable once `XADD` returns,
//! each entry is handed to exactly one member of a group, and a group
//! created after publishing starts from the earliest retained entry
//! (`XGROUP CREATE ... 0`).
//!
//! # Connection Model
//!
//! The broker holds a [`MultiplexedConnection`], cloned cheaply per
//! operation; all clones share one TCP connection. Each consumer gets a
//! unique consumer name within its group so parallel instances split the
//! stream between them.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use uuid::Uuid;

use crate::bus::{Broker, BrokerConsumer, BusError, Delivery};
use crate::types::Envelope;

/// Field name holding the serialized record inside a stream entry.
const FIELD_PAYLOAD: &str = "payload";
/// Field name holding the optional partitioning key.
const FIELD_KEY: &str = "key";

/// `XREADGROUP` reply shape: one `(stream, entries)` pair per requested
/// stream, each entry an `(id, fields)` pair.
type ReadGroupReply = Option<Vec<(String, Vec<(String, HashMap<String, Vec<u8>>)>)>>;

/// Message bus backend over Redis Streams.
///
/// # Examples
///
/// ```no_run
/// use swarmlink::bus::{Publisher, RedisStreamBroker};
///
/// # async fn example() -> Result<(), swarmlink::bus::BusError> {
/// let broker = RedisStreamBroker::new("redis://127.0.0.1:6379").await?;
/// let publisher = Publisher::new(broker);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RedisStreamBroker {
    conn: MultiplexedConnection,
    stream_prefix: String,
}

impl RedisStreamBroker {
    /// Connects to Redis at the given URL.
    ///
    /// Uses the default stream prefix `"swarmlink"`. Fails fast if the
    /// connection cannot be established.
    ///
    /// # Errors
    ///
    /// [`BusError::Connection`] if the client cannot be created or the
    /// connection fails.
    pub async fn new(url: &str) -> Result<Self, BusError> {
        let client = redis::Client::open(url)
            .map_err(|e| BusError::connection("failed to create Redis client", e))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| BusError::connection("failed to connect to Redis", e))?;
        Ok(Self::with_connection(conn))
    }

    /// Creates a broker with a pre-built multiplexed connection.
    pub fn with_connection(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            stream_prefix: "swarmlink".to_string(),
        }
    }

    /// Sets a custom stream prefix (builder pattern). Useful for test
    /// isolation: a unique prefix per test run avoids stream collisions.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.stream_prefix = prefix.into();
        self
    }

    fn stream_key(&self, topic: &str) -> String {
        format!("{}:stream:{}", self.stream_prefix, topic)
    }
}

#[async_trait]
impl Broker for RedisStreamBroker {
    async fn publish(&self, envelope: Envelope) -> Result<(), BusError> {
        let stream = self.stream_key(&envelope.topic);

        let mut cmd = redis::cmd("XADD");
        cmd.arg(&stream).arg("*");
        if let Some(key) = &envelope.key {
            cmd.arg(FIELD_KEY).arg(key);
        }
        cmd.arg(FIELD_PAYLOAD).arg(&envelope.payload);

        // XADD only returns after the entry is in the log; its reply is
        // the delivery confirmation.
        let _id: String = cmd
            .query_async(&mut self.conn.clone())
            .await
            .map_err(|e| BusError::broker(&envelope.topic, "XADD failed", e))?;
        Ok(())
    }

    async fn consumer(
        &self,
        topic: &str,
        group: &str,
    ) -> Result<Box<dyn BrokerConsumer>, BusError> {
        let stream = self.stream_key(topic);
        let mut conn = self.conn.clone();

        // Idempotent group creation from the earliest entry. BUSYGROUP
        // means another instance created it first.
        let created: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&stream)
            .arg(group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;
        if let Err(err) = created {
            if err.code() != Some("BUSYGROUP") {
                return Err(BusError::connection(
                    format!("failed to create consumer group {group} on {stream}"),
                    err,
                ));
            }
        }

        Ok(Box::new(RedisStreamConsumer {
            conn,
            stream,
            topic: topic.to_string(),
            group: group.to_string(),
            consumer_name: format!("{group}-{}", Uuid::new_v4()),
        }))
    }
}

struct RedisStreamConsumer {
    conn: MultiplexedConnection,
    stream: String,
    topic: String,
    group: String,
    consumer_name: String,
}

#[async_trait]
impl BrokerConsumer for RedisStreamConsumer {
    async fn poll(&mut self, timeout: Duration) -> Result<Option<Delivery>, BusError> {
        // BLOCK 0 means "forever" to Redis; keep the wait bounded.
        let block_ms = (timeout.as_millis() as u64).max(1);

        let reply: ReadGroupReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.group)
            .arg(&self.consumer_name)
            .arg("COUNT")
            .arg(1)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(&self.stream)
            .arg(">")
            .query_async(&mut self.conn)
            .await
            .map_err(|e| BusError::broker(&self.topic, "XREADGROUP failed", e))?;

        let Some(streams) = reply else {
            // Block timeout elapsed with nothing new. Not an error.
            return Ok(None);
        };

        for (_stream, entries) in streams {
            for (id, mut fields) in entries {
                let payload = fields.remove(FIELD_PAYLOAD).unwrap_or_default();
                let mut envelope = Envelope::new(self.topic.clone(), payload);
                if let Some(key) = fields.remove(FIELD_KEY) {
                    envelope = envelope.with_key(key);
                }
                return Ok(Some(Delivery::new(envelope, id)));
            }
        }
        Ok(None)
    }

    async fn ack(&mut self, delivery: &Delivery) -> Result<(), BusError> {
        let _acked: i64 = redis::cmd("XACK")
            .arg(&self.stream)
            .arg(&self.group)
            .arg(&delivery.ack_id)
            .query_async(&mut self.conn)
            .await
            .map_err(|e| BusError::broker(&self.topic, "XACK failed", e))?;
        Ok(())
    }
}

/// Integration tests against a live Redis instance.
///
/// Require a running Redis (default `redis://127.0.0.1:6379`; override
/// with `REDIS_URL`). Each test uses a UUID stream prefix for isolation.
///
/// Run with:
/// ```bash
/// cargo test --features redis-tests -- redis_stream_
/// ```
#[cfg(all(test, feature = "redis-tests"))]
mod integration_tests {
    use super::*;

    async fn test_broker() -> RedisStreamBroker {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        RedisStreamBroker::new(&url)
            .await
            .expect("Redis connection failed -- is Redis running?")
            .with_prefix(format!("test-{}", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn redis_stream_publish_then_poll_round_trips() {
        let broker = test_broker().await;
        let envelope = Envelope::new("objectives", b"{\"id\":\"OBJ-1\"}".to_vec())
            .with_key(b"OBJ-1".to_vec());
        broker.publish(envelope.clone()).await.unwrap();

        let mut consumer = broker.consumer("objectives", "g").await.unwrap();
        let delivery = consumer
            .poll(Duration::from_secs(2))
            .await
            .unwrap()
            .expect("expected one delivery");
        assert_eq!(delivery.envelope, envelope);
        consumer.ack(&delivery).await.unwrap();
    }

    #[tokio::test]
    async fn redis_stream_poll_times_out_on_empty_stream() {
        let broker = test_broker().await;
        let mut consumer = broker.consumer("objectives", "g").await.unwrap();
        let polled = consumer.poll(Duration::from_millis(100)).await.unwrap();
        assert!(polled.is_none());
    }

    #[tokio::test]
    async fn redis_stream_group_starts_from_earliest() {
        let broker = test_broker().await;
        broker
            .publish(Envelope::new("objectives", b"early".to_vec()))
            .await
            .unwrap();

        let mut consumer = broker.consumer("objectives", "late-group").await.unwrap();
        let delivery = consumer.poll(Duration::from_secs(2)).await.unwrap();
        assert_eq!(delivery.unwrap().envelope.payload, b"early");
    }

    #[tokio::test]
    async fn redis_stream_same_group_does_not_duplicate() {
        let broker = test_broker().await;
        broker
            .publish(Envelope::new("objectives", b"only-once".to_vec()))
            .await
            .unwrap();

        let mut first = broker.consumer("objectives", "g").await.unwrap();
        let mut second = broker.consumer("objectives", "g").await.unwrap();
        let a = first.poll(Duration::from_secs(2)).await.unwrap();
        let b = second.poll(Duration::from_millis(100)).await.unwrap();
        assert!(a.is_some());
        assert!(b.is_none());
    }
}
