//! In-memory log broker for tests and embedded pipelines.
//!
//! [`InMemoryBroker`] keeps one append-only log per topic and one shared
//! cursor per consumer group, reproducing the broker contract the
//! production backend provides: publish order within a topic, exactly one
//! delivery per record per group, and new groups starting from the
//! earliest retained record.
//!
//! Cloning the broker is cheap and every clone shares the same logs, so a
//! test can publish through one clone and subscribe through another.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::bus::{Broker, BrokerConsumer, BusError, Delivery};
use crate::types::Envelope;

#[derive(Debug, Default)]
struct TopicState {
    entries: Vec<Envelope>,
    /// Next undelivered index per consumer group. Shared by every
    /// consumer in the group, which is what prevents duplicate
    /// deliveries across group members.
    cursors: HashMap<String, usize>,
}

#[derive(Debug, Default)]
struct TopicLog {
    state: Mutex<TopicState>,
    notify: Notify,
}

impl TopicLog {
    fn try_next(&self, group: &str) -> Option<Delivery> {
        let mut state = self.state.lock();
        let cursor = *state.cursors.get(group).unwrap_or(&0);
        if cursor < state.entries.len() {
            let envelope = state.entries[cursor].clone();
            state.cursors.insert(group.to_string(), cursor + 1);
            Some(Delivery::new(envelope, cursor.to_string()))
        } else {
            None
        }
    }
}

/// Thread-safe in-memory broker.
///
/// # Examples
///
/// ```
/// use swarmlink::bus::{Broker, InMemoryBroker};
/// use swarmlink::types::Envelope;
///
/// # async fn example() -> Result<(), swarmlink::bus::BusError> {
/// let broker = InMemoryBroker::new();
/// broker.publish(Envelope::new("objectives", b"{}".to_vec())).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    topics: Arc<DashMap<String, Arc<TopicLog>>>,
}

impl InMemoryBroker {
    /// Creates an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    fn topic_log(&self, topic: &str) -> Arc<TopicLog> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| Arc::new(TopicLog::default()))
            .clone()
    }

    /// Number of records retained on `topic`. Test observability helper.
    pub fn topic_len(&self, topic: &str) -> usize {
        self.topics
            .get(topic)
            .map(|log| log.state.lock().entries.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn publish(&self, envelope: Envelope) -> Result<(), BusError> {
        let log = self.topic_log(&envelope.topic);
        {
            let mut state = log.state.lock();
            state.entries.push(envelope);
        }
        log.notify.notify_waiters();
        Ok(())
    }

    async fn consumer(
        &self,
        topic: &str,
        group: &str,
    ) -> Result<Box<dyn BrokerConsumer>, BusError> {
        Ok(Box::new(InMemoryConsumer {
            log: self.topic_log(topic),
            group: group.to_string(),
        }))
    }
}

struct InMemoryConsumer {
    log: Arc<TopicLog>,
    group: String,
}

#[async_trait]
impl BrokerConsumer for InMemoryConsumer {
    async fn poll(&mut self, timeout: Duration) -> Result<Option<Delivery>, BusError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Register for wakeup before checking the log, so a publish
            // landing between the check and the wait is not missed.
            let notified = self.log.notify.notified();
            if let Some(delivery) = self.log.try_next(&self.group) {
                return Ok(Some(delivery));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    /// Offsets advance at poll time (the cursor moved when the record was
    /// handed out), so the commit itself is a no-op here. This matches
    /// the production backend's commit-after-dispatch timing as observed
    /// by the group: a record handed to a consumer is never redelivered.
    async fn ack(&mut self, _delivery: &Delivery) -> Result<(), BusError> {
        Ok(())
    }
}
