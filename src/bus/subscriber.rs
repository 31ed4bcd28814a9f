//! Bounded-poll subscription loop with typed dispatch.
//!
//! One call to [`Subscriber::run`] owns one polling loop, bound to exactly
//! one record type. Each cycle checks the cancellation token, blocks up to
//! the poll timeout waiting for a delivery, then dispatches.
//!
//! # Dispatch policy
//!
//! - A delivery that fails to deserialize is logged and skipped. It is
//!   never retried, never forwarded, and never crashes or stalls the loop.
//! - A handler error is logged and the loop continues; the record is not
//!   redelivered. Handler failures are observable only through logs.
//! - The offset is committed after dispatch regardless of handler outcome.
//!   This makes delivery at-least-once with respect to crashes between
//!   poll and commit, but at-most-once with respect to handler failure.
//!   Callers that cannot tolerate lost work must make handlers either
//!   infallible or idempotent against an external retry.
//!
//! # Termination
//!
//! The loop exits with `Ok(())` when the cancellation token fires,
//! observed within one poll interval. Any non-timeout broker error is
//! fatal and propagates; the caller restarts the subscription.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::bus::{Broker, BusError};
use crate::constants::POLL_TIMEOUT;
use crate::types::envelope::{decode, Record};

/// Boxed error returned by subscription handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Runs typed subscription loops against a broker.
///
/// # Examples
///
/// ```no_run
/// use swarmlink::bus::{InMemoryBroker, Subscriber};
/// use swarmlink::types::Objective;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), swarmlink::bus::BusError> {
/// let subscriber = Subscriber::new(InMemoryBroker::new());
/// let cancel = CancellationToken::new();
/// subscriber
///     .run("objectives", "planner-group", cancel.clone(), |objective: Objective| async move {
///         println!("planning for {}", objective.id);
///         Ok(())
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Subscriber<B> {
    broker: B,
    poll_timeout: Duration,
}

impl<B: Broker> Subscriber<B> {
    /// Creates a subscriber with the default 1 s poll timeout.
    pub fn new(broker: B) -> Self {
        Self {
            broker,
            poll_timeout: POLL_TIMEOUT,
        }
    }

    /// Overrides the poll timeout (builder pattern).
    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    /// Consumes `topic` within `group`, invoking `handler` once per
    /// successfully deserialized record, until `cancel` fires.
    ///
    /// Parallel instances sharing `group` split the topic between them
    /// and never receive duplicate deliveries across the group.
    ///
    /// # Errors
    ///
    /// Propagates any non-timeout [`BusError`] from consumer setup,
    /// polling, or offset commit. Cancellation is not an error.
    pub async fn run<R, H, Fut>(
        &self,
        topic: &str,
        group: &str,
        cancel: CancellationToken,
        mut handler: H,
    ) -> Result<(), BusError>
    where
        R: Record,
        H: FnMut(R) -> Fut,
        Fut: Future<Output = Result<(), HandlerError>>,
    {
        let mut consumer = self.broker.consumer(topic, group).await?;
        debug!(topic, group, "subscription started");

        loop {
            // Cooperative cancellation: checked once per cycle, never
            // mid-read. The bounded poll keeps the check prompt.
            if cancel.is_cancelled() {
                debug!(topic, group, "subscription cancelled");
                return Ok(());
            }

            let Some(delivery) = consumer.poll(self.poll_timeout).await? else {
                continue;
            };

            match decode::<R>(&delivery.envelope.payload) {
                Ok(record) => {
                    let record_id = record.record_id().to_string();
                    if let Err(err) = handler(record).await {
                        error!(topic, group, record_id, %err, "handler failed; not retrying");
                    }
                }
                Err(err) => {
                    warn!(topic, group, %err, "skipping undecodable record");
                }
            }

            // Commit after dispatch, independent of handler outcome.
            consumer.ack(&delivery).await?;
        }
    }
}
