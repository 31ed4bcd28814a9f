//! Infrastructure substrate for a multi-agent pipeline: a typed
//! publish/subscribe client over an at-least-once log broker, and a
//! remote-callable store for the execution status of in-flight tasks.
//!
//! # Overview
//!
//! Independent agents exchange typed work items over shared bus topics:
//! a publisher serializes a record and blocks until the broker confirms
//! delivery; a subscriber runs a bounded-poll loop that deserializes
//! each record and dispatches it to a handler, isolating malformed
//! messages and handler failures from the loop itself. Separately, any
//! agent records or queries task progress through the task state store,
//! whose writes are atomic across all fields and expire 24 hours after
//! the last update. All shared state lives in the broker or the store;
//! the components here hold none of their own.
//!
//! # Module Organization
//!
//! - [`types`] - message envelope, serialization contract, pipeline
//!   records, task state
//! - [`bus`] - publisher, subscriber, broker backends
//! - [`store`] - task state service and storage backends
//! - [`rpc`] - request/response server and client for the store
//! - [`config`] - environment-resolved configuration
//! - [`constants`] - topics, timeouts, TTLs
//!
//! # Example
//!
//! ```no_run
//! use swarmlink::bus::{InMemoryBroker, Publisher, Subscriber};
//! use swarmlink::types::Objective;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let broker = InMemoryBroker::new();
//! let publisher = Publisher::new(broker.clone());
//! let objective = Objective {
//!     id: "OBJ-1".to_string(),
//!     description: "expand into new markets".to_string(),
//! };
//! publisher.send("objectives", &objective).await?;
//!
//! let cancel = CancellationToken::new();
//! let subscriber = Subscriber::new(broker);
//! subscriber
//!     .run("objectives", "planner-group", cancel, |objective: Objective| async move {
//!         println!("planning for {}", objective.id);
//!         Ok(())
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod bus;
pub mod config;
pub mod constants;
pub mod rpc;
pub mod store;
pub mod types;

// Re-exports for ergonomic access
pub use bus::{
    Broker, BrokerConsumer, BusError, Delivery, InMemoryBroker, PublishError, Publisher,
    RedisStreamBroker, Subscriber,
};
pub use config::{BusConfig, StoreConfig};
pub use rpc::{RpcError, TaskStateClient, TaskStateServer};
pub use store::{StatusCode, StoreError, TaskStateStore};
pub use types::{Blueprint, Envelope, Objective, Record, TaskState, TaskStatus};
