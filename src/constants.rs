//! Topic names, timeouts, TTLs, and environment variable names shared
//! across the crate.

use std::time::Duration;

/// Topic carrying [`Objective`](crate::types::Objective) records.
pub const TOPIC_OBJECTIVES: &str = "objectives";

/// Topic carrying [`Blueprint`](crate::types::Blueprint) records.
pub const TOPIC_BLUEPRINTS: &str = "blueprints";

/// How long a publish call waits for broker acknowledgement before
/// returning [`PublishError::DeadlineExceeded`](crate::bus::PublishError).
pub const FLUSH_TIMEOUT: Duration = Duration::from_secs(15);

/// Upper bound on a single blocking poll inside the subscriber loop.
/// Cancellation is observed within one poll interval.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Retention window for task state records, refreshed on every write.
pub const TASK_STATE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Key prefix for task state records: `task_state:{task_id}`.
pub const TASK_STATE_KEY_PREFIX: &str = "task_state";

/// Environment variable naming the broker connection URL.
pub const ENV_BROKER_URL: &str = "BROKER_URL";

/// Environment variable naming the consumer group identifier.
pub const ENV_CONSUMER_GROUP: &str = "CONSUMER_GROUP";

/// Environment variable naming the task state storage address.
pub const ENV_REDIS_ADDR: &str = "REDIS_ADDR";

/// Environment variable naming the task state server listen port.
pub const ENV_PORT: &str = "PORT";

/// Fallback broker URL when [`ENV_BROKER_URL`] is unset.
pub const DEFAULT_BROKER_URL: &str = "redis://127.0.0.1:6379";

/// Fallback storage address when [`ENV_REDIS_ADDR`] is unset.
pub const DEFAULT_REDIS_ADDR: &str = "redis://127.0.0.1:6379";

/// Fallback consumer group when [`ENV_CONSUMER_GROUP`] is unset.
pub const DEFAULT_CONSUMER_GROUP: &str = "swarmlink";

/// Fallback listen port when [`ENV_PORT`] is unset.
pub const DEFAULT_PORT: u16 = 50051;
