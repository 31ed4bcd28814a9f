//! Environment-resolved configuration for bus and store components.
//!
//! Components never read hidden global state: a process resolves its
//! configuration once at startup (here, or from any other source) and
//! injects it into constructors. That keeps every component constructible
//! against in-memory substitutes in tests.
//!
//! | Variable | Default | Used by |
//! |----------|---------|---------|
//! | `BROKER_URL` | `redis://127.0.0.1:6379` | bus |
//! | `CONSUMER_GROUP` | `swarmlink` | subscriber |
//! | `REDIS_ADDR` | `redis://127.0.0.1:6379` | task state store |
//! | `PORT` | `50051` | task state server |

use std::time::Duration;

use tracing::warn;

use crate::constants::{
    DEFAULT_BROKER_URL, DEFAULT_CONSUMER_GROUP, DEFAULT_PORT, DEFAULT_REDIS_ADDR,
    ENV_BROKER_URL, ENV_CONSUMER_GROUP, ENV_PORT, ENV_REDIS_ADDR, FLUSH_TIMEOUT, POLL_TIMEOUT,
    TASK_STATE_TTL,
};

/// Accepts bare `host:port` addresses by prepending the `redis://`
/// scheme, so both URL and address forms work in the environment.
fn normalize_redis_url(addr: &str) -> String {
    if addr.contains("://") {
        addr.to_string()
    } else {
        format!("redis://{addr}")
    }
}

/// Configuration for bus publishers and subscribers.
///
/// # Examples
///
/// ```
/// use swarmlink::config::BusConfig;
///
/// let config = BusConfig::default().with_group_id("planner-group");
/// assert_eq!(config.group_id, "planner-group");
/// ```
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Broker connection URL.
    pub broker_url: String,
    /// Consumer group identifier for subscriptions.
    pub group_id: String,
    /// Publisher flush timeout.
    pub flush_timeout: Duration,
    /// Subscriber poll timeout.
    pub poll_timeout: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            broker_url: DEFAULT_BROKER_URL.to_string(),
            group_id: DEFAULT_CONSUMER_GROUP.to_string(),
            flush_timeout: FLUSH_TIMEOUT,
            poll_timeout: POLL_TIMEOUT,
        }
    }
}

impl BusConfig {
    /// Resolves configuration from the environment, falling back to the
    /// documented defaults for anything unset.
    pub fn from_env() -> Self {
        Self {
            broker_url: std::env::var(ENV_BROKER_URL)
                .map(|addr| normalize_redis_url(&addr))
                .unwrap_or_else(|_| DEFAULT_BROKER_URL.to_string()),
            group_id: std::env::var(ENV_CONSUMER_GROUP)
                .unwrap_or_else(|_| DEFAULT_CONSUMER_GROUP.to_string()),
            ..Self::default()
        }
    }

    /// Sets the broker URL (builder pattern).
    pub fn with_broker_url(mut self, url: impl Into<String>) -> Self {
        self.broker_url = url.into();
        self
    }

    /// Sets the consumer group (builder pattern).
    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = group_id.into();
        self
    }
}

/// Configuration for the task state store and its server.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Storage connection URL.
    pub redis_url: String,
    /// Port the RPC server listens on.
    pub port: u16,
    /// Retention window applied on every write.
    pub ttl: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: DEFAULT_REDIS_ADDR.to_string(),
            port: DEFAULT_PORT,
            ttl: TASK_STATE_TTL,
        }
    }
}

impl StoreConfig {
    /// Resolves configuration from the environment, falling back to the
    /// documented defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let port = match std::env::var(ENV_PORT) {
            Ok(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(raw, "unparseable PORT value; using default");
                DEFAULT_PORT
            }),
            Err(_) => DEFAULT_PORT,
        };
        Self {
            redis_url: std::env::var(ENV_REDIS_ADDR)
                .map(|addr| normalize_redis_url(&addr))
                .unwrap_or_else(|_| DEFAULT_REDIS_ADDR.to_string()),
            port,
            ..Self::default()
        }
    }

    /// Sets the storage URL (builder pattern).
    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = url.into();
        self
    }

    /// Sets the listen port (builder pattern).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// The socket address the server binds, on all interfaces.
    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalize_accepts_bare_address() {
        assert_eq!(normalize_redis_url("localhost:6379"), "redis://localhost:6379");
    }

    #[test]
    fn normalize_keeps_full_url() {
        assert_eq!(
            normalize_redis_url("redis://cache.internal:6380/1"),
            "redis://cache.internal:6380/1"
        );
    }

    #[test]
    fn bus_config_defaults() {
        let config = BusConfig::default();
        assert_eq!(config.broker_url, DEFAULT_BROKER_URL);
        assert_eq!(config.group_id, DEFAULT_CONSUMER_GROUP);
        assert_eq!(config.flush_timeout, Duration::from_secs(15));
        assert_eq!(config.poll_timeout, Duration::from_secs(1));
    }

    #[test]
    fn store_config_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.ttl, Duration::from_secs(24 * 60 * 60));
        assert_eq!(config.listen_addr(), "0.0.0.0:50051");
    }

    #[test]
    fn builders_override_fields() {
        let config = StoreConfig::default().with_port(9000).with_redis_url("redis://r:1");
        assert_eq!(config.port, 9000);
        assert_eq!(config.redis_url, "redis://r:1");
    }
}
