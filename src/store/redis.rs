//! Redis storage backend for task state.
//!
//! [`RedisBackend`] implements [`StateBackend`] with one Redis hash per
//! task key. Writes go through an atomic `MULTI`/`EXEC` pipeline
//! (`DEL` + `HSET` + `EXPIRE` in one round trip) so a concurrent
//! `HGETALL` never observes a half-updated record; reads are a single
//! `HGETALL`. Expiry is native Redis TTL -- an expired key reads exactly
//! like one that never existed.
//!
//! # Connection Model
//!
//! Holds a [`MultiplexedConnection`], cloned cheaply per operation; all
//! clones share one TCP connection.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::store::backend::{StateBackend, StorageError};

/// Redis [`StateBackend`] using per-key hashes with native TTL.
///
/// # Examples
///
/// ```no_run
/// use swarmlink::store::{RedisBackend, TaskStateStore};
///
/// # async fn example() {
/// let backend = RedisBackend::new("redis://127.0.0.1:6379").await.unwrap();
/// let store = TaskStateStore::new(backend);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RedisBackend {
    conn: MultiplexedConnection,
    key_prefix: String,
}

impl RedisBackend {
    /// Connects to Redis at the given URL.
    ///
    /// The URL format is `redis://[:<password>@]<host>:<port>[/<db>]`.
    /// Fails fast if the connection cannot be established.
    ///
    /// # Errors
    ///
    /// [`StorageError::Backend`] if the client cannot be created or the
    /// connection fails.
    pub async fn new(url: &str) -> Result<Self, StorageError> {
        let client = redis::Client::open(url).map_err(|e| StorageError::Backend {
            message: format!("failed to create Redis client: {e}"),
            source: Some(Box::new(e)),
        })?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StorageError::Backend {
                message: format!("failed to connect to Redis: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self::with_connection(conn))
    }

    /// Creates a backend with a pre-built multiplexed connection.
    pub fn with_connection(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            key_prefix: String::new(),
        }
    }

    /// Prepends `{prefix}:` to every key (builder pattern). Useful for
    /// test isolation: a unique prefix per test run avoids collisions.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn full_key(&self, key: &str) -> String {
        if self.key_prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.key_prefix, key)
        }
    }
}

fn map_redis_error(err: redis::RedisError, key: &str) -> StorageError {
    StorageError::Backend {
        message: format!("Redis error for key {key}: {err}"),
        source: Some(Box::new(err)),
    }
}

#[async_trait]
impl StateBackend for RedisBackend {
    async fn write_fields(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl: Duration,
    ) -> Result<(), StorageError> {
        let full_key = self.full_key(key);

        // DEL + HSET + EXPIRE inside MULTI/EXEC: the full overwrite and
        // the TTL refresh land in one atomic round trip.
        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.del(&full_key).ignore();
        pipe.hset_multiple(&full_key, fields).ignore();
        pipe.expire(&full_key, ttl.as_secs() as i64).ignore();
        pipe.query_async::<()>(&mut self.conn.clone())
            .await
            .map_err(|e| map_redis_error(e, key))?;
        Ok(())
    }

    async fn read_fields(&self, key: &str) -> Result<HashMap<String, String>, StorageError> {
        let full_key = self.full_key(key);

        let fields: HashMap<String, String> = self
            .conn
            .clone()
            .hgetall(&full_key)
            .await
            .map_err(|e| map_redis_error(e, key))?;

        // HGETALL on a missing (or expired) key returns an empty map.
        if fields.is_empty() {
            return Err(StorageError::NotFound {
                key: key.to_string(),
            });
        }
        Ok(fields)
    }
}

/// Integration tests against a live Redis instance.
///
/// Require a running Redis (default `redis://127.0.0.1:6379`; override
/// with `REDIS_URL`). Each test uses a UUID key prefix for isolation, so
/// no cleanup is needed.
///
/// Run with:
/// ```bash
/// cargo test --features redis-tests -- redis_state_
/// ```
#[cfg(all(test, feature = "redis-tests"))]
mod integration_tests {
    use super::*;
    use uuid::Uuid;

    async fn test_backend() -> RedisBackend {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        RedisBackend::new(&url)
            .await
            .expect("Redis connection failed -- is Redis running?")
            .with_prefix(format!("test-{}", Uuid::new_v4()))
    }

    fn fields(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn redis_state_write_then_read_round_trips() {
        let backend = test_backend().await;
        backend
            .write_fields(
                "task_state:t1",
                &fields(&[("status", "RUNNING"), ("worker_id", "w7")]),
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        let read = backend.read_fields("task_state:t1").await.unwrap();
        assert_eq!(read.get("status").unwrap(), "RUNNING");
        assert_eq!(read.get("worker_id").unwrap(), "w7");
    }

    #[tokio::test]
    async fn redis_state_missing_key_is_not_found() {
        let backend = test_backend().await;
        let result = backend.read_fields("task_state:absent").await;
        assert!(matches!(result, Err(StorageError::NotFound { .. })));
    }

    #[tokio::test]
    async fn redis_state_write_is_full_overwrite() {
        let backend = test_backend().await;
        backend
            .write_fields(
                "task_state:t1",
                &fields(&[("status", "RUNNING"), ("details", "step 1")]),
                Duration::from_secs(60),
            )
            .await
            .unwrap();
        backend
            .write_fields(
                "task_state:t1",
                &fields(&[("status", "FAILED")]),
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        let read = backend.read_fields("task_state:t1").await.unwrap();
        assert_eq!(read.get("status").unwrap(), "FAILED");
        assert!(read.get("details").is_none());
    }

    #[tokio::test]
    async fn redis_state_write_sets_ttl() {
        let backend = test_backend().await;
        backend
            .write_fields(
                "task_state:t1",
                &fields(&[("status", "PENDING")]),
                Duration::from_secs(3600),
            )
            .await
            .unwrap();

        let ttl: i64 = redis::cmd("TTL")
            .arg(backend.full_key("task_state:t1"))
            .query_async(&mut backend.conn.clone())
            .await
            .unwrap();
        assert!(ttl > 0 && ttl <= 3600, "expected a live TTL, got {ttl}");
    }
}
