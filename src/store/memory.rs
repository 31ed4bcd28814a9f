//! Thread-safe in-memory backend for task state.
//!
//! [`InMemoryBackend`] implements [`StateBackend`] over a
//! `DashMap<String, StoredRecord>` with application-level TTL: every
//! write stamps an absolute expiry, reads treat an expired record as
//! absent and remove it lazily. Intended for tests and embedded use;
//! production deployments use [`RedisBackend`](crate::store::RedisBackend).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::store::backend::{StateBackend, StorageError};

#[derive(Debug, Clone)]
struct StoredRecord {
    fields: HashMap<String, String>,
    expires_at: DateTime<Utc>,
}

/// In-memory [`StateBackend`] with lazy TTL expiry.
///
/// # Examples
///
/// ```
/// use swarmlink::store::{InMemoryBackend, TaskStateStore};
///
/// let store = TaskStateStore::new(InMemoryBackend::new());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: DashMap<String, StoredRecord>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held, expired ones included until
    /// they are lazily removed.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if no records are held.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[async_trait]
impl StateBackend for InMemoryBackend {
    async fn write_fields(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl: Duration,
    ) -> Result<(), StorageError> {
        let expires_at = Utc::now()
            + chrono::Duration::from_std(ttl).map_err(|e| StorageError::Backend {
                message: format!("TTL out of range: {e}"),
                source: Some(Box::new(e)),
            })?;
        // DashMap::insert replaces the whole record in one shot, which
        // is the atomic full-overwrite the contract requires.
        self.data.insert(
            key.to_string(),
            StoredRecord {
                fields: fields.iter().cloned().collect(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn read_fields(&self, key: &str) -> Result<HashMap<String, String>, StorageError> {
        if let Some(record) = self.data.get(key) {
            if record.expires_at > Utc::now() {
                return Ok(record.fields.clone());
            }
        }
        // Lazy removal; absence and expiry are indistinguishable to
        // callers, as with a real TTL store. The removal re-checks the
        // expiry under the map lock: a writer that refreshed the record
        // between the read above and this point must not lose its write.
        self.data
            .remove_if(key, |_, record| record.expires_at <= Utc::now());
        Err(StorageError::NotFound {
            key: key.to_string(),
        })
    }
}
