//! Low-level key-value storage backend trait for task state.
//!
//! The [`StateBackend`] trait is the seam between the
//! [`TaskStateStore`](crate::store::TaskStateStore) service and its
//! storage engine. Backends are dumb hash-field stores: they move string
//! fields in and out atomically and enforce the TTL. Everything
//! domain-aware (argument validation, status parsing, timestamping,
//! status-code mapping) lives in the service, never here.
//!
//! # Atomicity
//!
//! A [`write_fields`](StateBackend::write_fields) call must apply every
//! field *and* the TTL refresh in one atomic round trip. A concurrent
//! reader observes either the record before the write or after it, never
//! a mix. Interleaved writers for the same key therefore always converge
//! to one writer's full record (last-writer-wins); no client-side locking
//! exists or is needed.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

/// Errors from raw storage operations.
///
/// The service maps these to caller-facing
/// [`StoreError`](crate::store::StoreError) variants: `NotFound` stays a
/// first-class expected outcome, everything else becomes `Internal`.
#[derive(Debug)]
pub enum StorageError {
    /// The key does not exist, or existed and has expired.
    NotFound {
        /// The key that was not found.
        key: String,
    },

    /// An I/O or backend-specific failure (network, timeout, protocol).
    Backend {
        /// Human-readable description of the failure.
        message: String,
        /// The underlying error, if available. Accessible via
        /// [`std::error::Error::source()`].
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { key } => write!(f, "key not found: {key}"),
            Self::Backend { message, .. } => write!(f, "backend error: {message}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Backend {
                source: Some(src), ..
            } => Some(src.as_ref()),
            _ => None,
        }
    }
}

/// Hash-field storage backend with per-key TTL.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the RPC server shares one
/// backend across connection handlers.
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Atomically replaces every field of `key` and refreshes its TTL.
    ///
    /// Full overwrite: fields absent from `fields` do not survive the
    /// write. Creates the key if it does not exist. Never partially
    /// applies.
    ///
    /// # Errors
    ///
    /// [`StorageError::Backend`] on I/O or backend-specific failures.
    async fn write_fields(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl: Duration,
    ) -> Result<(), StorageError>;

    /// Reads all fields of `key` in one round trip.
    ///
    /// # Errors
    ///
    /// - [`StorageError::NotFound`] if the key is absent or expired.
    /// - [`StorageError::Backend`] on I/O or backend-specific failures.
    async fn read_fields(&self, key: &str) -> Result<HashMap<String, String>, StorageError>;
}
