//! Task state store: records and retrieves the lifecycle status of
//! in-flight tasks in a TTL-bounded key-value store.
//!
//! # Architecture
//!
//! 1. **[`TaskStateStore`]** -- the service. Validates arguments, stamps
//!    `last_update`, maps stored fields back to a [`TaskState`], and
//!    classifies every failure with a [`StatusCode`].
//! 2. **[`StateBackend`]** -- dumb hash-field KV trait backends
//!    implement. No domain logic.
//! 3. **Backends** -- [`RedisBackend`] for production,
//!    [`InMemoryBackend`] for tests and embedded use.
//!
//! # Record lifecycle
//!
//! `absent -> (set) -> present -> (set)* -> present -> TTL expiry -> absent`
//!
//! Every `set` fully replaces the record and restarts the 24 h retention
//! window. There is no explicit delete. Concurrent writers on one key
//! are serialized by the backend's atomic write; the final value is
//! always one writer's complete record, never a mix.

pub mod backend;
pub mod memory;
pub mod redis;

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::{TASK_STATE_KEY_PREFIX, TASK_STATE_TTL};
use crate::types::{TaskState, TaskStatus};

pub use backend::{StateBackend, StorageError};
pub use memory::InMemoryBackend;
pub use redis::RedisBackend;

/// Hash field names of the persisted record.
const FIELD_STATUS: &str = "status";
const FIELD_WORKER_ID: &str = "worker_id";
const FIELD_LAST_UPDATE: &str = "last_update";
const FIELD_DETAILS: &str = "details";

/// Structured status codes carried on every RPC response.
///
/// Callers branch on these rather than on message text -- in particular
/// on [`NotFound`](StatusCode::NotFound), which is an expected outcome
/// for unknown or expired tasks, versus
/// [`Internal`](StatusCode::Internal), which signals a real failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    /// The operation succeeded.
    Ok,
    /// The request was rejected before touching storage.
    InvalidArgument,
    /// The task does not exist or has expired.
    NotFound,
    /// Storage failure or stored-data corruption.
    Internal,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ok => "OK",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::NotFound => "NOT_FOUND",
            Self::Internal => "INTERNAL",
        };
        f.write_str(s)
    }
}

/// Errors from task state store operations.
///
/// Use [`code`](StoreError::code) to map to the RPC status code.
#[derive(Debug)]
pub enum StoreError {
    /// A required argument was missing or empty. Nothing was stored.
    InvalidArgument {
        /// What was wrong with the request.
        message: String,
    },

    /// No record exists for the task, or it has expired. The expected,
    /// non-exceptional outcome for unknown tasks.
    NotFound {
        /// The task id that was not found.
        task_id: String,
    },

    /// A stored field does not reconstruct into a valid [`TaskState`].
    /// Data corruption, not absence.
    Corrupt {
        /// The task whose record is corrupt.
        task_id: String,
        /// The offending field name.
        field: String,
        /// The stored value that failed to parse.
        value: String,
    },

    /// The storage backend failed. Nothing was partially applied.
    Storage(StorageError),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument { message } => write!(f, "invalid argument: {message}"),
            Self::NotFound { task_id } => write!(f, "no state for task {task_id}"),
            Self::Corrupt {
                task_id,
                field,
                value,
            } => write!(
                f,
                "corrupt state for task {task_id}: field {field} holds {value:?}"
            ),
            Self::Storage(err) => write!(f, "storage failure: {err}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl StoreError {
    /// Maps this error to its RPC status code.
    ///
    /// - [`StatusCode::InvalidArgument`]: `InvalidArgument`
    /// - [`StatusCode::NotFound`]: `NotFound`
    /// - [`StatusCode::Internal`]: `Corrupt`, `Storage`
    pub fn code(&self) -> StatusCode {
        match self {
            Self::InvalidArgument { .. } => StatusCode::InvalidArgument,
            Self::NotFound { .. } => StatusCode::NotFound,
            Self::Corrupt { .. } | Self::Storage(_) => StatusCode::Internal,
        }
    }
}

/// The task state service over a pluggable [`StateBackend`].
///
/// The store is the sole authority for task state; callers never cache
/// it. Records expire 24 hours after their last write unless refreshed.
///
/// # Examples
///
/// ```
/// use swarmlink::store::{InMemoryBackend, TaskStateStore};
/// use swarmlink::types::TaskStatus;
///
/// # async fn example() -> Result<(), swarmlink::store::StoreError> {
/// let store = TaskStateStore::new(InMemoryBackend::new());
/// store.set_task_state("t1", TaskStatus::Running, "worker-7", "").await?;
/// let state = store.get_task_state("t1").await?;
/// assert_eq!(state.status, TaskStatus::Running);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TaskStateStore<B> {
    backend: B,
    ttl: Duration,
}

impl<B: StateBackend> TaskStateStore<B> {
    /// Creates a store with the standard 24 h retention window.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            ttl: TASK_STATE_TTL,
        }
    }

    /// Overrides the retention window (builder pattern).
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn state_key(task_id: &str) -> String {
        format!("{TASK_STATE_KEY_PREFIX}:{task_id}")
    }

    /// Records the current state of a task, fully replacing any previous
    /// record and restarting the retention window.
    ///
    /// All fields plus the TTL refresh land in one atomic round trip;
    /// a concurrent [`get_task_state`](Self::get_task_state) never
    /// observes a half-updated record. `last_update` is stamped by the
    /// store at write time (UTC).
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidArgument`] for an empty `task_id`.
    /// - [`StoreError::Storage`] if the backend fails; nothing is
    ///   partially applied.
    pub async fn set_task_state(
        &self,
        task_id: &str,
        status: TaskStatus,
        worker_id: &str,
        details: &str,
    ) -> Result<(), StoreError> {
        if task_id.is_empty() {
            return Err(StoreError::InvalidArgument {
                message: "task_id must not be empty".to_string(),
            });
        }

        let fields = vec![
            (FIELD_STATUS.to_string(), status.as_str().to_string()),
            (FIELD_WORKER_ID.to_string(), worker_id.to_string()),
            (
                FIELD_LAST_UPDATE.to_string(),
                Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            (FIELD_DETAILS.to_string(), details.to_string()),
        ];

        self.backend
            .write_fields(&Self::state_key(task_id), &fields, self.ttl)
            .await
            .map_err(|err| {
                warn!(task_id, %err, "task state write failed");
                StoreError::Storage(err)
            })
    }

    /// Retrieves the current state of a task.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidArgument`] for an empty `task_id`.
    /// - [`StoreError::NotFound`] if the task was never recorded or its
    ///   record has expired. Callers branch on this; it is not a system
    ///   failure.
    /// - [`StoreError::Corrupt`] if stored fields do not map back to a
    ///   valid [`TaskState`] (for example an unrecognized status string).
    /// - [`StoreError::Storage`] if the backend fails.
    pub async fn get_task_state(&self, task_id: &str) -> Result<TaskState, StoreError> {
        if task_id.is_empty() {
            return Err(StoreError::InvalidArgument {
                message: "task_id must not be empty".to_string(),
            });
        }

        let fields = self
            .backend
            .read_fields(&Self::state_key(task_id))
            .await
            .map_err(|err| match err {
                StorageError::NotFound { .. } => StoreError::NotFound {
                    task_id: task_id.to_string(),
                },
                other => {
                    warn!(task_id, err = %other, "task state read failed");
                    StoreError::Storage(other)
                }
            })?;

        let status_raw = fields.get(FIELD_STATUS).ok_or_else(|| StoreError::Corrupt {
            task_id: task_id.to_string(),
            field: FIELD_STATUS.to_string(),
            value: String::new(),
        })?;
        let status: TaskStatus = status_raw.parse().map_err(|_| StoreError::Corrupt {
            task_id: task_id.to_string(),
            field: FIELD_STATUS.to_string(),
            value: status_raw.clone(),
        })?;

        let last_update_raw =
            fields
                .get(FIELD_LAST_UPDATE)
                .ok_or_else(|| StoreError::Corrupt {
                    task_id: task_id.to_string(),
                    field: FIELD_LAST_UPDATE.to_string(),
                    value: String::new(),
                })?;
        let last_update: DateTime<Utc> = DateTime::parse_from_rfc3339(last_update_raw)
            .map_err(|_| StoreError::Corrupt {
                task_id: task_id.to_string(),
                field: FIELD_LAST_UPDATE.to_string(),
                value: last_update_raw.clone(),
            })?
            .with_timezone(&Utc);

        Ok(TaskState {
            task_id: task_id.to_string(),
            status,
            worker_id: fields.get(FIELD_WORKER_ID).cloned().unwrap_or_default(),
            last_update,
            details: fields.get(FIELD_DETAILS).cloned().unwrap_or_default(),
        })
    }
}
