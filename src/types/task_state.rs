//! Task lifecycle record and its closed status enum.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Task lifecycle status.
///
/// The set is closed: a stored value outside it is a store-corruption
/// condition, never a valid state. On the wire and in storage a status is
/// its SCREAMING_SNAKE string (`"RUNNING"`).
///
/// # Examples
///
/// ```
/// use swarmlink::types::TaskStatus;
///
/// assert_eq!(TaskStatus::Running.as_str(), "RUNNING");
/// assert_eq!("SUCCEEDED".parse::<TaskStatus>().unwrap(), TaskStatus::Succeeded);
/// assert!("DONE".parse::<TaskStatus>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Queued, not yet picked up by a worker.
    Pending,
    /// A worker is actively processing the task.
    Running,
    /// Finished successfully (terminal).
    Succeeded,
    /// Finished with an error (terminal).
    Failed,
    /// Abandoned before completion (terminal).
    Cancelled,
}

impl TaskStatus {
    /// The storage/wire string for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Returns `true` if no further status changes are expected.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored status string that does not map to any [`TaskStatus`] member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown task status: {}", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for TaskStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "RUNNING" => Ok(Self::Running),
            "SUCCEEDED" => Ok(Self::Succeeded),
            "FAILED" => Ok(Self::Failed),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// The execution status of one in-flight task.
///
/// The store is the sole authority for this record: it is created on
/// first write, fully replaced by every subsequent write, and expires
/// 24 hours after the last write. `task_id` is immutable once the record
/// exists; the store indexes by it exclusively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskState {
    /// Unique task key.
    pub task_id: String,

    /// Current lifecycle status.
    pub status: TaskStatus,

    /// Identifier of the worker that produced this update.
    #[serde(default)]
    pub worker_id: String,

    /// When the store last wrote this record (UTC, assigned by the store).
    pub last_update: DateTime<Utc>,

    /// Free-form progress detail.
    #[serde(default)]
    pub details: String,
}
