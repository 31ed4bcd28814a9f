//! Request/response surface for the task state store.
//!
//! The protocol is newline-delimited JSON over TCP: one request object
//! per line, one response object per line, correlated by numeric `id`.
//! Every error response carries a structured [`StatusCode`] so callers
//! can branch on `NOT_FOUND` versus `INTERNAL` without parsing message
//! text.
//!
//! # Methods
//!
//! | Method | Params | Result |
//! |--------|--------|--------|
//! | `state/set` | [`SetTaskStateParams`] | [`SetTaskStateResult`] |
//! | `state/get` | [`GetTaskStateParams`] | [`GetTaskStateResult`] |
//! | `health/check` | none | [`HealthResult`] |
//!
//! `health/check` is the liveness probe; it answers `SERVING` whenever
//! the server's accept loop is running.

pub mod client;
pub mod server;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::StatusCode;
use crate::types::{TaskState, TaskStatus};

pub use client::{RpcError, TaskStateClient};
pub use server::TaskStateServer;

/// Method name for recording task state.
pub const METHOD_SET_STATE: &str = "state/set";
/// Method name for retrieving task state.
pub const METHOD_GET_STATE: &str = "state/get";
/// Method name for the liveness probe.
pub const METHOD_HEALTH: &str = "health/check";

/// One request frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Caller-chosen correlation id, echoed on the response.
    pub id: u64,
    /// Method name, one of the `METHOD_*` constants.
    pub method: String,
    /// Method parameters; shape depends on the method.
    #[serde(default)]
    pub params: Value,
}

/// One response frame. Exactly one of `result`/`error` is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Correlation id of the request this answers (0 if the request id
    /// was unrecoverable from a malformed frame).
    pub id: u64,
    /// Method result on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Structured failure on error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

/// Structured error carried on failed responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Status code the caller branches on.
    pub code: StatusCode,
    /// Human-readable detail.
    pub message: String,
}

/// Parameters of `state/set`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetTaskStateParams {
    /// The task being updated.
    pub task_id: String,
    /// New lifecycle status. An unrecognized string fails parameter
    /// decoding and is rejected as `INVALID_ARGUMENT`.
    pub status: TaskStatus,
    /// Worker reporting the update.
    #[serde(default)]
    pub worker_id: String,
    /// Free-form progress detail.
    #[serde(default)]
    pub details: String,
}

/// Result of `state/set`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetTaskStateResult {
    /// Always `true` on a success response.
    pub success: bool,
    /// The task that was updated.
    pub task_id: String,
}

/// Parameters of `state/get`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTaskStateParams {
    /// The task to look up.
    pub task_id: String,
}

/// Result of `state/get`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTaskStateResult {
    /// The fully reconstructed state record.
    pub state: TaskState,
}

/// Result of `health/check`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResult {
    /// `"SERVING"` while the server accepts connections.
    pub status: String,
}
