//! Typed client for the task state server.
//!
//! [`TaskStateClient`] speaks the newline-delimited JSON protocol over a
//! single TCP connection, issuing one request at a time. Error responses
//! surface as [`RpcError::Status`] carrying the server's [`StatusCode`],
//! so callers branch on `NOT_FOUND` versus `INTERNAL` the same way
//! in-process callers branch on [`StoreError`](crate::store::StoreError).

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::rpc::{
    GetTaskStateParams, GetTaskStateResult, HealthResult, Request, Response, SetTaskStateParams,
    SetTaskStateResult, METHOD_GET_STATE, METHOD_HEALTH, METHOD_SET_STATE,
};
use crate::store::StatusCode;
use crate::types::{TaskState, TaskStatus};

/// Errors from client-side RPC calls.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The connection failed or was closed mid-call.
    #[error("rpc transport failed: {0}")]
    Io(#[from] std::io::Error),

    /// The peer sent something that does not fit the protocol.
    #[error("rpc protocol violation: {0}")]
    Protocol(String),

    /// The server answered with a structured error.
    #[error("rpc failed with {code}: {message}")]
    Status {
        /// Status code to branch on.
        code: StatusCode,
        /// Server-provided detail.
        message: String,
    },
}

impl RpcError {
    /// Returns `true` for the expected unknown-or-expired-task outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Status {
                code: StatusCode::NotFound,
                ..
            }
        )
    }
}

/// Client connection to a [`TaskStateServer`](crate::rpc::TaskStateServer).
///
/// # Examples
///
/// ```no_run
/// use swarmlink::rpc::TaskStateClient;
/// use swarmlink::types::TaskStatus;
///
/// # async fn example() -> Result<(), swarmlink::rpc::RpcError> {
/// let mut client = TaskStateClient::connect("127.0.0.1:50051").await?;
/// client.set_task_state("t1", TaskStatus::Running, "worker-7", "").await?;
/// let state = client.get_task_state("t1").await?;
/// assert_eq!(state.status, TaskStatus::Running);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TaskStateClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    write_half: OwnedWriteHalf,
    next_id: u64,
}

impl TaskStateClient {
    /// Connects to a task state server.
    ///
    /// # Errors
    ///
    /// [`RpcError::Io`] if the connection cannot be established.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, RpcError> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            lines: BufReader::new(read_half).lines(),
            write_half,
            next_id: 1,
        })
    }

    /// Records the state of a task.
    ///
    /// # Errors
    ///
    /// [`RpcError::Status`] with `INVALID_ARGUMENT` for an empty task id,
    /// `INTERNAL` on storage failure; [`RpcError::Io`] on transport loss.
    pub async fn set_task_state(
        &mut self,
        task_id: &str,
        status: TaskStatus,
        worker_id: &str,
        details: &str,
    ) -> Result<SetTaskStateResult, RpcError> {
        self.call(
            METHOD_SET_STATE,
            &SetTaskStateParams {
                task_id: task_id.to_string(),
                status,
                worker_id: worker_id.to_string(),
                details: details.to_string(),
            },
        )
        .await
    }

    /// Retrieves the state of a task.
    ///
    /// # Errors
    ///
    /// [`RpcError::Status`] with `NOT_FOUND` for unknown or expired
    /// tasks (branch with [`RpcError::is_not_found`]), `INTERNAL` for
    /// storage failure or corruption; [`RpcError::Io`] on transport loss.
    pub async fn get_task_state(&mut self, task_id: &str) -> Result<TaskState, RpcError> {
        let result: GetTaskStateResult = self
            .call(
                METHOD_GET_STATE,
                &GetTaskStateParams {
                    task_id: task_id.to_string(),
                },
            )
            .await?;
        Ok(result.state)
    }

    /// Liveness probe. Returns the server's health status string.
    ///
    /// # Errors
    ///
    /// [`RpcError::Io`] on transport loss.
    pub async fn health(&mut self) -> Result<String, RpcError> {
        let result: HealthResult = self.call(METHOD_HEALTH, &serde_json::json!({})).await?;
        Ok(result.status)
    }

    async fn call<P: Serialize, R: DeserializeOwned>(
        &mut self,
        method: &str,
        params: &P,
    ) -> Result<R, RpcError> {
        let id = self.next_id;
        self.next_id += 1;

        let request = Request {
            id,
            method: method.to_string(),
            params: serde_json::to_value(params)
                .map_err(|e| RpcError::Protocol(format!("failed to encode params: {e}")))?,
        };
        let mut frame = serde_json::to_vec(&request)
            .map_err(|e| RpcError::Protocol(format!("failed to encode request: {e}")))?;
        frame.push(b'\n');
        self.write_half.write_all(&frame).await?;

        let line = self
            .lines
            .next_line()
            .await?
            .ok_or_else(|| RpcError::Protocol("connection closed before response".to_string()))?;
        let response: Response = serde_json::from_str(&line)
            .map_err(|e| RpcError::Protocol(format!("unparseable response frame: {e}")))?;

        if response.id != id {
            return Err(RpcError::Protocol(format!(
                "response id {} does not match request id {id}",
                response.id
            )));
        }
        if let Some(error) = response.error {
            return Err(RpcError::Status {
                code: error.code,
                message: error.message,
            });
        }
        let result = response
            .result
            .ok_or_else(|| RpcError::Protocol("response carries neither result nor error".to_string()))?;
        serde_json::from_value(result)
            .map_err(|e| RpcError::Protocol(format!("unexpected result shape: {e}")))
    }
}
