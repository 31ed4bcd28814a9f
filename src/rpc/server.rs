//! TCP server exposing the task state store.
//!
//! One spawned task per accepted connection; each connection processes
//! requests sequentially in arrival order. A malformed frame earns an
//! `INVALID_ARGUMENT` error response and the connection keeps serving --
//! only socket errors and cancellation end it. All store failures come
//! back as structured [`ErrorBody`] responses; nothing store-related can
//! kill the accept loop.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::rpc::{
    ErrorBody, GetTaskStateParams, GetTaskStateResult, HealthResult, Request, Response,
    SetTaskStateParams, SetTaskStateResult, METHOD_GET_STATE, METHOD_HEALTH, METHOD_SET_STATE,
};
use crate::store::{StateBackend, StatusCode, StoreError, TaskStateStore};

/// Serves [`TaskStateStore`] operations over newline-delimited JSON.
///
/// # Examples
///
/// ```no_run
/// use swarmlink::rpc::TaskStateServer;
/// use swarmlink::store::{InMemoryBackend, TaskStateStore};
/// use tokio::net::TcpListener;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> std::io::Result<()> {
/// let listener = TcpListener::bind("0.0.0.0:50051").await?;
/// let server = TaskStateServer::new(TaskStateStore::new(InMemoryBackend::new()));
/// server.serve(listener, CancellationToken::new()).await
/// # }
/// ```
#[derive(Debug)]
pub struct TaskStateServer<B> {
    store: Arc<TaskStateStore<B>>,
}

impl<B: StateBackend + 'static> TaskStateServer<B> {
    /// Wraps a store for serving.
    pub fn new(store: TaskStateStore<B>) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    /// Accepts connections until `cancel` fires.
    ///
    /// Each connection is handled on its own task. Cancellation stops
    /// the accept loop immediately; connection tasks notice it before
    /// reading their next frame.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if accepting fails. Per-connection errors
    /// are logged, not propagated.
    pub async fn serve(
        &self,
        listener: TcpListener,
        cancel: CancellationToken,
    ) -> std::io::Result<()> {
        info!(addr = %listener.local_addr()?, "task state server listening");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("task state server shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    let (socket, peer) = accepted?;
                    debug!(%peer, "connection accepted");
                    let store = Arc::clone(&self.store);
                    let conn_cancel = cancel.clone();
                    tokio::spawn(async move {
                        if let Err(err) = handle_connection(socket, store, conn_cancel).await {
                            debug!(%peer, %err, "connection closed with error");
                        }
                    });
                }
            }
        }
    }
}

async fn handle_connection<B: StateBackend>(
    socket: TcpStream,
    store: Arc<TaskStateStore<B>>,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let (read_half, mut write_half) = socket.into_split();
    let mut lines = BufReader::new(read_half).lines();

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            // Peer closed the connection.
            return Ok(());
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = dispatch(&store, &line).await;
        write_response(&mut write_half, &response).await?;
    }
}

async fn write_response(write_half: &mut OwnedWriteHalf, response: &Response) -> std::io::Result<()> {
    let mut frame = serde_json::to_vec(response).map_err(std::io::Error::other)?;
    frame.push(b'\n');
    write_half.write_all(&frame).await
}

async fn dispatch<B: StateBackend>(store: &TaskStateStore<B>, line: &str) -> Response {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(err) => {
            return error_response(
                0,
                StatusCode::InvalidArgument,
                format!("malformed request frame: {err}"),
            );
        }
    };

    match request.method.as_str() {
        METHOD_SET_STATE => {
            let params: SetTaskStateParams = match serde_json::from_value(request.params) {
                Ok(params) => params,
                Err(err) => {
                    return error_response(
                        request.id,
                        StatusCode::InvalidArgument,
                        format!("invalid state/set params: {err}"),
                    );
                }
            };
            match store
                .set_task_state(&params.task_id, params.status, &params.worker_id, &params.details)
                .await
            {
                Ok(()) => ok_response(
                    request.id,
                    &SetTaskStateResult {
                        success: true,
                        task_id: params.task_id,
                    },
                ),
                Err(err) => store_error_response(request.id, &err),
            }
        }
        METHOD_GET_STATE => {
            let params: GetTaskStateParams = match serde_json::from_value(request.params) {
                Ok(params) => params,
                Err(err) => {
                    return error_response(
                        request.id,
                        StatusCode::InvalidArgument,
                        format!("invalid state/get params: {err}"),
                    );
                }
            };
            match store.get_task_state(&params.task_id).await {
                Ok(state) => ok_response(request.id, &GetTaskStateResult { state }),
                Err(err) => store_error_response(request.id, &err),
            }
        }
        METHOD_HEALTH => ok_response(
            request.id,
            &HealthResult {
                status: "SERVING".to_string(),
            },
        ),
        other => error_response(
            request.id,
            StatusCode::InvalidArgument,
            format!("unknown method: {other}"),
        ),
    }
}

fn ok_response<T: serde::Serialize>(id: u64, result: &T) -> Response {
    match serde_json::to_value(result) {
        Ok(value) => Response {
            id,
            result: Some(value),
            error: None,
        },
        Err(err) => error_response(
            id,
            StatusCode::Internal,
            format!("failed to encode result: {err}"),
        ),
    }
}

fn error_response(id: u64, code: StatusCode, message: String) -> Response {
    Response {
        id,
        result: None,
        error: Some(ErrorBody { code, message }),
    }
}

fn store_error_response(id: u64, err: &StoreError) -> Response {
    error_response(id, err.code(), err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryBackend;
    use pretty_assertions::assert_eq;

    fn test_store() -> TaskStateStore<InMemoryBackend> {
        TaskStateStore::new(InMemoryBackend::new())
    }

    #[tokio::test]
    async fn dispatch_malformed_frame_is_invalid_argument() {
        let response = dispatch(&test_store(), "this is not json").await;
        assert_eq!(response.id, 0);
        let error = response.error.unwrap();
        assert_eq!(error.code, StatusCode::InvalidArgument);
    }

    #[tokio::test]
    async fn dispatch_unknown_method_is_invalid_argument() {
        let response = dispatch(
            &test_store(),
            r#"{"id": 3, "method": "state/delete", "params": {}}"#,
        )
        .await;
        assert_eq!(response.id, 3);
        assert_eq!(response.error.unwrap().code, StatusCode::InvalidArgument);
    }

    #[tokio::test]
    async fn dispatch_set_then_get_round_trips() {
        let store = test_store();
        let set = dispatch(
            &store,
            r#"{"id": 1, "method": "state/set", "params": {"taskId": "t1", "status": "RUNNING", "workerId": "worker-7"}}"#,
        )
        .await;
        assert!(set.error.is_none(), "set failed: {:?}", set.error);
        let result = set.result.unwrap();
        assert_eq!(result["success"], true);
        assert_eq!(result["taskId"], "t1");

        let get = dispatch(
            &store,
            r#"{"id": 2, "method": "state/get", "params": {"taskId": "t1"}}"#,
        )
        .await;
        let state = &get.result.unwrap()["state"];
        assert_eq!(state["taskId"], "t1");
        assert_eq!(state["status"], "RUNNING");
        assert_eq!(state["workerId"], "worker-7");
        assert_eq!(state["details"], "");
    }

    #[tokio::test]
    async fn dispatch_get_unknown_task_is_not_found() {
        let response = dispatch(
            &test_store(),
            r#"{"id": 5, "method": "state/get", "params": {"taskId": "unknown-id"}}"#,
        )
        .await;
        assert_eq!(response.error.unwrap().code, StatusCode::NotFound);
    }

    #[tokio::test]
    async fn dispatch_missing_params_is_invalid_argument() {
        let response = dispatch(&test_store(), r#"{"id": 6, "method": "state/set"}"#).await;
        assert_eq!(response.error.unwrap().code, StatusCode::InvalidArgument);
    }

    #[tokio::test]
    async fn dispatch_health_reports_serving() {
        let response = dispatch(&test_store(), r#"{"id": 9, "method": "health/check"}"#).await;
        assert_eq!(response.result.unwrap()["status"], "SERVING");
    }

    #[tokio::test]
    async fn dispatch_corrupt_status_is_internal() {
        use crate::store::StateBackend;

        // Poison the backend with a status outside the closed enum set
        // before handing it to the store.
        let backend = InMemoryBackend::new();
        backend
            .write_fields(
                "task_state:t1",
                &[
                    ("status".to_string(), "EXPLODED".to_string()),
                    ("last_update".to_string(), "2026-08-30T00:00:00Z".to_string()),
                ],
                std::time::Duration::from_secs(60),
            )
            .await
            .unwrap();
        let store = TaskStateStore::new(backend);

        let response = dispatch(
            &store,
            r#"{"id": 8, "method": "state/get", "params": {"taskId": "t1"}}"#,
        )
        .await;
        assert_eq!(response.error.unwrap().code, StatusCode::Internal);
    }
}
