//! Request dispatch.

use crate::registry::ToolRegistry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use taskbridge_protocol::{
    ErrorCode, Request, Response, ResponseError, ToolCallParams, TOOLS_CALL,
};

/// Default upper bound on a single tool invocation.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Dispatch statistics.
#[derive(Debug, Default)]
pub struct DispatchStats {
    pub requests_total: AtomicU64,
    pub errors_total: AtomicU64,
    pub timeouts_total: AtomicU64,
}

/// Routes parsed requests to registered tools.
///
/// Every request yields exactly one response carrying the request's `id`
/// (absent stays absent, `null` stays `null`).
pub struct Dispatcher {
    registry: ToolRegistry,
    tool_timeout: Duration,
    stats: Arc<DispatchStats>,
}

impl Dispatcher {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            stats: Arc::new(DispatchStats::default()),
        }
    }

    /// Sets the per-invocation timeout.
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn stats(&self) -> &Arc<DispatchStats> {
        &self.stats
    }

    /// Handles a request and returns its response.
    pub async fn dispatch(&self, request: Request) -> Response {
        self.stats.requests_total.fetch_add(1, Ordering::Relaxed);

        let id = request.id;
        let result = self.route(&request.method, request.params).await;

        match result {
            Ok(result) => Response::ok(id, result),
            Err(error) => {
                self.stats.errors_total.fetch_add(1, Ordering::Relaxed);
                Response::error(id, error)
            }
        }
    }

    async fn route(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<taskbridge_protocol::ToolCallResult, ResponseError> {
        if method != TOOLS_CALL {
            tracing::debug!("Unknown method {:?}", method);
            return Err(ResponseError::unknown_method(method));
        }

        let call: ToolCallParams = serde_json::from_value(params).map_err(|e| {
            tracing::debug!("Rejected tools/call params: {}", e);
            ResponseError::invalid_params(format!("Invalid params: {}", e))
        })?;

        let tool = self.registry.lookup(&call.name).ok_or_else(|| {
            tracing::debug!("Unknown tool {:?}", call.name);
            ResponseError::unknown_tool(&call.name)
        })?;
        let descriptor = *tool.descriptor();

        let invocation = tool.prepare(call.arguments).map_err(|e| {
            tracing::debug!(tool = descriptor.name, "Rejected arguments: {}", e);
            ResponseError::invalid_params(format!(
                "Invalid arguments for {}: {}",
                descriptor.name, e
            ))
        })?;

        match tokio::time::timeout(self.tool_timeout, invocation).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => {
                tracing::error!(tool = descriptor.name, "Tool failed: {:?}", e);
                Err(ResponseError::internal(format!(
                    "{}: {}",
                    descriptor.failure_action, e
                )))
            }
            Err(_) => {
                self.stats.timeouts_total.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    tool = descriptor.name,
                    "Tool timed out after {:?}",
                    self.tool_timeout
                );
                Err(ResponseError::new(
                    ErrorCode::InternalError,
                    format!(
                        "{}: timed out after {:?}",
                        descriptor.failure_action, self.tool_timeout
                    ),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::builtin_registry;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use taskbridge_todoist::{NewTask, Task, TaskBackend, TodoistError};

    struct StubBackend {
        outcome: Result<&'static str, &'static str>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl TaskBackend for StubBackend {
        async fn add_task(&self, task: NewTask) -> Result<Task, TodoistError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match self.outcome {
                Ok(id) => Ok(Task::new(id, task.content)),
                Err(diagnostic) => Err(TodoistError::Network(diagnostic)),
            }
        }
    }

    fn dispatcher(outcome: Result<&'static str, &'static str>) -> Dispatcher {
        Dispatcher::new(builtin_registry(Arc::new(StubBackend {
            outcome,
            delay: None,
        })))
    }

    fn to_json(response: &Response) -> Value {
        serde_json::to_value(response).unwrap()
    }

    #[tokio::test]
    async fn test_create_task_success() {
        let d = dispatcher(Ok("12345"));
        let request = Request::tool_call(2, "create_task", json!({"content": "Buy milk"}));

        let response = d.dispatch(request).await;
        assert_eq!(
            to_json(&response),
            json!({
                "jsonrpc": "2.0",
                "id": 2,
                "result": {"content": {
                    "type": "text",
                    "text": "Successfully created task \"Buy milk\" with ID: 12345"
                }}
            })
        );
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let d = dispatcher(Ok("1"));
        let response = d.dispatch(Request::new(7, "unknown")).await;
        assert_eq!(
            to_json(&response),
            json!({
                "jsonrpc": "2.0",
                "id": 7,
                "error": {"code": -32601, "message": "Unknown method: unknown"}
            })
        );
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let d = dispatcher(Ok("1"));
        let response = d
            .dispatch(Request::tool_call(3, "bogus_tool", json!({})))
            .await;
        assert_eq!(
            to_json(&response),
            json!({
                "jsonrpc": "2.0",
                "id": 3,
                "error": {"code": -32601, "message": "Unknown tool: bogus_tool"}
            })
        );
    }

    #[tokio::test]
    async fn test_backend_failure() {
        let d = dispatcher(Err("network timeout"));
        let response = d
            .dispatch(Request::tool_call(4, "create_task", json!({"content": "x"})))
            .await;
        assert_eq!(
            to_json(&response),
            json!({
                "jsonrpc": "2.0",
                "id": 4,
                "error": {"code": -32603, "message": "Failed to create task: network timeout"}
            })
        );
        assert_eq!(d.stats().errors_total.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_missing_params_is_invalid() {
        let d = dispatcher(Ok("1"));
        let response = d.dispatch(Request::new(5, TOOLS_CALL)).await;
        let error = response.error.unwrap();
        assert_eq!(error.code, ErrorCode::InvalidParams);
        assert!(error.message.starts_with("Invalid params:"));
        assert_eq!(response.id, Some(json!(5)));
    }

    #[tokio::test]
    async fn test_invalid_arguments() {
        let d = dispatcher(Ok("1"));
        let response = d
            .dispatch(Request::tool_call(6, "create_task", json!({"due_string": "today"})))
            .await;
        let error = response.error.unwrap();
        assert_eq!(error.code, ErrorCode::InvalidParams);
        assert!(error.message.starts_with("Invalid arguments for create_task:"));
    }

    #[tokio::test]
    async fn test_rejected_argument_values_are_invalid_params() {
        // A failing backend would turn into -32603 if it were reached
        let d = dispatcher(Err("should not be called"));

        let response = d
            .dispatch(Request::tool_call(7, "create_task", json!({"content": "   "})))
            .await;
        let error = response.error.unwrap();
        assert_eq!(error.code, ErrorCode::InvalidParams);
        assert_eq!(
            error.message,
            "Invalid arguments for create_task: content must not be empty"
        );

        let response = d
            .dispatch(Request::tool_call(
                8,
                "create_task",
                json!({"content": "x", "priority": 7}),
            ))
            .await;
        let error = response.error.unwrap();
        assert_eq!(error.code, ErrorCode::InvalidParams);
        assert_eq!(
            error.message,
            "Invalid arguments for create_task: priority must be between 1 and 4, got 7"
        );
    }

    #[tokio::test]
    async fn test_id_passthrough() {
        let d = dispatcher(Ok("1"));

        let absent = Request {
            id: None,
            ..Request::new(0, "nope")
        };
        assert!(to_json(&d.dispatch(absent).await).get("id").is_none());

        let null = Request::new(Value::Null, "nope");
        assert_eq!(to_json(&d.dispatch(null).await)["id"], Value::Null);

        let string = Request::new("abc", "nope");
        assert_eq!(to_json(&d.dispatch(string).await)["id"], json!("abc"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tool_timeout() {
        let backend = StubBackend {
            outcome: Ok("1"),
            delay: Some(Duration::from_secs(60)),
        };
        let d = Dispatcher::new(builtin_registry(Arc::new(backend)))
            .with_tool_timeout(Duration::from_secs(2));

        let response = d
            .dispatch(Request::tool_call(8, "create_task", json!({"content": "x"})))
            .await;
        let error = response.error.unwrap();
        assert_eq!(error.code, ErrorCode::InternalError);
        assert_eq!(error.message, "Failed to create task: timed out after 2s");
        assert_eq!(d.stats().timeouts_total.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_stats_count_requests() {
        let d = dispatcher(Ok("1"));
        d.dispatch(Request::new(1, "nope")).await;
        d.dispatch(Request::tool_call(2, "create_task", json!({"content": "x"})))
            .await;

        assert_eq!(d.stats().requests_total.load(Ordering::Relaxed), 2);
        assert_eq!(d.stats().errors_total.load(Ordering::Relaxed), 1);
    }
}
