//! HTTPS client for the Todoist REST API.

use crate::backend::TaskBackend;
use crate::config::TodoistConfig;
use crate::error::TodoistError;
use crate::types::{NewTask, Task};
use async_trait::async_trait;
use uuid::Uuid;

/// Longest error body kept in `TodoistError::Api`.
const MAX_ERROR_BODY: usize = 512;

/// Todoist REST client.
#[derive(Debug, Clone)]
pub struct TodoistClient {
    http: reqwest::Client,
    config: TodoistConfig,
}

impl TodoistClient {
    pub fn new(config: TodoistConfig) -> Result<Self, TodoistError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("taskbridge/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path)
    }

    /// Creates a task.
    pub async fn add_task(&self, task: &NewTask) -> Result<Task, TodoistError> {
        let request_id = Uuid::new_v4().to_string();
        tracing::debug!(request_id = %request_id, "POST /tasks");

        let response = self
            .http
            .post(self.url("tasks"))
            .bearer_auth(&self.config.api_token)
            .header("X-Request-Id", &request_id)
            .json(task)
            .send()
            .await
            .map_err(|e| {
                tracing::debug!(request_id = %request_id, "Todoist request failed: {:?}", e);
                TodoistError::from_transport(e)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(TodoistError::from_transport)?;

        if !status.is_success() {
            tracing::debug!(request_id = %request_id, "Todoist returned {}", status);
            return Err(TodoistError::Api {
                status: status.as_u16(),
                body: truncate(body.trim(), MAX_ERROR_BODY),
            });
        }

        let created: Task = serde_json::from_str(&body)?;
        tracing::debug!(request_id = %request_id, "Created task {}", created.id);
        Ok(created)
    }
}

#[async_trait]
impl TaskBackend for TodoistClient {
    async fn add_task(&self, task: NewTask) -> Result<Task, TodoistError> {
        TodoistClient::add_task(self, &task).await
    }
}

fn truncate(body: &str, max: usize) -> String {
    if body.len() <= max {
        return body.to_string();
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
