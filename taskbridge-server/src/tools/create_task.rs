//! `create_task`: adds a task to the configured backend.

use crate::registry::{ArgumentError, Tool, ToolDescriptor, ToolError};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use taskbridge_protocol::ToolCallResult;
use taskbridge_todoist::{NewTask, TaskBackend};

/// Arguments accepted by `create_task`. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateTaskArgs {
    pub content: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_string: Option<String>,
    #[serde(default)]
    pub priority: Option<u8>,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl From<CreateTaskArgs> for NewTask {
    fn from(args: CreateTaskArgs) -> Self {
        NewTask {
            content: args.content,
            description: args.description,
            due_string: args.due_string,
            priority: args.priority,
            labels: args.labels,
        }
    }
}

/// Creates a task through a [`TaskBackend`].
pub struct CreateTaskTool {
    backend: Arc<dyn TaskBackend>,
}

impl CreateTaskTool {
    pub const NAME: &'static str = "create_task";

    pub fn new(backend: Arc<dyn TaskBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for CreateTaskTool {
    type Args = CreateTaskArgs;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: Self::NAME,
            description: "Create a new task in Todoist",
            failure_action: "Failed to create task",
        }
    }

    fn validate(&self, args: &CreateTaskArgs) -> Result<(), ArgumentError> {
        if args.content.trim().is_empty() {
            return Err(ArgumentError::invalid("content must not be empty"));
        }
        if let Some(priority) = args.priority {
            if !(1..=4).contains(&priority) {
                return Err(ArgumentError::invalid(format!(
                    "priority must be between 1 and 4, got {}",
                    priority
                )));
            }
        }
        Ok(())
    }

    async fn call(&self, args: CreateTaskArgs) -> Result<ToolCallResult, ToolError> {
        let task = self
            .backend
            .add_task(args.into())
            .await
            .map_err(ToolError::from_error)?;

        tracing::info!(task_id = %task.id, "Created task");
        Ok(ToolCallResult::text(format!(
            "Successfully created task \"{}\" with ID: {}",
            task.content, task.id
        )))
    }
}
