//! Backend abstraction used by tool handlers.

use crate::error::TodoistError;
use crate::types::{NewTask, Task};
use async_trait::async_trait;

/// A remote task store.
///
/// Implementations must be `Send + Sync`: the server invokes the backend from
/// many concurrently running request tasks.
#[async_trait]
pub trait TaskBackend: Send + Sync {
    /// Creates a task and returns it as stored by the backend.
    async fn add_task(&self, task: NewTask) -> Result<Task, TodoistError>;
}
