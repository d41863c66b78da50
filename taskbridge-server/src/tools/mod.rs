//! Built-in tools.

pub mod create_task;

pub use create_task::{CreateTaskArgs, CreateTaskTool};

use crate::registry::{ToolRegistry, ToolRegistryBuilder};
use std::sync::Arc;
use taskbridge_todoist::TaskBackend;

/// Registers every built-in tool against `backend`.
pub fn register_builtin(
    builder: ToolRegistryBuilder,
    backend: Arc<dyn TaskBackend>,
) -> ToolRegistryBuilder {
    builder.register(CreateTaskTool::new(backend))
}

/// Builds a registry holding only the built-in tools.
pub fn builtin_registry(backend: Arc<dyn TaskBackend>) -> ToolRegistry {
    register_builtin(ToolRegistry::builder(), backend).build()
}
