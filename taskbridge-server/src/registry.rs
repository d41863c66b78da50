//! Tool registry.
//!
//! Each tool declares a typed argument struct. Arguments are deserialized
//! into it when the tool is looked up, before anything is invoked, so a
//! handler only ever sees well-shaped input.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use taskbridge_protocol::ToolCallResult;
use thiserror::Error;

/// Static description of a registered tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolDescriptor {
    /// Name callers use in `params.name`.
    pub name: &'static str,
    /// One-line description.
    pub description: &'static str,
    /// Prefix for failure messages, e.g. "Failed to create task".
    pub failure_action: &'static str,
}

/// A tool failure.
///
/// `Display` is the short diagnostic sent to the caller. The underlying error,
/// if any, is kept as the source for local logging only.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ToolError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ToolError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps an error, using its `Display` output as the diagnostic.
    pub fn from_error<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Returns the caller-facing diagnostic.
    pub fn diagnostic(&self) -> &str {
        &self.message
    }
}

/// Arguments rejected before a tool runs.
#[derive(Debug, Error)]
pub enum ArgumentError {
    /// The arguments do not deserialize into the tool's argument type.
    #[error("{0}")]
    Shape(#[from] serde_json::Error),

    /// Well-shaped arguments that the tool refuses.
    #[error("{0}")]
    Invalid(String),
}

impl ArgumentError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

/// A remotely callable tool.
#[async_trait]
pub trait Tool: Send + Sync + 'static {
    /// Typed argument shape, validated before `call`.
    type Args: DeserializeOwned + Send;

    fn descriptor(&self) -> ToolDescriptor;

    /// Checks deserialized arguments before the tool is invoked.
    fn validate(&self, _args: &Self::Args) -> Result<(), ArgumentError> {
        Ok(())
    }

    async fn call(&self, args: Self::Args) -> Result<ToolCallResult, ToolError>;
}

/// Pending tool invocation, produced once arguments have been validated.
pub type Invocation<'a> = BoxFuture<'a, Result<ToolCallResult, ToolError>>;

/// Type-erased registry entry.
pub trait RegisteredTool: Send + Sync {
    fn descriptor(&self) -> &ToolDescriptor;

    /// Validates `arguments` against the tool's argument type and its own
    /// checks, then returns the invocation. Nothing runs until the returned
    /// future is polled.
    fn prepare(&self, arguments: Value) -> Result<Invocation<'_>, ArgumentError>;
}

struct Entry<T: Tool> {
    tool: T,
    descriptor: ToolDescriptor,
}

impl<T: Tool> RegisteredTool for Entry<T> {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn prepare(&self, arguments: Value) -> Result<Invocation<'_>, ArgumentError> {
        let args: T::Args = serde_json::from_value(arguments)?;
        self.tool.validate(&args)?;
        Ok(self.tool.call(args))
    }
}

/// Immutable name-to-tool mapping, shared by all request tasks.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Arc<HashMap<&'static str, Arc<dyn RegisteredTool>>>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// Looks up a tool by name.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn RegisteredTool>> {
        self.tools.get(name).cloned()
    }

    /// Returns registered tool names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.tools.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

/// Collects tools before the registry is frozen.
#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: HashMap<&'static str, Arc<dyn RegisteredTool>>,
}

impl ToolRegistryBuilder {
    /// Registers a tool. A later registration under the same name replaces
    /// the earlier one.
    pub fn register<T: Tool>(mut self, tool: T) -> Self {
        let descriptor = tool.descriptor();
        if self.tools.contains_key(descriptor.name) {
            tracing::warn!("Tool {} registered twice, replacing", descriptor.name);
        }
        self.tools
            .insert(descriptor.name, Arc::new(Entry { tool, descriptor }));
        self
    }

    pub fn build(self) -> ToolRegistry {
        ToolRegistry {
            tools: Arc::new(self.tools),
        }
    }
}
