//! Per-agent tool registry.
//!
//! Maps tool names to handlers and turns every way an invocation can go
//! wrong (unknown name, bad arguments, failing or panicking body) into a
//! [`ToolOutcome`] the reasoning loop can feed back to the model.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::warn;

use super::tool::{ActionInput, Tool, ToolDefinition};
use crate::error::ToolError;

/// Result of asking the registry to run a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    /// The tool ran and produced output.
    Success(String),
    /// The tool could not be run or failed.
    Failed(ToolError),
}

impl ToolOutcome {
    /// Text fed back to the model as the step's observation.
    #[must_use]
    pub fn observation(&self) -> String {
        match self {
            Self::Success(output) => output.clone(),
            Self::Failed(err) => err.to_string(),
        }
    }

    /// Returns `true` if the tool ran successfully.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Registry of tools available to one agent.
///
/// Read-only once the owning agent is constructed.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool. The first registration of a name wins; later
    /// duplicates are ignored.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            warn!(tool = %name, "duplicate tool registration ignored");
            return;
        }
        self.tools.insert(name, tool);
    }

    /// Builds a registry from a list of tools.
    #[must_use]
    pub fn from_tools(tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        let mut registry = Self::new();
        for tool in tools {
            registry.register(tool);
        }
        registry
    }

    /// Looks up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Returns `true` if a tool with this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered tool names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Catalog entries for every tool.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Resolves, binds and runs a tool.
    ///
    /// Never fails: every error, including a panic in the tool body, is
    /// reported as [`ToolOutcome::Failed`].
    pub async fn invoke(&self, name: &str, input: &ActionInput) -> ToolOutcome {
        let Some(tool) = self.tools.get(name) else {
            return ToolOutcome::Failed(ToolError::NotFound {
                name: name.to_string(),
            });
        };

        let args = match tool.schema().bind(name, input) {
            Ok(args) => args,
            Err(err) => {
                warn!(tool = %name, error = %err, "tool argument binding failed");
                return ToolOutcome::Failed(err);
            }
        };

        match AssertUnwindSafe(tool.invoke(args)).catch_unwind().await {
            Ok(Ok(output)) => ToolOutcome::Success(output),
            Ok(Err(err)) => {
                warn!(tool = %name, error = %err, "tool execution failed");
                ToolOutcome::Failed(err)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(tool = %name, %message, "tool panicked");
                ToolOutcome::Failed(ToolError::Execution {
                    name: name.to_string(),
                    message,
                })
            }
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic with non-string payload".to_string())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::agent::tool::{FnTool, ParamSpec, ParameterSchema, ToolArgs};

    fn echo(args: &ToolArgs) -> Result<String, String> {
        Ok(format!("echo: {}", args.str_or("query", "")))
    }

    fn explode(_: &ToolArgs) -> Result<String, String> {
        panic!("kaboom")
    }

    fn registry() -> ToolRegistry {
        let schema = ParameterSchema::new().required(ParamSpec::string("query", "text"));
        ToolRegistry::from_tools([
            Arc::new(FnTool::new("echo", "Echo input", schema.clone(), echo)) as Arc<dyn Tool>,
            Arc::new(FnTool::new("explode", "Panics", schema, explode)),
        ])
    }

    #[tokio::test]
    async fn test_invoke_success() {
        let outcome = registry()
            .invoke("echo", &ActionInput::Raw("hi".to_string()))
            .await;
        assert_eq!(outcome, ToolOutcome::Success("echo: hi".to_string()));
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_invoke_unknown_tool() {
        let outcome = registry().invoke("nope", &ActionInput::Empty).await;
        assert_eq!(outcome.observation(), "Unknown tool 'nope'");
    }

    #[tokio::test]
    async fn test_invoke_bad_arguments() {
        let outcome = registry().invoke("echo", &ActionInput::Empty).await;
        assert!(matches!(
            outcome,
            ToolOutcome::Failed(ToolError::InvalidArguments { .. })
        ));
    }

    #[tokio::test]
    async fn test_invoke_catches_panic() {
        let outcome = registry()
            .invoke("explode", &ActionInput::Raw("x".to_string()))
            .await;
        assert_eq!(outcome.observation(), "Error executing explode: kaboom");
    }

    #[test]
    fn test_duplicate_registration_keeps_first() {
        let mut reg = registry();
        let schema = ParameterSchema::new();
        reg.register(Arc::new(FnTool::new("echo", "second", schema, echo)));
        assert_eq!(reg.len(), 2);
        assert_eq!(
            reg.get("echo").map(|t| t.description().to_string()),
            Some("Echo input".to_string())
        );
        assert_eq!(reg.names(), vec!["echo".to_string(), "explode".to_string()]);
    }
}
