//! Tool Registry - tools available to the agent, keyed by name

use super::provider::{Tool, ToolError, ToolInput};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Registry that routes tool calls by name
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty registry
    #[must_use]
    pub const fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. A tool registered under an existing name replaces it.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        debug!(tool = tool.name(), "Registered tool");
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    /// Looks up a tool by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    /// Find the tool and execute it
    ///
    /// # Errors
    ///
    /// Returns `ToolError::UnknownTool` if nothing is registered under `name`,
    /// or the tool's own error.
    pub async fn execute(&self, name: &str, input: ToolInput) -> Result<String, ToolError> {
        let Some(tool) = self.get(name) else {
            warn!(tool = name, "No tool registered under name");
            return Err(ToolError::UnknownTool(name.to_string()));
        };
        debug!(tool = name, "Executing tool");
        tool.run(input).await
    }

    /// Registered tool names in registration order
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Whether no tools are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// `name: description` lines for the system prompt
    #[must_use]
    pub fn describe(&self) -> String {
        self.tools
            .iter()
            .map(|t| format!("{}: {}", t.name(), t.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Function definitions in the chat-completions `tools` format.
    /// Single-input tools take one string parameter named `input`; others
    /// accept a free-form object.
    #[must_use]
    pub fn function_definitions(&self) -> Vec<Value> {
        self.tools
            .iter()
            .map(|t| {
                let parameters = if t.is_single_input() {
                    json!({
                        "type": "object",
                        "properties": {
                            "input": {"type": "string", "description": "Tool input"}
                        },
                        "required": ["input"]
                    })
                } else {
                    json!({"type": "object", "additionalProperties": true})
                };
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name(),
                        "description": t.description(),
                        "parameters": parameters,
                    }
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::provider::MockTool;

    fn mock(name: &'static str, output: &'static str) -> Arc<dyn Tool> {
        let mut tool = MockTool::new();
        tool.expect_name().return_const(name);
        tool.expect_is_single_input().return_const(true);
        tool.expect_description()
            .returning(move || format!("{name} description"));
        tool.expect_run()
            .returning(move |_| Ok(output.to_string()));
        Arc::new(tool)
    }

    #[tokio::test]
    async fn test_execute_routes_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(mock("Search", "results"));
        registry.register(mock("GenerateImage", "3fa85f64-5717-4562-b3fc-2c963f66afa6"));

        assert_eq!(
            registry.execute("Search", "weather".into()).await.ok().as_deref(),
            Some("results")
        );
        assert_eq!(registry.names(), vec!["Search", "GenerateImage"]);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let registry = ToolRegistry::new();
        let err = registry.execute("Nope", "x".into()).await.expect_err("unknown");
        assert!(matches!(err, ToolError::UnknownTool(name) if name == "Nope"));
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut registry = ToolRegistry::new();
        registry.register(mock("Search", "a"));
        registry.register(mock("Search", "b"));
        assert_eq!(registry.names(), vec!["Search"]);
    }

    #[test]
    fn test_function_definitions() {
        let mut registry = ToolRegistry::new();
        registry.register(mock("REMIND", "ok"));
        let defs = registry.function_definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0]["function"]["name"], "REMIND");
        assert_eq!(defs[0]["function"]["parameters"]["required"][0], "input");
        assert!(registry.describe().starts_with("REMIND: "));
    }

    #[test]
    fn test_multi_input_tool_gets_open_schema() {
        let mut tool = MockTool::new();
        tool.expect_name().return_const("Plan");
        tool.expect_is_single_input().return_const(false);
        tool.expect_description().returning(|| "plans".to_string());

        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(tool));
        let defs = registry.function_definitions();
        assert_eq!(defs[0]["function"]["parameters"]["additionalProperties"], true);
        assert!(defs[0]["function"]["parameters"]["required"].is_null());
    }
}
