//! Tool trait shared by every capability the agent can call
//!
//! Tools take one text prompt (or a structured value rendered as JSON) and
//! return text. Media tools return the content reference of what they made.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors a tool can raise. All of them end the current turn.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Backend finished without producing anything
    #[error("[{tool}] Tool unable to generate {kind}!")]
    NoArtifacts {
        /// Tool name
        tool: &'static str,
        /// Kind of artifact expected (`image`, `audio`)
        kind: &'static str,
    },
    /// Backend call failed
    #[error("[{tool}] backend error: {message}")]
    Backend {
        /// Tool name
        tool: &'static str,
        /// Backend error text
        message: String,
    },
    /// Backend did not finish in time
    #[error("[{tool}] timed out after {secs}s")]
    Timeout {
        /// Tool name
        tool: &'static str,
        /// Elapsed limit
        secs: u64,
    },
    /// Tool output could not be interpreted
    #[error("[{tool}] unexpected output: {output}")]
    InvalidOutput {
        /// Tool name
        tool: &'static str,
        /// Raw output
        output: String,
    },
    /// No tool is registered under the requested name
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

/// Input handed to a tool by the agent
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInput {
    /// Plain text prompt
    Text(String),
    /// Structured arguments
    Structured(Value),
}

impl ToolInput {
    /// Text prompt for the tool; structured input is rendered as JSON
    #[must_use]
    pub fn as_prompt(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Structured(Value::String(text)) => text.clone(),
            Self::Structured(value) => value.to_string(),
        }
    }
}

impl From<&str> for ToolInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// A capability exposed to the agent
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the agent calls the tool by
    fn name(&self) -> &'static str;

    /// Usage description shown to the agent
    fn description(&self) -> String;

    /// Whether the tool takes a single string argument
    fn is_single_input(&self) -> bool {
        true
    }

    /// Runs the tool
    async fn run(&self, input: ToolInput) -> Result<String, ToolError>;
}
