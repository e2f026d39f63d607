//! Agent layer: the LLM conversation adapter and the tools it can call

pub mod conversation;
pub mod http;
pub mod prompt;
pub mod provider;
pub mod registry;
pub mod tools;

pub use conversation::{AgentError, ConversationAgent, OpenAiAgent};
pub use provider::{Tool, ToolError, ToolInput};
pub use registry::ToolRegistry;
pub use tools::Toolbox;
