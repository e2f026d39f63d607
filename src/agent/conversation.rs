//! Conversation agent: a thin adapter over chat-completions function calling
//!
//! Each turn sends system prompt, recent history and the user input with the
//! chat's tools, runs requested tool calls and loops until the model answers
//! in text or the iteration budget runs out.

use super::http::{send_json_request, HttpError};
use super::prompt::build_system_prompt;
use super::provider::{ToolError, ToolInput};
use super::registry::ToolRegistry;
use super::tools::Toolbox;
use crate::config::{AGENT_MAX_ITERATIONS, CHAT_TEMPERATURE, HISTORY_LIMIT};
use crate::personality::Personality;
use crate::storage::{ChatTurn, HistoryStore, StorageError};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors of an agent turn
#[derive(Debug, Error)]
pub enum AgentError {
    /// LLM request failed
    #[error("LLM error: {0}")]
    Llm(#[from] HttpError),
    /// LLM returned no usable message
    #[error("LLM returned an empty response")]
    EmptyResponse,
    /// A tool failed
    #[error(transparent)]
    Tool(#[from] ToolError),
    /// History could not be read or written
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Tool calls never converged on an answer
    #[error("No final answer after {0} iterations")]
    IterationLimit(usize),
}

/// Produces the raw text answer of a turn
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConversationAgent: Send + Sync {
    /// Runs one turn for `chat_id`
    async fn run(&self, chat_id: &str, input: &str) -> Result<String, AgentError>;

    /// Forgets the conversation of `chat_id`
    async fn reset(&self, chat_id: &str) -> Result<(), AgentError>;
}

#[derive(Deserialize, Debug)]
struct LenientToolCallFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize, Debug)]
struct LenientToolCall {
    id: String,
    function: LenientToolCallFunction,
}

#[derive(Deserialize, Debug)]
struct LenientMessage {
    content: Option<String>,
    tool_calls: Option<Vec<LenientToolCall>>,
}

#[derive(Deserialize, Debug)]
struct LenientChoice {
    message: LenientMessage,
}

#[derive(Deserialize, Debug)]
struct LenientResponse {
    #[serde(default)]
    choices: Vec<LenientChoice>,
}

/// Agent backed by an OpenAI-compatible chat completions API
pub struct OpenAiAgent {
    http: HttpClient,
    api_base: String,
    api_key: String,
    model: String,
    personality: Personality,
    toolbox: Toolbox,
    history: Arc<dyn HistoryStore>,
}

impl OpenAiAgent {
    /// Create a new agent
    #[must_use]
    pub fn new(
        http: HttpClient,
        api_base: &str,
        api_key: String,
        model: String,
        personality: Personality,
        toolbox: Toolbox,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            model,
            personality,
            toolbox,
            history,
        }
    }

    async fn complete(&self, messages: &[Value], tools: &[Value]) -> Result<LenientMessage, AgentError> {
        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": CHAT_TEMPERATURE,
        });
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }

        let auth = format!("Bearer {}", self.api_key);
        let response: LenientResponse = send_json_request(
            &self.http,
            &format!("{}/chat/completions", self.api_base),
            &body,
            &[("Authorization", auth.as_str())],
        )
        .await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or(AgentError::EmptyResponse)
    }
}

/// Reads the `input` argument of a tool call; anything else is passed as-is
fn tool_input(arguments: &str) -> ToolInput {
    match serde_json::from_str::<Value>(arguments) {
        Ok(Value::Object(mut map)) => match map.remove("input") {
            Some(Value::String(text)) => ToolInput::Text(text),
            Some(other) => ToolInput::Structured(other),
            None => ToolInput::Structured(Value::Object(map)),
        },
        Ok(Value::String(text)) => ToolInput::Text(text),
        Ok(other) => ToolInput::Structured(other),
        Err(_) => ToolInput::Text(arguments.to_string()),
    }
}

/// Removes the `AI: ` prefix the model sometimes copies from the prompt format
fn strip_ai_prefix(answer: &str) -> &str {
    let trimmed = answer.trim();
    trimmed.strip_prefix("AI:").map_or(trimmed, str::trim_start)
}

async fn run_tool_calls(
    registry: &ToolRegistry,
    calls: Vec<LenientToolCall>,
    messages: &mut Vec<Value>,
) -> Result<(), ToolError> {
    for call in calls {
        info!(tool = %call.function.name, "Agent requested tool");
        let output = registry
            .execute(&call.function.name, tool_input(&call.function.arguments))
            .await?;
        debug!(tool = %call.function.name, output = %output, "Tool finished");
        messages.push(json!({
            "role": "tool",
            "tool_call_id": call.id,
            "content": output,
        }));
    }
    Ok(())
}

#[async_trait]
impl ConversationAgent for OpenAiAgent {
    async fn run(&self, chat_id: &str, input: &str) -> Result<String, AgentError> {
        let registry = self.toolbox.registry_for(chat_id);
        let tools = registry.function_definitions();
        let history = self.history.load_history(chat_id, HISTORY_LIMIT).await?;

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(json!({
            "role": "system",
            "content": build_system_prompt(self.personality, &registry),
        }));
        messages.extend(
            history
                .iter()
                .map(|turn| json!({"role": turn.role, "content": turn.content})),
        );
        messages.push(json!({"role": "user", "content": input}));

        for iteration in 1..=AGENT_MAX_ITERATIONS {
            let message = self.complete(&messages, &tools).await?;
            let calls = message.tool_calls.unwrap_or_default();

            if calls.is_empty() {
                let answer = strip_ai_prefix(message.content.as_deref().unwrap_or_default()).to_string();
                info!(chat_id, iteration, chars = answer.chars().count(), "Agent answered");
                self.history
                    .append_history(
                        chat_id,
                        vec![ChatTurn::user(input), ChatTurn::assistant(answer.clone())],
                    )
                    .await?;
                return Ok(answer);
            }

            let requested: Vec<Value> = calls
                .iter()
                .map(|tc| {
                    json!({
                        "id": tc.id,
                        "type": "function",
                        "function": {"name": tc.function.name, "arguments": tc.function.arguments},
                    })
                })
                .collect();
            messages.push(json!({
                "role": "assistant",
                "content": message.content,
                "tool_calls": requested,
            }));
            run_tool_calls(&registry, calls, &mut messages).await?;
        }

        warn!(chat_id, "Agent hit the iteration limit");
        Err(AgentError::IterationLimit(AGENT_MAX_ITERATIONS))
    }

    async fn reset(&self, chat_id: &str) -> Result<(), AgentError> {
        info!(chat_id, "Resetting conversation");
        self.history.clear_history(chat_id).await?;
        Ok(())
    }
}
