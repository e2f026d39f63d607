//! Reminder tool
//!
//! Parses `{"after": ..., "reminder": ...}` and schedules a `send_message`
//! invocation back to the chat the request came from.

use super::duration::parse_duration;
use crate::agent::provider::{Tool, ToolError, ToolInput};
use crate::scheduler::{DeferredInvoker, SchedulerError, SendMessageArgs, SEND_MESSAGE};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Tool name
pub const NAME: &str = "REMIND";

/// Returned when the request is accepted
pub const SCHEDULED: &str = "Your reminder has been scheduled.";
/// Returned when the request cannot be handled; nothing is scheduled
pub const FAILURE: &str = "Tool failure. Could not handle request. Sorry.";

const DESCRIPTION: &str = r#"Used to schedule reminders for the user at a future point in time. Input: time delta and the reminder. Please use the following JSON format as Input:
{"after": "time delta", "reminder": "reminder message to send to the user"}.

Example(s):
{"after": "15s", "reminder": "turn off the lights"}
{"after": "60m", "reminder": "file your taxes"}
{"after": "2h5m", "reminder": "send a message to your wife about dinner"}"#;

/// A reminder as requested by the agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderRequest {
    /// Time delta, e.g. `2h5m`
    pub after: String,
    /// Message to send when due
    pub reminder: String,
}

impl ReminderRequest {
    /// Reads a request from tool input. Strings are parsed as JSON as-is
    /// first, then with single quotes normalized to double quotes. Only JSON
    /// objects are requests.
    #[must_use]
    pub fn from_input(input: &ToolInput) -> Option<Self> {
        match input {
            ToolInput::Structured(Value::String(raw)) | ToolInput::Text(raw) => Self::from_raw(raw),
            ToolInput::Structured(value) => Self::from_value(value),
        }
    }

    fn from_raw(raw: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(raw)
            .or_else(|_| serde_json::from_str(&raw.replace('\'', "\"")))
            .ok()?;
        Self::from_value(&value)
    }

    fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }
}

/// Schedules a reminder message for one chat
pub struct RemindMeTool {
    invoker: Arc<dyn DeferredInvoker>,
    chat_id: String,
}

impl RemindMeTool {
    /// Create a reminder tool bound to `chat_id`
    #[must_use]
    pub fn new(invoker: Arc<dyn DeferredInvoker>, chat_id: impl Into<String>) -> Self {
        Self {
            invoker,
            chat_id: chat_id.into(),
        }
    }
}

#[async_trait]
impl Tool for RemindMeTool {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> String {
        DESCRIPTION.to_string()
    }

    async fn run(&self, input: ToolInput) -> Result<String, ToolError> {
        info!(prompt = %input.as_prompt(), "[remind-me] prompt");

        let Some(request) = ReminderRequest::from_input(&input) else {
            warn!("[remind-me] malformed request");
            return Ok(FAILURE.to_string());
        };
        let Some(after_seconds) = parse_duration(&request.after) else {
            warn!(after = %request.after, "[remind-me] unparseable delay");
            return Ok(FAILURE.to_string());
        };

        let delay_ms = after_seconds.saturating_mul(1_000);
        let arguments = serde_json::to_value(SendMessageArgs {
            message: request.reminder.clone(),
            chat_id: self.chat_id.clone(),
        })
        .map_err(|e| ToolError::Backend {
            tool: NAME,
            message: e.to_string(),
        })?;

        match self.invoker.invoke_later(SEND_MESSAGE, delay_ms, arguments).await {
            Ok(()) => {}
            Err(SchedulerError::DelayOutOfRange(_)) => {
                warn!(after = %request.after, "[remind-me] delay out of range");
                return Ok(FAILURE.to_string());
            }
            Err(e) => {
                return Err(ToolError::Backend {
                    tool: NAME,
                    message: e.to_string(),
                })
            }
        }

        info!(delay_ms, message = %request.reminder, chat_id = %self.chat_id, "Scheduled reminder");
        Ok(SCHEDULED.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::MockDeferredInvoker;
    use serde_json::json;

    fn expect_schedule(delay: u64, message: &'static str) -> MockDeferredInvoker {
        let mut invoker = MockDeferredInvoker::new();
        invoker
            .expect_invoke_later()
            .withf(move |name, delay_ms, args| {
                name == SEND_MESSAGE
                    && *delay_ms == delay
                    && *args == json!({"message": message, "chat_id": "42"})
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        invoker
    }

    #[tokio::test]
    async fn test_json_string_is_scheduled() {
        let tool = RemindMeTool::new(Arc::new(expect_schedule(15_000, "turn off the lights")), "42");
        let out = tool
            .run(r#"{"after": "15s", "reminder": "turn off the lights"}"#.into())
            .await
            .expect("tool ran");
        assert_eq!(out, SCHEDULED);
    }

    #[tokio::test]
    async fn test_mapping_is_scheduled() {
        let tool = RemindMeTool::new(Arc::new(expect_schedule(7_500_000, "dinner")), "42");
        let out = tool
            .run(ToolInput::Structured(json!({"after": "2h5m", "reminder": "dinner"})))
            .await
            .expect("tool ran");
        assert_eq!(out, SCHEDULED);
    }

    #[tokio::test]
    async fn test_single_quotes_are_normalized() {
        let tool = RemindMeTool::new(Arc::new(expect_schedule(3_600_000, "file your taxes")), "42");
        let out = tool
            .run("{'after': '60m', 'reminder': 'file your taxes'}".into())
            .await
            .expect("tool ran");
        assert_eq!(out, SCHEDULED);
    }

    #[tokio::test]
    async fn test_apostrophes_survive_valid_json() {
        let tool = RemindMeTool::new(Arc::new(expect_schedule(60_000, "call mom, it's her birthday")), "42");
        let out = tool
            .run(r#"{"after": "1m", "reminder": "call mom, it's her birthday"}"#.into())
            .await
            .expect("tool ran");
        assert_eq!(out, SCHEDULED);
    }

    #[tokio::test]
    async fn test_malformed_requests_schedule_nothing() {
        let mut invoker = MockDeferredInvoker::new();
        invoker.expect_invoke_later().never();
        let tool = RemindMeTool::new(Arc::new(invoker), "42");

        for input in [
            ToolInput::from("remind me later"),
            ToolInput::from(r#"{"after": "15s"}"#),
            ToolInput::from(r#"{"after": "whenever", "reminder": "x"}"#),
            ToolInput::Structured(json!(["15s", "x"])),
            ToolInput::from(r#"["15s", "x"]"#),
            ToolInput::from("['15s', 'x']"),
        ] {
            assert_eq!(tool.run(input).await.ok().as_deref(), Some(FAILURE));
        }
    }

    #[test]
    fn test_only_objects_are_requests() {
        assert_eq!(ReminderRequest::from_input(&ToolInput::Structured(json!(["15s", "x"]))), None);
        assert_eq!(ReminderRequest::from_input(&ToolInput::Structured(json!(15))), None);
        assert_eq!(
            ReminderRequest::from_input(&ToolInput::Structured(json!({"after": "15s", "reminder": "x"}))),
            Some(ReminderRequest {
                after: "15s".to_string(),
                reminder: "x".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_delay_past_calendar_is_a_soft_failure() {
        let mut invoker = MockDeferredInvoker::new();
        invoker
            .expect_invoke_later()
            .times(1)
            .returning(|_, delay_ms, _| Err(SchedulerError::DelayOutOfRange(delay_ms)));
        let tool = RemindMeTool::new(Arc::new(invoker), "42");

        let out = tool
            .run(ToolInput::Structured(json!({"after": "20000000 weeks", "reminder": "x"})))
            .await
            .expect("soft failure");
        assert_eq!(out, FAILURE);
    }

    #[tokio::test]
    async fn test_delay_past_calendar_with_real_scheduler() {
        use crate::scheduler::TokioScheduler;
        use tokio_util::sync::CancellationToken;

        let (scheduler, mut due) = TokioScheduler::new(CancellationToken::new());
        let tool = RemindMeTool::new(Arc::new(scheduler), "42");

        let out = tool
            .run(r#"{"after": "20000000 weeks", "reminder": "x"}"#.into())
            .await
            .expect("soft failure");
        assert_eq!(out, FAILURE);
        assert!(due.try_recv().is_err());
    }
}
