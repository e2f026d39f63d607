//! System prompt construction

use super::registry::ToolRegistry;
use crate::personality::Personality;

const FINAL_ANSWER_INSTRUCTIONS: &str = "When you have a final response for the Human, answer in plain text.
Your final response MUST ALWAYS include the UUID of any image or audio you generated.

Make sure to use all tool results to come up with your final response.
ALWAYS copy the UUID of images into your final response!
ALWAYS come up with a final response after generating an image and make sure to include the UUID of that image.";

fn build_date_context() -> String {
    let now = chrono::Local::now();
    format!(
        "Current date and time: {}, {}",
        now.format("%Y-%m-%d %H:%M"),
        now.format("%A")
    )
}

/// Builds the system prompt: persona, tool list, final-answer rules
#[must_use]
pub fn build_system_prompt(personality: Personality, tools: &ToolRegistry) -> String {
    let tool_list = if tools.is_empty() {
        "(none)".to_string()
    } else {
        tools.describe()
    };

    format!(
        "{persona}\n\n{date}\n\nTOOLS:\n------\n\nYou have access to the following tools:\n\n{tool_list}\n\n{FINAL_ANSWER_INSTRUCTIONS}",
        persona = personality.prompt(),
        date = build_date_context(),
    )
}
