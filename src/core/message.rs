//! Constructors for the role-tagged messages that make up a conversation.

use crate::api::{ChatCompletionResponse, ChatMessage, FinishReason};
use crate::core::error::ChatError;
use serde_json::Value;

pub fn build_system_message(text: impl Into<String>) -> ChatMessage {
    ChatMessage::System {
        content: text.into(),
    }
}

pub fn build_user_message(text: impl Into<String>) -> ChatMessage {
    ChatMessage::User {
        content: text.into(),
    }
}

pub fn build_tool_message(
    call_id: impl Into<String>,
    tool_name: impl Into<String>,
    content: Value,
) -> ChatMessage {
    ChatMessage::Tool {
        tool_call_id: call_id.into(),
        name: tool_name.into(),
        content,
    }
}

/// Records the first choice of a completion response as an assistant message.
///
/// A `tool_calls` finish keeps only the first requested call; every other
/// finish reason keeps the text content (empty when absent) so the turn can
/// still be inspected after the caller rejects an unknown reason.
pub fn build_assistant_message(
    response: &ChatCompletionResponse,
) -> Result<ChatMessage, ChatError> {
    let choice = response
        .choices
        .first()
        .ok_or_else(|| ChatError::Completion("Completion response contained no choices".into()))?;

    let first_call = choice.message.requested_tool_calls().first();
    match (&choice.finish_reason, first_call) {
        (Some(FinishReason::ToolCalls), Some(call)) => Ok(ChatMessage::Assistant {
            content: None,
            tool_calls: vec![call.clone()],
        }),
        _ => Ok(ChatMessage::Assistant {
            content: Some(choice.message.content.clone().unwrap_or_default()),
            tool_calls: Vec::new(),
        }),
    }
}
