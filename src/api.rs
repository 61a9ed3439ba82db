//! Wire payloads for the chat-completions endpoint.
//!
//! Shapes follow the OpenAI function-calling format, which Azure OpenAI
//! accepts unchanged.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod completions;

pub const TOOL_KIND_FUNCTION: &str = "function";

/// A role-tagged history entry.
///
/// Each variant carries exactly the fields its role needs, so a message can
/// never be half user and half tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ChatToolCall>,
    },
    Tool {
        tool_call_id: String,
        name: String,
        content: Value,
    },
}

impl ChatMessage {
    pub fn role(&self) -> &'static str {
        match self {
            ChatMessage::System { .. } => "system",
            ChatMessage::User { .. } => "user",
            ChatMessage::Assistant { .. } => "assistant",
            ChatMessage::Tool { .. } => "tool",
        }
    }

    /// Text content for system, user, and plain assistant messages.
    pub fn text(&self) -> Option<&str> {
        match self {
            ChatMessage::System { content } | ChatMessage::User { content } => Some(content),
            ChatMessage::Assistant { content, .. } => content.as_deref(),
            ChatMessage::Tool { content, .. } => content.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatToolCall {
    pub id: String,
    #[serde(rename = "type", default = "default_tool_kind")]
    pub kind: String,
    pub function: ChatToolCallFunction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatToolCallFunction {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

fn default_tool_kind() -> String {
    TOOL_KIND_FUNCTION.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatToolDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: ChatToolFunction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatToolFunction {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub temperature: f64,
    pub top_p: f64,
    pub max_completion_tokens: u32,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ChatToolDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,
}

/// Why the endpoint stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Other(String),
}

impl From<String> for FinishReason {
    fn from(value: String) -> Self {
        match value.as_str() {
            "stop" => FinishReason::Stop,
            "tool_calls" => FinishReason::ToolCalls,
            _ => FinishReason::Other(value),
        }
    }
}

impl FinishReason {
    pub fn as_str(&self) -> &str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::ToolCalls => "tool_calls",
            FinishReason::Other(reason) => reason,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChatCompletionChoice>,
    #[serde(default)]
    pub usage: Option<CompletionUsage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub message: ChatCompletionMessage,
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletionMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ChatToolCall>>,
}

impl ChatCompletionMessage {
    pub fn requested_tool_calls(&self) -> &[ChatToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_call_assistant_message_omits_content() {
        let message = ChatMessage::Assistant {
            content: None,
            tool_calls: vec![ChatToolCall {
                id: "call_1".to_string(),
                kind: TOOL_KIND_FUNCTION.to_string(),
                function: ChatToolCallFunction {
                    name: "get_weather".to_string(),
                    arguments: "{\"city\":\"Paris\"}".to_string(),
                },
            }],
        };

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            json!({
                "role": "assistant",
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "get_weather", "arguments": "{\"city\":\"Paris\"}"}
                }]
            })
        );
    }

    #[test]
    fn tool_message_carries_call_id_and_name() {
        let message = ChatMessage::Tool {
            tool_call_id: "call_1".to_string(),
            name: "get_weather".to_string(),
            content: json!("{\"tempC\":18}"),
        };

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["role"], "tool");
        assert_eq!(value["tool_call_id"], "call_1");
        assert_eq!(value["name"], "get_weather");
        assert_eq!(value["content"], "{\"tempC\":18}");
    }

    #[test]
    fn finish_reason_keeps_unknown_values() {
        let choice: ChatCompletionChoice = serde_json::from_value(json!({
            "index": 0,
            "message": {"content": "partial"},
            "finish_reason": "length"
        }))
        .unwrap();
        assert_eq!(
            choice.finish_reason,
            Some(FinishReason::Other("length".to_string()))
        );
    }

    #[test]
    fn response_tolerates_null_fields() {
        let response: ChatCompletionResponse = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": null, "tool_calls": null},
                "finish_reason": "stop"
            }]
        }))
        .unwrap();

        let choice = &response.choices[0];
        assert_eq!(choice.finish_reason, Some(FinishReason::Stop));
        assert!(choice.message.content.is_none());
        assert!(choice.message.requested_tool_calls().is_empty());
    }

    #[test]
    fn request_skips_empty_tools() {
        let request = ChatCompletionRequest {
            model: "gpt-4.1".to_string(),
            temperature: 0.7,
            top_p: 0.95,
            max_completion_tokens: 1600,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            messages: vec![ChatMessage::User {
                content: "hi".to_string(),
            }],
            tools: Vec::new(),
            parallel_tool_calls: None,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("tools").is_none());
        assert!(value.get("parallel_tool_calls").is_none());
        assert_eq!(value["max_completion_tokens"], 1600);
    }
}
