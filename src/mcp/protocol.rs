//! Decoding of tool-server responses into the shapes the chat session needs.

use rust_mcp_schema::schema_utils::ServerMessage;
use rust_mcp_schema::{InitializeResult, RpcError};
use serde::Deserialize;
use serde_json::Value;

use crate::core::tool_registry::ToolDescriptor;

/// One page of a `tools/list` response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolListPage {
    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Rendered outcome of a `tools/call` request.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallOutput {
    pub content: Value,
    pub is_error: bool,
}

pub fn parse_response_value(message: ServerMessage) -> Result<Value, String> {
    match message {
        ServerMessage::Response(response) => {
            serde_json::to_value(&response.result).map_err(|err| err.to_string())
        }
        ServerMessage::Error(error) => Err(format_rpc_error(&error.error)),
        other => Err(format_unexpected_server_message(&other)),
    }
}

pub fn parse_initialize_result(message: ServerMessage) -> Result<InitializeResult, String> {
    let value = parse_response_value(message)?;
    let result =
        serde_json::from_value::<InitializeResult>(value).map_err(|err| err.to_string())?;
    if result.protocol_version.trim().is_empty() {
        return Err("Unexpected initialize response.".to_string());
    }
    Ok(result)
}

pub fn parse_tool_list_page(message: ServerMessage) -> Result<ToolListPage, String> {
    let value = parse_response_value(message)?;
    serde_json::from_value::<ToolListPage>(value).map_err(|err| err.to_string())
}

/// Flattens a `tools/call` result into the value recorded in history.
///
/// Results made only of text blocks become their text joined by newlines;
/// anything else keeps the raw content list.
pub fn parse_tool_call_output(message: ServerMessage) -> Result<ToolCallOutput, String> {
    let value = parse_response_value(message)?;
    let is_error = value
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let blocks = value
        .get("content")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let joined_text = blocks
        .iter()
        .map(|block| match block.get("type").and_then(Value::as_str) {
            Some("text") => block.get("text").and_then(Value::as_str),
            _ => None,
        })
        .collect::<Option<Vec<&str>>>()
        .filter(|texts| !texts.is_empty())
        .map(|texts| texts.join("\n"));

    let content = match joined_text {
        Some(text) => Value::String(text),
        None => match value.get("structuredContent") {
            Some(structured) if blocks.is_empty() => structured.clone(),
            _ => Value::Array(blocks),
        },
    };

    Ok(ToolCallOutput { content, is_error })
}

pub fn format_unexpected_server_message(message: &ServerMessage) -> String {
    format!("Unexpected MCP server message: {message:?}")
}

pub fn format_rpc_error(error: &RpcError) -> String {
    let mut output = format!("MCP error {}: {}", error.code, error.message);
    if let Some(data) = &error.data {
        let details = data
            .get("details")
            .and_then(|value| value.as_str())
            .map(|value| value.to_string())
            .or_else(|| data.as_str().map(|value| value.to_string()))
            .or_else(|| serde_json::to_string_pretty(data).ok());

        if let Some(details) = details {
            if !details.is_empty() {
                output.push('\n');
                output.push_str(&details);
            }
        }
    }
    output
}
