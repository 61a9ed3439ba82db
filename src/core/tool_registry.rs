use crate::api::{ChatToolDefinition, ChatToolFunction, TOOL_KIND_FUNCTION};
use serde::Deserialize;
use serde_json::{json, Value};

/// A tool as advertised by the tool server's `tools/list` response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub input_schema: Option<Value>,
}

/// Schema sent for tools that declare no input schema.
pub fn empty_object_schema() -> Value {
    json!({
        "type": "object",
        "properties": {},
        "required": []
    })
}

/// Translates remote tools into function definitions, preserving order and
/// passing duplicate names through untouched.
pub fn build_tool_registry(remote_tools: &[ToolDescriptor]) -> Vec<ChatToolDefinition> {
    remote_tools
        .iter()
        .map(|tool| ChatToolDefinition {
            kind: TOOL_KIND_FUNCTION.to_string(),
            function: ChatToolFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool
                    .input_schema
                    .clone()
                    .unwrap_or_else(empty_object_schema),
            },
        })
        .collect()
}
