use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Optional settings read from `config.toml`; environment variables win.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct FileConfig {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_output_tokens: Option<u32>,
    pub top_p: Option<f64>,
    pub frequency_penalty: Option<f64>,
    pub presence_penalty: Option<f64>,
    pub api_style: Option<String>,
    pub api_version: Option<String>,
    pub mcp_url: Option<String>,
    #[serde(default)]
    pub mcp_headers: BTreeMap<String, String>,
    pub system_prompt: Option<String>,
    pub max_tool_rounds: Option<usize>,
}

/// Sampling parameters sent with every completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub model: String,
    pub temperature: f64,
    pub top_p: f64,
    pub max_output_tokens: u32,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiStyle {
    /// `POST {endpoint}/chat/completions` with a bearer token.
    OpenAi,
    /// Deployment-scoped URL with an `api-key` header and `api-version` query.
    Azure,
}

impl ApiStyle {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(ApiStyle::OpenAi),
            "azure" | "azure-openai" | "azure_openai" => Some(ApiStyle::Azure),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub api_key: String,
    pub endpoint: String,
    pub style: ApiStyle,
    pub api_version: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolServerConfig {
    pub url: String,
    pub headers: BTreeMap<String, String>,
}

/// Fully resolved settings, fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub tool_server: ToolServerConfig,
    pub system_prompt: String,
    pub max_tool_rounds: usize,
}

pub fn path_display(path: &Path) -> String {
    path.display().to_string()
}
