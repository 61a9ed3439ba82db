use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::api::{ChatCompletionRequest, ChatCompletionResponse};
use crate::core::config::{ApiConfig, ApiStyle};
use crate::core::error::ChatError;
use crate::utils::url::construct_api_url;

const COMPLETION_CONNECT_TIMEOUT_SECONDS: u64 = 10;
const COMPLETION_REQUEST_TIMEOUT_SECONDS: u64 = 120;

/// Anything that can turn a history into the next assistant turn.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ChatError>;
}

/// Non-streaming chat-completions client for OpenAI and Azure OpenAI.
pub struct HttpCompletionClient {
    client: reqwest::Client,
    config: ApiConfig,
}

impl HttpCompletionClient {
    pub fn new(config: ApiConfig) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(COMPLETION_CONNECT_TIMEOUT_SECONDS))
            .timeout(Duration::from_secs(COMPLETION_REQUEST_TIMEOUT_SECONDS))
            .build()
            .map_err(|err| ChatError::Configuration(err.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn completions_url(&self, model: &str) -> String {
        completions_url(&self.config, model)
    }
}

pub fn completions_url(config: &ApiConfig, model: &str) -> String {
    match config.style {
        ApiStyle::OpenAi => construct_api_url(&config.endpoint, "chat/completions"),
        ApiStyle::Azure => format!(
            "{}?api-version={}",
            construct_api_url(
                &config.endpoint,
                &format!("openai/deployments/{model}/chat/completions")
            ),
            config.api_version
        ),
    }
}

fn add_auth_headers(
    request: reqwest::RequestBuilder,
    config: &ApiConfig,
) -> reqwest::RequestBuilder {
    match config.style {
        ApiStyle::OpenAi => request.header("Authorization", format!("Bearer {}", config.api_key)),
        ApiStyle::Azure => request.header("api-key", &config.api_key),
    }
}

#[async_trait]
impl CompletionBackend for HttpCompletionClient {
    async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ChatError> {
        let url = self.completions_url(&request.model);
        debug!(
            url = %url,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending completion request"
        );

        let http_request = add_auth_headers(
            self.client
                .post(&url)
                .header("Content-Type", "application/json"),
            &self.config,
        );
        let response = http_request
            .json(request)
            .send()
            .await
            .map_err(|err| ChatError::Completion(format!("Completion request failed: {err}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| ChatError::Completion(format!("Failed to read completion body: {err}")))?;
        if !status.is_success() {
            return Err(ChatError::Completion(format!(
                "HTTP {status}: {}",
                format_api_error(&body)
            )));
        }

        let parsed = serde_json::from_str::<ChatCompletionResponse>(&body).map_err(|err| {
            ChatError::Completion(format!("Unexpected completion response ({err}): {}", format_api_error(&body)))
        })?;
        if let Some(usage) = &parsed.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "Completion usage"
            );
        }
        Ok(parsed)
    }
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.to_string()),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Condenses an error body into something readable on a terminal.
pub fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();

    if trimmed.is_empty() {
        return "API Error: <empty body>".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(summary) = extract_error_summary(&json_value).filter(|s| !s.is_empty()) {
            return format!("API Error: {summary}");
        }
        if let Ok(pretty_json) = serde_json::to_string_pretty(&json_value) {
            return format!("API Error:\n{pretty_json}");
        }
    }

    format!("API Error: {trimmed}")
}
