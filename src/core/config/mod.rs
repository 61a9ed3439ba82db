//! Startup configuration.
//!
//! Values come from an optional `config.toml`, then the process environment,
//! then command-line overrides. Resolution happens once; the result is never
//! mutated afterwards.

pub mod data;
pub mod defaults;
pub mod io;


pub use data::{ApiConfig, ApiStyle, AppConfig, FileConfig, SessionConfig, ToolServerConfig};

use crate::core::error::ChatError;
use crate::utils::url::host_of;
use defaults::*;
use std::ops::RangeInclusive;
use std::str::FromStr;

impl AppConfig {
    /// Loads the config file and resolves it against the real environment.
    pub fn load(
        config_path: Option<&std::path::Path>,
        model_override: Option<String>,
    ) -> Result<AppConfig, ChatError> {
        let file = FileConfig::load(config_path)?;
        Self::resolve(file, |key| std::env::var(key).ok(), model_override)
    }

    /// Merges file settings with `env` lookups. Empty values count as unset.
    pub fn resolve(
        mut file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
        model_override: Option<String>,
    ) -> Result<AppConfig, ChatError> {
        let lookup = |key: &str| non_blank(env(key));
        for value in [
            &mut file.api_key,
            &mut file.endpoint,
            &mut file.model,
            &mut file.api_style,
            &mut file.api_version,
            &mut file.mcp_url,
            &mut file.system_prompt,
        ] {
            *value = non_blank(value.take());
        }

        let api_key = required(lookup(ENV_API_KEY).or(file.api_key), ENV_API_KEY)?;
        let endpoint = required(lookup(ENV_ENDPOINT).or(file.endpoint), ENV_ENDPOINT)?;
        let mcp_url = required(lookup(ENV_MCP_URL).or(file.mcp_url), ENV_MCP_URL)?;

        let style = match lookup(ENV_API_STYLE).or(file.api_style) {
            Some(value) => ApiStyle::parse(&value).ok_or_else(|| {
                ChatError::Configuration(format!(
                    "{ENV_API_STYLE} must be 'azure' or 'openai', got '{value}'"
                ))
            })?,
            None => infer_api_style(&endpoint),
        };
        let api_version = lookup(ENV_API_VERSION)
            .or(file.api_version)
            .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string());

        let model = model_override
            .filter(|model| !model.trim().is_empty())
            .or_else(|| lookup(ENV_MODEL))
            .or(file.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let temperature = numeric(
            lookup(ENV_TEMPERATURE),
            file.temperature,
            DEFAULT_TEMPERATURE,
            ENV_TEMPERATURE,
        )?;
        check_range(temperature, 0.0..=2.0, ENV_TEMPERATURE)?;
        let top_p = numeric(lookup(ENV_TOP_P), file.top_p, DEFAULT_TOP_P, ENV_TOP_P)?;
        check_range(top_p, 0.0..=1.0, ENV_TOP_P)?;
        let frequency_penalty = numeric(
            lookup(ENV_FREQUENCY_PENALTY),
            file.frequency_penalty,
            DEFAULT_FREQUENCY_PENALTY,
            ENV_FREQUENCY_PENALTY,
        )?;
        check_range(frequency_penalty, -2.0..=2.0, ENV_FREQUENCY_PENALTY)?;
        let presence_penalty = numeric(
            lookup(ENV_PRESENCE_PENALTY),
            file.presence_penalty,
            DEFAULT_PRESENCE_PENALTY,
            ENV_PRESENCE_PENALTY,
        )?;
        check_range(presence_penalty, -2.0..=2.0, ENV_PRESENCE_PENALTY)?;

        let max_output_tokens = numeric(
            lookup(ENV_MAX_OUTPUT_TOKENS),
            file.max_output_tokens,
            DEFAULT_MAX_OUTPUT_TOKENS,
            ENV_MAX_OUTPUT_TOKENS,
        )?;
        if max_output_tokens == 0 {
            return Err(ChatError::Configuration(format!(
                "{ENV_MAX_OUTPUT_TOKENS} must be greater than zero"
            )));
        }
        let max_tool_rounds = numeric(
            lookup(ENV_MAX_TOOL_ROUNDS),
            file.max_tool_rounds,
            DEFAULT_MAX_TOOL_ROUNDS,
            ENV_MAX_TOOL_ROUNDS,
        )?;
        if max_tool_rounds == 0 {
            return Err(ChatError::Configuration(format!(
                "{ENV_MAX_TOOL_ROUNDS} must be greater than zero"
            )));
        }

        let system_prompt = lookup(ENV_SYSTEM_PROMPT)
            .or(file.system_prompt)
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

        Ok(AppConfig {
            api: ApiConfig {
                api_key,
                endpoint,
                style,
                api_version,
            },
            session: SessionConfig {
                model,
                temperature,
                top_p,
                max_output_tokens,
                frequency_penalty,
                presence_penalty,
            },
            tool_server: ToolServerConfig {
                url: mcp_url,
                headers: file.mcp_headers,
            },
            system_prompt,
            max_tool_rounds,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn required(value: Option<String>, key: &str) -> Result<String, ChatError> {
    value.ok_or_else(|| ChatError::Configuration(format!("Please set the {key} environment variable.")))
}

fn numeric<T: FromStr + Copy>(
    env_value: Option<String>,
    file_value: Option<T>,
    default: T,
    key: &str,
) -> Result<T, ChatError> {
    match env_value {
        Some(raw) => raw.trim().parse::<T>().map_err(|_| {
            ChatError::Configuration(format!("{key} must be a number, got '{raw}'"))
        }),
        None => Ok(file_value.unwrap_or(default)),
    }
}

fn check_range(value: f64, range: RangeInclusive<f64>, key: &str) -> Result<(), ChatError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ChatError::Configuration(format!(
            "{key} must be between {} and {}, got {value}",
            range.start(),
            range.end()
        )))
    }
}

fn infer_api_style(endpoint: &str) -> ApiStyle {
    let is_azure = host_of(endpoint).is_some_and(|host| host.ends_with(AZURE_HOST_SUFFIX));
    if is_azure {
        ApiStyle::Azure
    } else {
        ApiStyle::OpenAi
    }
}
