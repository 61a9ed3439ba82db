pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Answer the user's questions to the best of your ability.";
pub const DEFAULT_MODEL: &str = "gpt-4.1";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 1600;
pub const DEFAULT_TOP_P: f64 = 0.95;
pub const DEFAULT_FREQUENCY_PENALTY: f64 = 0.0;
pub const DEFAULT_PRESENCE_PENALTY: f64 = 0.0;
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 10;
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-10-21";

pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_ENDPOINT: &str = "OPENAI_ENDPOINT";
pub const ENV_MODEL: &str = "OPENAI_MODEL";
pub const ENV_TEMPERATURE: &str = "OPENAI_Temperature";
pub const ENV_MAX_OUTPUT_TOKENS: &str = "OPENAI_MaxOutputTokenCount";
pub const ENV_TOP_P: &str = "OPENAI_TopP";
pub const ENV_FREQUENCY_PENALTY: &str = "OPENAI_FrequencyPenalty";
pub const ENV_PRESENCE_PENALTY: &str = "OPENAI_PresencePenalty";
pub const ENV_API_STYLE: &str = "OPENAI_API_STYLE";
pub const ENV_API_VERSION: &str = "OPENAI_API_VERSION";
pub const ENV_MCP_URL: &str = "MCP_URL";
pub const ENV_SYSTEM_PROMPT: &str = "SYSTEM_PROMPT";
pub const ENV_MAX_TOOL_ROUNDS: &str = "MAX_TOOL_ROUNDS";

/// Hosts under this suffix speak the Azure OpenAI dialect.
pub const AZURE_HOST_SUFFIX: &str = ".openai.azure.com";
