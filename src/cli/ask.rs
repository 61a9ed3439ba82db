//! One-shot "ask" command

use std::io;

use tracing::info;

use crate::api::completions::HttpCompletionClient;
use crate::cli::close_tool_server;
use crate::cli::repl::run_turn;
use crate::core::config::AppConfig;
use crate::core::error::ChatError;
use crate::core::session::ConversationSession;
use crate::core::tool_registry::build_tool_registry;
use crate::mcp::McpSession;

pub async fn run_ask(config: &AppConfig, prompt: Vec<String>) -> Result<(), ChatError> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        return Err(ChatError::Configuration(
            "Usage: toolchat ask <prompt>".to_string(),
        ));
    }

    let backend = HttpCompletionClient::new(config.api.clone())?;
    let mut tool_server = McpSession::connect(&config.tool_server).await?;

    let result = ask_with_tool_server(config, &backend, &mut tool_server, &prompt).await;
    close_tool_server(&mut tool_server).await;
    result
}

async fn ask_with_tool_server(
    config: &AppConfig,
    backend: &HttpCompletionClient,
    tool_server: &mut McpSession,
    prompt: &str,
) -> Result<(), ChatError> {
    let tools = tool_server.list_tools().await?;
    let mut session = ConversationSession::new(
        config.session.clone(),
        build_tool_registry(&tools),
        &config.system_prompt,
        config.max_tool_rounds,
    );
    session.push_user_message(prompt);

    let outcome = run_turn(&mut session, backend, tool_server, &mut io::stdout()).await?;
    info!(
        completions = outcome.completions,
        tool_calls = outcome.tool_calls,
        "Answered prompt"
    );
    Ok(())
}
