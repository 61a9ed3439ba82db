//! Command-line interface parsing and handling
//!
//! This module parses command-line arguments, resolves configuration, and
//! runs the selected command against the completion endpoint and tool server.

pub mod ask;
pub mod repl;
pub mod tool_list;

use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::completions::HttpCompletionClient;
use crate::cli::ask::run_ask;
use crate::cli::repl::run_repl;
use crate::cli::tool_list::list_tools;
use crate::core::config::AppConfig;
use crate::core::error::ChatError;
use crate::core::session::ConversationSession;
use crate::core::tool_registry::build_tool_registry;
use crate::mcp::McpSession;

/// Environment variable holding a `tracing` filter directive.
pub const LOG_FILTER_ENV: &str = "TOOLCHAT_LOG";
const DEFAULT_LOG_FILTER: &str = "warn";
const STDIN_SHUTDOWN_GRACE_MS: u64 = 100;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VERGEN_GIT_DESCRIBE"),
    ", built ",
    env!("VERGEN_BUILD_DATE"),
    ")"
);

#[derive(Parser)]
#[command(name = "toolchat")]
#[command(version, long_version = LONG_VERSION)]
#[command(about = "A terminal chat client whose model can call tools served over MCP")]
#[command(
    long_about = "toolchat forwards your prompts to an OpenAI or Azure OpenAI chat-completions \
endpoint and lets the model call tools exposed by an MCP server over streamable HTTP.\n\n\
Environment Variables:\n\
  OPENAI_API_KEY    API key for the completion endpoint (required)\n\
  OPENAI_ENDPOINT   Base URL of the completion endpoint (required)\n\
  MCP_URL           URL of the MCP server (required)\n\
  OPENAI_MODEL      Model or Azure deployment name (default gpt-4.1)\n\
  SYSTEM_PROMPT     Default system prompt\n\
  TOOLCHAT_LOG      Log filter written to stderr (default warn)\n\n\
Chat commands:\n\
  clear             Start over with the default system prompt\n\
  show prompt       Print the current system prompt\n\
  change            Replace the system prompt (clears history)\n\
  exit, quit, q     Leave (an empty line does too)"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Model (or Azure deployment) to use, overriding configuration
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Path to a config.toml to use instead of the default location
    #[arg(short = 'c', long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the interactive chat loop (default)
    Chat,
    /// Send a single prompt and print the answer
    Ask {
        /// Prompt text (multiple words are joined with spaces)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        prompt: Vec<String>,
    },
    /// List the tools offered by the MCP server
    Tools,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing();
    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(async_main(args));
    // A prompt left by Ctrl+C still has a blocking stdin read in flight.
    runtime.shutdown_timeout(Duration::from_millis(STDIN_SHUTDOWN_GRACE_MS));
    result
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    let config = AppConfig::load(args.config.as_deref(), args.model)?;

    match args.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_chat(&config).await?,
        Commands::Ask { prompt } => run_ask(&config, prompt).await?,
        Commands::Tools => list_tools(&config).await?,
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// Interactive chat against the configured endpoint and tool server.
pub async fn run_chat(config: &AppConfig) -> Result<(), ChatError> {
    let backend = HttpCompletionClient::new(config.api.clone())?;
    let mut tool_server = McpSession::connect(&config.tool_server).await?;

    let result = chat_with_tool_server(config, &backend, &mut tool_server).await;
    close_tool_server(&mut tool_server).await;
    result
}

async fn chat_with_tool_server(
    config: &AppConfig,
    backend: &HttpCompletionClient,
    tool_server: &mut McpSession,
) -> Result<(), ChatError> {
    let tools = tool_server.list_tools().await?;
    let names: Vec<_> = tools.iter().map(|tool| tool.name.as_str()).collect();
    println!(
        "Connected to {} with tools: {}",
        tool_server.server_name().unwrap_or("MCP server"),
        if names.is_empty() {
            "(none)".to_string()
        } else {
            names.join(", ")
        }
    );

    let mut session = ConversationSession::new(
        config.session.clone(),
        build_tool_registry(&tools),
        &config.system_prompt,
        config.max_tool_rounds,
    );
    let mut input = BufReader::new(tokio::io::stdin());
    let mut out = io::stdout();
    run_repl(
        &mut session,
        &config.system_prompt,
        backend,
        tool_server,
        &mut input,
        &mut out,
    )
    .await
}

/// Releases the tool-server session; failures are only logged.
pub(crate) async fn close_tool_server(tool_server: &mut McpSession) {
    match tool_server.close().await {
        Ok(()) => info!("Tool server session closed"),
        Err(err) => warn!(error = %err, "Failed to close tool server session"),
    }
}
