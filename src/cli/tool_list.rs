use crate::cli::close_tool_server;
use crate::core::config::AppConfig;
use crate::core::error::ChatError;
use crate::core::tool_registry::ToolDescriptor;
use crate::mcp::McpSession;

pub async fn list_tools(config: &AppConfig) -> Result<(), ChatError> {
    let mut tool_server = McpSession::connect(&config.tool_server).await?;
    let result = tool_server.list_tools().await;
    let server_name = tool_server.server_name().unwrap_or("MCP server").to_string();
    close_tool_server(&mut tool_server).await;

    print!("{}", format_tool_list(&server_name, &result?));
    Ok(())
}

fn format_tool_list(server_name: &str, tools: &[ToolDescriptor]) -> String {
    if tools.is_empty() {
        return format!("{server_name} offers no tools.\n");
    }

    let width = tools.iter().map(|tool| tool.name.len()).max().unwrap_or(0);
    let mut output = format!("Tools offered by {server_name}:\n\n");
    for tool in tools {
        match tool.description.as_deref().map(str::trim) {
            Some(description) if !description.is_empty() => {
                let first_line = description.lines().next().unwrap_or_default();
                output.push_str(&format!("  {:<width$}  {first_line}\n", tool.name));
            }
            _ => output.push_str(&format!("  {}\n", tool.name)),
        }
    }
    output
}
