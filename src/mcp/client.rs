//! Client for the single tool server a chat session talks to.
//!
//! The session is opened once at startup with [`McpSession::connect`] and must
//! be released with [`McpSession::close`] on every exit path.

use std::collections::BTreeMap;

use async_trait::async_trait;
use rust_mcp_schema::schema_utils::{
    ClientMessage, FromMessage, MessageFromClient, NotificationFromClient, RequestFromClient,
    ServerMessage,
};
use rust_mcp_schema::{
    CallToolRequestParams, ClientCapabilities, Implementation, InitializeRequestParams,
    PaginatedRequestParams, RequestId, LATEST_PROTOCOL_VERSION,
};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::core::config::ToolServerConfig;
use crate::core::error::ChatError;
use crate::core::session::{ToolInvocationResult, ToolInvoker};
use crate::core::tool_registry::ToolDescriptor;
use crate::mcp::protocol::{self, ToolCallOutput};
use crate::mcp::transport::streamable_http::{
    is_event_stream_content_type, next_sse_server_message,
};
use crate::mcp::transport::{
    apply_post_headers, apply_protocol_version_header, apply_session_headers,
    build_mcp_http_client, response_content_type, response_session_id,
};

pub const MCP_MAX_TOOL_LIST: usize = 100;

pub struct McpSession {
    url: String,
    headers: BTreeMap<String, String>,
    client: reqwest::Client,
    session_id: Option<String>,
    negotiated_protocol_version: Option<String>,
    server_name: Option<String>,
    next_request_id: i64,
}

impl McpSession {
    /// Performs the `initialize` handshake and announces readiness.
    pub async fn connect(config: &ToolServerConfig) -> Result<Self, ChatError> {
        let client = build_mcp_http_client().map_err(ChatError::Connection)?;
        let mut session = Self {
            url: config.url.clone(),
            headers: config.headers.clone(),
            client,
            session_id: None,
            negotiated_protocol_version: None,
            server_name: None,
            next_request_id: 0,
        };

        if let Err(err) = session.initialize().await {
            // The server may already have assigned a session id.
            if let Err(close_err) = session.close().await {
                debug!(error = %close_err, "Failed to close half-open MCP session");
            }
            return Err(ChatError::Connection(format!(
                "Failed to connect to MCP server at {}: {err}",
                config.url
            )));
        }
        Ok(session)
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    pub fn protocol_version(&self) -> String {
        match self.negotiated_protocol_version.as_deref() {
            Some(version) if !version.trim().is_empty() => version.to_string(),
            _ => LATEST_PROTOCOL_VERSION.to_string(),
        }
    }

    async fn initialize(&mut self) -> Result<(), String> {
        let response = self
            .send_request(RequestFromClient::InitializeRequest(client_details()))
            .await?;
        let initialize = protocol::parse_initialize_result(response)?;
        info!(
            server = %initialize.server_info.name,
            protocol_version = %initialize.protocol_version,
            session_id = ?self.session_id,
            "Connected to MCP server"
        );
        self.server_name = Some(initialize.server_info.name);
        self.negotiated_protocol_version = Some(initialize.protocol_version);

        self.send_notification(NotificationFromClient::InitializedNotification(None))
            .await
    }

    /// Lists the server's tools, following pagination up to [`MCP_MAX_TOOL_LIST`].
    pub async fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>, ChatError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = cursor.take().map(|cursor| PaginatedRequestParams {
                cursor: Some(cursor),
                meta: None,
            });
            let page = self
                .send_request(RequestFromClient::ListToolsRequest(params))
                .await
                .and_then(protocol::parse_tool_list_page)
                .map_err(|err| ChatError::Connection(format!("Failed to list MCP tools: {err}")))?;
            tools.extend(page.tools);

            if tools.len() >= MCP_MAX_TOOL_LIST {
                if tools.len() > MCP_MAX_TOOL_LIST || page.next_cursor.is_some() {
                    warn!(limit = MCP_MAX_TOOL_LIST, "MCP tool list truncated");
                }
                tools.truncate(MCP_MAX_TOOL_LIST);
                break;
            }
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        debug!(count = tools.len(), "Listed MCP tools");
        Ok(tools)
    }

    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolCallOutput, ChatError> {
        let params = CallToolRequestParams::new(name).with_arguments(arguments);
        let output = self
            .send_request(RequestFromClient::CallToolRequest(params))
            .await
            .and_then(protocol::parse_tool_call_output)
            .map_err(|message| remote_failure(name, message))?;

        if output.is_error {
            let message = match &output.content {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            return Err(remote_failure(name, message));
        }
        Ok(output)
    }

    /// Ends the server-side session. Safe to call more than once.
    pub async fn close(&mut self) -> Result<(), ChatError> {
        let Some(session_id) = self.session_id.take() else {
            return Ok(());
        };

        let protocol_version = self.protocol_version();
        let request = apply_session_headers(
            apply_protocol_version_header(
                self.client.delete(&self.url),
                Some(protocol_version.as_str()),
            ),
            Some(session_id.as_str()),
            &self.headers,
        );
        let response = request.send().await.map_err(|err| {
            ChatError::Connection(format!("Failed to close MCP session: {err}"))
        })?;

        let status = response.status();
        if status.is_success() || status == reqwest::StatusCode::METHOD_NOT_ALLOWED {
            debug!(%session_id, %status, "Closed MCP session");
        } else {
            warn!(%session_id, %status, "MCP server rejected session close");
        }
        Ok(())
    }

    async fn send_request(&mut self, request: RequestFromClient) -> Result<ServerMessage, String> {
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        let message = ClientMessage::from_message(
            MessageFromClient::RequestFromClient(request),
            Some(RequestId::Integer(request_id)),
        )
        .map_err(|err| err.to_string())?;
        self.send_message(message).await
    }

    async fn send_notification(&mut self, notification: NotificationFromClient) -> Result<(), String> {
        let message = ClientMessage::from_message(
            MessageFromClient::NotificationFromClient(notification),
            None,
        )
        .map_err(|err| err.to_string())?;

        let response = self.post(&message).await?;
        if let Some(session_id) = response_session_id(&response) {
            self.session_id = Some(session_id);
        }
        Ok(())
    }

    async fn send_message(&mut self, message: ClientMessage) -> Result<ServerMessage, String> {
        let response = self.post(&message).await?;
        let session_id = response_session_id(&response);
        let content_type = response_content_type(&response);

        let server_message = if is_event_stream_content_type(&content_type) {
            next_sse_server_message(response).await?
        } else {
            let body = response.bytes().await.map_err(|err| err.to_string())?;
            serde_json::from_slice::<ServerMessage>(&body).map_err(|err| err.to_string())?
        };

        if let Some(session_id) = session_id {
            self.session_id = Some(session_id);
        }
        Ok(server_message)
    }

    async fn post(&self, message: &ClientMessage) -> Result<reqwest::Response, String> {
        let payload = serde_json::to_string(message).map_err(|err| err.to_string())?;
        debug!(url = %self.url, "Sending MCP HTTP request");

        let protocol_version = self.protocol_version();
        let request = apply_session_headers(
            apply_protocol_version_header(
                apply_post_headers(self.client.post(&self.url)),
                Some(protocol_version.as_str()),
            ),
            self.session_id.as_deref(),
            &self.headers,
        )
        .body(payload);

        let response = request.send().await.map_err(|err| err.to_string())?;
        if !response.status().is_success() {
            return Err(format!("HTTP error: {}", response.status()));
        }
        Ok(response)
    }
}

#[async_trait]
impl ToolInvoker for McpSession {
    async fn call_tool(
        &mut self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolInvocationResult, ChatError> {
        let output = McpSession::call_tool(self, name, arguments).await?;
        // Completion endpoints only accept text in tool messages.
        let content = match output.content {
            text @ Value::String(_) => text,
            other => Value::String(other.to_string()),
        };
        Ok(ToolInvocationResult { content })
    }
}

fn remote_failure(tool_name: &str, message: String) -> ChatError {
    ChatError::RemoteInvocation {
        tool_name: tool_name.to_string(),
        message,
    }
}

fn client_details() -> InitializeRequestParams {
    InitializeRequestParams {
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: Some("toolchat".to_string()),
            description: Some("Command-line chat client with MCP tool calling".to_string()),
            icons: Vec::new(),
            website_url: None,
        },
        meta: None,
        protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
    }
}
