//! Conversation orchestration.
//!
//! A [`ConversationSession`] owns the history of one prompt context and drives
//! the completion/tool-call cycle for each user turn. The endpoint and the
//! tool server are reached through [`CompletionBackend`] and [`ToolInvoker`],
//! so the cycle runs the same against the network or scripted fakes.

use std::io::Write;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::api::completions::CompletionBackend;
use crate::api::{ChatCompletionRequest, ChatMessage, ChatToolCall, ChatToolDefinition, FinishReason};
use crate::core::config::SessionConfig;
use crate::core::error::ChatError;
use crate::core::message::{
    build_assistant_message, build_system_message, build_tool_message, build_user_message,
};

pub const TOOL_CALL_NOTICE: &str = "Tool call detected, calling MCP server...";

/// Payload returned by the tool server for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocationResult {
    pub content: Value,
}

/// Executes tool calls requested by the model.
#[async_trait]
pub trait ToolInvoker: Send {
    async fn call_tool(
        &mut self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolInvocationResult, ChatError>;
}

/// How a completed round ended.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundOutcome {
    /// Final assistant text that was emitted.
    pub content: String,
    /// Completion requests made, including the final one.
    pub completions: usize,
    /// Tool calls dispatched along the way.
    pub tool_calls: usize,
}

pub struct ConversationSession {
    config: SessionConfig,
    tools: Vec<ChatToolDefinition>,
    history: Vec<ChatMessage>,
    max_rounds: usize,
}

impl ConversationSession {
    pub fn new(
        config: SessionConfig,
        tools: Vec<ChatToolDefinition>,
        system_prompt: &str,
        max_rounds: usize,
    ) -> Self {
        Self {
            config,
            tools,
            history: vec![build_system_message(system_prompt)],
            max_rounds: max_rounds.max(1),
        }
    }

    /// Starts a fresh prompt context holding only the system message.
    pub fn initialize_prompt(&mut self, system_prompt: &str) {
        self.history = vec![build_system_message(system_prompt)];
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn tools(&self) -> &[ChatToolDefinition] {
        &self.tools
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Text of the system message that opens the current context.
    pub fn system_prompt(&self) -> &str {
        self.history
            .first()
            .and_then(ChatMessage::text)
            .unwrap_or_default()
    }

    pub fn push_user_message(&mut self, text: &str) {
        self.history.push(build_user_message(text));
    }

    fn completion_request(&self) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.config.model.clone(),
            temperature: self.config.temperature,
            top_p: self.config.top_p,
            max_completion_tokens: self.config.max_output_tokens,
            frequency_penalty: self.config.frequency_penalty,
            presence_penalty: self.config.presence_penalty,
            messages: self.history.clone(),
            tools: self.tools.clone(),
            parallel_tool_calls: (!self.tools.is_empty()).then_some(false),
        }
    }

    /// Requests completions until the model stops, dispatching each requested
    /// tool call in between.
    ///
    /// Every assistant and tool message is appended as soon as it exists, so
    /// a failing round leaves history describing exactly how far it got. A
    /// tool call that failed is still answered with a tool message carrying
    /// the error, keeping the history valid for the next request.
    pub async fn run_completion_round<C, T, W>(
        &mut self,
        backend: &C,
        invoker: &mut T,
        out: &mut W,
    ) -> Result<RoundOutcome, ChatError>
    where
        C: CompletionBackend + ?Sized,
        T: ToolInvoker + ?Sized,
        W: Write + ?Sized,
    {
        let result = self.complete_until_stop(backend, invoker, out).await;
        if let Err(err) = &result {
            self.answer_pending_tool_call(err);
        }
        result
    }

    /// Answers a recorded tool call that never got a result.
    ///
    /// Completion endpoints reject an assistant `tool_calls` message that is
    /// not followed by a tool message for the same call. Returns whether a
    /// message was appended.
    pub fn answer_pending_tool_call(&mut self, err: &ChatError) -> bool {
        let Some(ChatMessage::Assistant { tool_calls, .. }) = self.history.last() else {
            return false;
        };
        let Some(call) = tool_calls.first() else {
            return false;
        };

        let message = build_tool_message(
            call.id.clone(),
            call.function.name.clone(),
            Value::String(format!("Tool call failed: {err}")),
        );
        debug!(call_id = %call.id, error = %err, "Answering failed tool call");
        self.history.push(message);
        true
    }

    async fn complete_until_stop<C, T, W>(
        &mut self,
        backend: &C,
        invoker: &mut T,
        out: &mut W,
    ) -> Result<RoundOutcome, ChatError>
    where
        C: CompletionBackend + ?Sized,
        T: ToolInvoker + ?Sized,
        W: Write + ?Sized,
    {
        let mut completions = 0;
        let mut tool_calls = 0;

        loop {
            if completions >= self.max_rounds {
                return Err(ChatError::RoundLimitExceeded(self.max_rounds));
            }
            completions += 1;

            let response = backend.complete(&self.completion_request()).await?;
            self.history.push(build_assistant_message(&response)?);

            let Some(choice) = response.choices.first() else {
                return Err(ChatError::Completion(
                    "Completion response contained no choices".into(),
                ));
            };
            debug!(
                round = completions,
                finish_reason = ?choice.finish_reason,
                "Completion round finished"
            );

            match &choice.finish_reason {
                Some(FinishReason::Stop) => {
                    let content = choice.message.content.clone().unwrap_or_default();
                    writeln!(out, "{content}")?;
                    return Ok(RoundOutcome {
                        content,
                        completions,
                        tool_calls,
                    });
                }
                Some(FinishReason::ToolCalls) => {
                    let requested = choice.message.requested_tool_calls();
                    let Some(call) = requested.first() else {
                        return Err(ChatError::Completion(
                            "Endpoint requested tool calls but listed none".into(),
                        ));
                    };
                    if requested.len() > 1 {
                        let ignored: Vec<_> = requested[1..]
                            .iter()
                            .map(|extra| extra.function.name.as_str())
                            .collect();
                        warn!(
                            dispatched = %call.function.name,
                            ignored = ?ignored,
                            "Endpoint requested several tool calls; only the first is run"
                        );
                    }

                    self.dispatch_tool_call(call, invoker, out).await?;
                    tool_calls += 1;
                }
                Some(FinishReason::Other(reason)) => {
                    return Err(ChatError::UnrecognizedFinishReason(reason.clone()));
                }
                None => {
                    return Err(ChatError::UnrecognizedFinishReason("<missing>".into()));
                }
            }
        }
    }

    async fn dispatch_tool_call<T, W>(
        &mut self,
        call: &ChatToolCall,
        invoker: &mut T,
        out: &mut W,
    ) -> Result<(), ChatError>
    where
        T: ToolInvoker + ?Sized,
        W: Write + ?Sized,
    {
        let name = call.function.name.as_str();
        let arguments = parse_tool_arguments(name, &call.function.arguments)?;

        writeln!(out, "{TOOL_CALL_NOTICE}")?;
        writeln!(out, "[{name}: {}]", Value::Object(arguments.clone()))?;
        out.flush()?;

        let result = invoker.call_tool(name, arguments).await?;
        debug!(tool = name, call_id = %call.id, result = %result.content, "Tool call completed");
        self.history
            .push(build_tool_message(&call.id, name, result.content));
        Ok(())
    }
}

/// Parses the model's argument text into a JSON object.
///
/// Blank text and `null` both mean "no arguments".
pub fn parse_tool_arguments(tool_name: &str, raw: &str) -> Result<Map<String, Value>, ChatError> {
    let malformed = |reason: String| ChatError::MalformedArguments {
        tool_name: tool_name.to_string(),
        arguments: raw.to_string(),
        reason,
    };

    if raw.trim().is_empty() {
        return Ok(Map::new());
    }

    match serde_json::from_str::<Value>(raw).map_err(|err| malformed(err.to_string()))? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(malformed(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests;
