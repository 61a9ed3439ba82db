//! Line-oriented interactive loop.

use std::future::Future;
use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

use crate::api::completions::CompletionBackend;
use crate::core::error::ChatError;
use crate::core::session::{ConversationSession, RoundOutcome, ToolInvoker};

pub const PROMPT_BANNER: &str = "Your prompt:";

/// What one line of operator input asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Exit,
    Clear,
    ShowPrompt,
    ChangePrompt,
    Message(String),
}

impl ReplCommand {
    pub fn parse(line: &str) -> Self {
        match line.trim().to_ascii_lowercase().as_str() {
            "" | "exit" | "quit" | "q" => Self::Exit,
            "clear" => Self::Clear,
            "show prompt" => Self::ShowPrompt,
            "change" | "change prompt" | "set prompt" => Self::ChangePrompt,
            _ => Self::Message(line.to_string()),
        }
    }
}

/// Drives `session` from `input` until the operator exits, input ends, or
/// Ctrl+C is pressed at the prompt.
///
/// A failed round is reported and the loop keeps going; only fatal errors
/// (see [`ChatError::is_fatal`]) end the loop early.
pub async fn run_repl<R, W, C, T>(
    session: &mut ConversationSession,
    default_prompt: &str,
    backend: &C,
    invoker: &mut T,
    input: &mut R,
    out: &mut W,
) -> Result<(), ChatError>
where
    R: AsyncBufRead + Unpin,
    W: Write,
    C: CompletionBackend + ?Sized,
    T: ToolInvoker + ?Sized,
{
    writeln!(out, "{PROMPT_BANNER}")?;
    out.flush()?;

    while let Some(line) = read_line(input).await? {
        match ReplCommand::parse(&line) {
            ReplCommand::Exit => break,
            ReplCommand::Clear => {
                writeln!(out, "Clearing chat history...")?;
                session.initialize_prompt(default_prompt);
            }
            ReplCommand::ShowPrompt => {
                writeln!(out, "Prompt:")?;
                writeln!(out, "{}", session.system_prompt())?;
            }
            ReplCommand::ChangePrompt => {
                writeln!(out, "Changing prompt:")?;
                out.flush()?;
                let replacement = read_line(input).await?.unwrap_or_default();
                let prompt = if replacement.trim().is_empty() {
                    writeln!(out, "Prompt change cancelled.")?;
                    default_prompt
                } else {
                    replacement.trim()
                };
                session.initialize_prompt(prompt);
                writeln!(out, "Prompt:")?;
                writeln!(out, "{prompt}")?;
            }
            ReplCommand::Message(text) => {
                session.push_user_message(&text);
                writeln!(out, "AI Response:")?;
                out.flush()?;
                match run_turn(session, backend, invoker, out).await {
                    Ok(_) => {}
                    Err(err) if err.is_fatal() => return Err(err),
                    Err(err) => {
                        warn!(error = %err, "Conversation round failed");
                        writeln!(out, "❌ {err}")?;
                        writeln!(out, "Type 'clear' to start a fresh conversation.")?;
                    }
                }
            }
        }
        out.flush()?;
    }

    Ok(())
}

/// Runs one completion round, abandoning it if the operator presses Ctrl+C.
///
/// An abandoned tool call is answered in history so the next turn can
/// still be sent.
pub async fn run_turn<C, T, W>(
    session: &mut ConversationSession,
    backend: &C,
    invoker: &mut T,
    out: &mut W,
) -> Result<RoundOutcome, ChatError>
where
    C: CompletionBackend + ?Sized,
    T: ToolInvoker + ?Sized,
    W: Write + ?Sized,
{
    let result = tokio::select! {
        result = session.run_completion_round(backend, invoker, out) => result,
        _ = tokio::signal::ctrl_c() => Err(ChatError::Interrupted),
    };
    if let Err(err @ ChatError::Interrupted) = &result {
        session.answer_pending_tool_call(err);
    }
    result
}

async fn read_line<R: AsyncBufRead + Unpin>(input: &mut R) -> Result<Option<String>, ChatError> {
    read_line_until(input, tokio::signal::ctrl_c()).await
}

/// Reads one line, or `None` at end of input or once `interrupt` resolves.
async fn read_line_until<R, I, O>(input: &mut R, interrupt: I) -> Result<Option<String>, ChatError>
where
    R: AsyncBufRead + Unpin,
    I: Future<Output = O>,
{
    let mut line = String::new();
    let read = tokio::select! {
        read = input.read_line(&mut line) => read?,
        _ = interrupt => {
            debug!("Interrupted at the prompt");
            return Ok(None);
        }
    };
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}
