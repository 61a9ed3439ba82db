use futures_util::StreamExt;
use memchr::memchr;
use rust_mcp_schema::schema_utils::ServerMessage;
use tracing::debug;

/// Splits a byte stream into trimmed, non-empty text lines.
#[derive(Default)]
pub struct SseLineBuffer {
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        self.drain_lines(false)
    }

    pub fn finish(&mut self) -> Vec<String> {
        self.drain_lines(true)
    }

    fn drain_lines(&mut self, flush: bool) -> Vec<String> {
        let mut lines = Vec::new();
        let mut search_index = 0;

        while let Some(relative_pos) = memchr(b'\n', &self.buffer[search_index..]) {
            let newline_index = search_index + relative_pos;
            push_trimmed(&mut lines, &self.buffer[search_index..newline_index]);
            search_index = newline_index + 1;
        }

        if flush {
            push_trimmed(&mut lines, &self.buffer[search_index..]);
            self.buffer.clear();
        } else if search_index > 0 {
            self.buffer.drain(..search_index);
        }

        lines
    }
}

fn push_trimmed(lines: &mut Vec<String>, bytes: &[u8]) {
    // Lines that are not valid UTF-8 cannot carry JSON; drop them.
    if let Ok(text) = std::str::from_utf8(bytes) {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed.to_string());
        }
    }
}

pub fn is_event_stream_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|value| value.eq_ignore_ascii_case("text/event-stream"))
}

pub fn sse_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim)
}

/// Reads events until the first response or error arrives.
///
/// Server-initiated requests and notifications on the same stream are skipped;
/// this client advertises no capabilities that would require answering them.
pub async fn next_sse_server_message(response: reqwest::Response) -> Result<ServerMessage, String> {
    let mut stream = response.bytes_stream();
    let mut buffer = SseLineBuffer::default();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| err.to_string())?;
        if let Some(message) = first_terminal_message(buffer.push(&chunk))? {
            return Ok(message);
        }
    }

    first_terminal_message(buffer.finish())?
        .ok_or_else(|| "Empty event-stream response.".to_string())
}

fn first_terminal_message(lines: Vec<String>) -> Result<Option<ServerMessage>, String> {
    for line in lines {
        match decode_sse_line(&line)? {
            Some(message @ (ServerMessage::Response(_) | ServerMessage::Error(_))) => {
                return Ok(Some(message));
            }
            Some(other) => debug!(message = ?other, "Skipping non-response MCP event"),
            None => {}
        }
    }
    Ok(None)
}

fn decode_sse_line(line: &str) -> Result<Option<ServerMessage>, String> {
    let Some(payload) = sse_data_payload(line) else {
        return Ok(None);
    };

    if payload.is_empty() {
        return Ok(None);
    }

    serde_json::from_str::<ServerMessage>(payload)
        .map(Some)
        .map_err(|err| err.to_string())
}
