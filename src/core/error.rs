use std::error::Error as StdError;
use std::fmt;

/// Everything that can stop a conversation turn or the client itself.
#[derive(Debug)]
pub enum ChatError {
    /// A required setting is missing or invalid. Fatal at startup.
    Configuration(String),

    /// The tool server could not be reached, or the handshake or tool listing failed.
    Connection(String),

    /// The model asked for a tool call whose arguments are not a JSON object.
    MalformedArguments {
        tool_name: String,
        arguments: String,
        reason: String,
    },

    /// The endpoint finished for a reason other than `stop` or `tool_calls`.
    UnrecognizedFinishReason(String),

    /// The tool server answered a tool call with an error.
    RemoteInvocation { tool_name: String, message: String },

    /// The completion endpoint failed or returned something unusable.
    Completion(String),

    /// One user turn needed more completion requests than allowed.
    RoundLimitExceeded(usize),

    /// The operator interrupted the running turn.
    Interrupted,

    Io(std::io::Error),
}

impl ChatError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ChatError::Configuration(_) | ChatError::Io(_))
    }
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::Configuration(message) => write!(f, "Configuration error: {message}"),
            ChatError::Connection(message) => write!(f, "Tool server error: {message}"),
            ChatError::MalformedArguments {
                tool_name,
                arguments,
                reason,
            } => write!(
                f,
                "Malformed arguments for tool '{tool_name}': {reason} (arguments: {arguments})"
            ),
            ChatError::UnrecognizedFinishReason(reason) => {
                write!(f, "Unrecognized finish reason: {reason}")
            }
            ChatError::RemoteInvocation { tool_name, message } => {
                write!(f, "Tool '{tool_name}' failed: {message}")
            }
            ChatError::Completion(message) => write!(f, "{message}"),
            ChatError::RoundLimitExceeded(limit) => write!(
                f,
                "Stopped after {limit} completion requests without a final answer"
            ),
            ChatError::Interrupted => write!(f, "Interrupted"),
            ChatError::Io(source) => write!(f, "I/O error: {source}"),
        }
    }
}

impl StdError for ChatError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ChatError::Io(source) => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ChatError {
    fn from(source: std::io::Error) -> Self {
        ChatError::Io(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_arguments_names_the_tool() {
        let err = ChatError::MalformedArguments {
            tool_name: "get_weather".to_string(),
            arguments: "{city".to_string(),
            reason: "key must be a string".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("get_weather"));
        assert!(text.contains("{city"));
    }

    #[test]
    fn only_configuration_and_io_are_fatal() {
        assert!(ChatError::Configuration("x".into()).is_fatal());
        assert!(ChatError::Io(std::io::Error::other("closed")).is_fatal());
        assert!(!ChatError::Interrupted.is_fatal());
        assert!(!ChatError::UnrecognizedFinishReason("length".into()).is_fatal());
    }
}
