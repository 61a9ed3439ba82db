use super::*;
use crate::api::ChatCompletionResponse;
use crate::core::tool_registry::{build_tool_registry, ToolDescriptor};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Mutex;

const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

struct ScriptedBackend {
    responses: Mutex<VecDeque<Value>>,
    requests: Mutex<Vec<ChatCompletionRequest>>,
}

impl ScriptedBackend {
    fn new(responses: Vec<Value>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<ChatCompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ChatError> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ChatError::Completion("script exhausted".into()))?;
        Ok(serde_json::from_value(next).expect("scripted response should parse"))
    }
}

#[derive(Default)]
struct ScriptedInvoker {
    results: VecDeque<Result<Value, String>>,
    calls: Vec<(String, Map<String, Value>)>,
}

impl ScriptedInvoker {
    fn returning(results: Vec<Result<Value, String>>) -> Self {
        Self {
            results: results.into(),
            calls: Vec::new(),
        }
    }
}

#[async_trait]
impl ToolInvoker for ScriptedInvoker {
    async fn call_tool(
        &mut self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolInvocationResult, ChatError> {
        self.calls.push((name.to_string(), arguments));
        match self.results.pop_front() {
            Some(Ok(content)) => Ok(ToolInvocationResult { content }),
            Some(Err(message)) => Err(ChatError::RemoteInvocation {
                tool_name: name.to_string(),
                message,
            }),
            None => panic!("unexpected tool call to {name}"),
        }
    }
}

fn session_config() -> SessionConfig {
    SessionConfig {
        model: "gpt-4.1".to_string(),
        temperature: 0.7,
        top_p: 0.95,
        max_output_tokens: 1600,
        frequency_penalty: 0.0,
        presence_penalty: 0.0,
    }
}

fn weather_session(max_rounds: usize) -> ConversationSession {
    let tools = build_tool_registry(&[ToolDescriptor {
        name: "get_weather".to_string(),
        description: Some("Current weather for a city".to_string()),
        input_schema: None,
    }]);
    ConversationSession::new(session_config(), tools, SYSTEM_PROMPT, max_rounds)
}

fn stop(text: &str) -> Value {
    json!({
        "choices": [{"index": 0, "message": {"content": text}, "finish_reason": "stop"}]
    })
}

fn tool_call(id: &str, name: &str, arguments: &str) -> Value {
    json!({
        "choices": [{
            "index": 0,
            "message": {
                "content": null,
                "tool_calls": [{"id": id, "type": "function",
                                "function": {"name": name, "arguments": arguments}}]
            },
            "finish_reason": "tool_calls"
        }]
    })
}

fn output_lines(out: &[u8]) -> Vec<String> {
    String::from_utf8(out.to_vec())
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn initialize_prompt_leaves_only_the_system_message() {
    let mut session = weather_session(10);
    session.push_user_message("one");
    session.push_user_message("two");
    assert_eq!(session.history().len(), 4);

    session.initialize_prompt("Be terse.");
    assert_eq!(session.history().len(), 1);
    assert_eq!(
        session.history()[0],
        ChatMessage::System {
            content: "Be terse.".to_string()
        }
    );
    assert_eq!(session.system_prompt(), "Be terse.");
}

#[test]
fn appending_user_messages_never_alters_earlier_entries() {
    let mut session = weather_session(10);
    session.push_user_message("first");
    let before = session.history().to_vec();

    session.push_user_message("second");
    assert_eq!(session.history().len(), before.len() + 1);
    assert_eq!(&session.history()[..before.len()], before.as_slice());
}

#[tokio::test]
async fn plain_answer_is_emitted_and_recorded() {
    let backend = ScriptedBackend::new(vec![stop("Hi there")]);
    let mut invoker = ScriptedInvoker::default();
    let mut out = Vec::new();
    let mut session = weather_session(10);

    session.push_user_message("hello");
    let outcome = session
        .run_completion_round(&backend, &mut invoker, &mut out)
        .await
        .expect("round should succeed");

    assert_eq!(outcome.content, "Hi there");
    assert_eq!(outcome.completions, 1);
    assert_eq!(output_lines(&out), vec!["Hi there"]);

    let roles: Vec<_> = session.history().iter().map(ChatMessage::role).collect();
    assert_eq!(roles, vec!["system", "user", "assistant"]);
    assert_eq!(session.history()[2].text(), Some("Hi there"));
    assert!(invoker.calls.is_empty());
}

#[tokio::test]
async fn tool_call_round_trip_feeds_result_back_to_the_model() {
    let backend = ScriptedBackend::new(vec![
        tool_call("call_1", "get_weather", r#"{"city":"Paris"}"#),
        stop("18°C in Paris"),
    ]);
    let mut invoker = ScriptedInvoker::returning(vec![Ok(json!("{\"tempC\":18}"))]);
    let mut out = Vec::new();
    let mut session = weather_session(10);

    session.push_user_message("what's the weather");
    let outcome = session
        .run_completion_round(&backend, &mut invoker, &mut out)
        .await
        .expect("round should succeed");

    assert_eq!(outcome.content, "18°C in Paris");
    assert_eq!(outcome.completions, 2);
    assert_eq!(outcome.tool_calls, 1);
    assert_eq!(
        output_lines(&out),
        vec![
            TOOL_CALL_NOTICE.to_string(),
            r#"[get_weather: {"city":"Paris"}]"#.to_string(),
            "18°C in Paris".to_string(),
        ]
    );

    assert_eq!(invoker.calls.len(), 1);
    assert_eq!(invoker.calls[0].0, "get_weather");
    assert_eq!(invoker.calls[0].1.get("city"), Some(&json!("Paris")));

    let history = session.history();
    let roles: Vec<_> = history.iter().map(ChatMessage::role).collect();
    assert_eq!(roles, vec!["system", "user", "assistant", "tool", "assistant"]);
    assert_eq!(
        history[3],
        ChatMessage::Tool {
            tool_call_id: "call_1".to_string(),
            name: "get_weather".to_string(),
            content: json!("{\"tempC\":18}"),
        }
    );

    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].messages.len(), 2);
    assert_eq!(requests[1].messages.len(), 4);
    assert_eq!(requests[1].tools.len(), 1);
    assert_eq!(requests[1].parallel_tool_calls, Some(false));
}

#[tokio::test]
async fn requests_carry_session_sampling_parameters() {
    let backend = ScriptedBackend::new(vec![stop("ok")]);
    let mut session = ConversationSession::new(session_config(), Vec::new(), SYSTEM_PROMPT, 3);
    session.push_user_message("hi");
    session
        .run_completion_round(&backend, &mut ScriptedInvoker::default(), &mut Vec::new())
        .await
        .unwrap();

    let request = &backend.requests()[0];
    assert_eq!(request.model, "gpt-4.1");
    assert_eq!(request.temperature, 0.7);
    assert_eq!(request.top_p, 0.95);
    assert_eq!(request.max_completion_tokens, 1600);
    assert!(request.tools.is_empty());
    assert_eq!(request.parallel_tool_calls, None);
}

#[tokio::test]
async fn unrecognized_finish_reason_fails_after_recording_the_message() {
    let backend = ScriptedBackend::new(vec![json!({
        "choices": [{"message": {"content": "truncated"}, "finish_reason": "content_filter"}]
    })]);
    let mut out = Vec::new();
    let mut session = weather_session(10);

    session.push_user_message("hello");
    let err = session
        .run_completion_round(&backend, &mut ScriptedInvoker::default(), &mut out)
        .await
        .expect_err("round should fail");

    match err {
        ChatError::UnrecognizedFinishReason(reason) => assert_eq!(reason, "content_filter"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(session.history().len(), 3);
    assert_eq!(session.history()[2].role(), "assistant");
    assert!(out.is_empty());
}

#[tokio::test]
async fn missing_finish_reason_is_unrecognized() {
    let backend = ScriptedBackend::new(vec![json!({
        "choices": [{"message": {"content": "?"}, "finish_reason": null}]
    })]);
    let mut session = weather_session(10);
    session.push_user_message("hello");

    let err = session
        .run_completion_round(&backend, &mut ScriptedInvoker::default(), &mut Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::UnrecognizedFinishReason(_)));
}

#[tokio::test]
async fn malformed_arguments_abort_before_dispatch() {
    let backend = ScriptedBackend::new(vec![tool_call("call_1", "get_weather", "{city: Paris")]);
    let mut invoker = ScriptedInvoker::default();
    let mut session = weather_session(10);
    session.push_user_message("weather?");

    let err = session
        .run_completion_round(&backend, &mut invoker, &mut Vec::new())
        .await
        .unwrap_err();

    match err {
        ChatError::MalformedArguments {
            tool_name,
            arguments,
            ..
        } => {
            assert_eq!(tool_name, "get_weather");
            assert_eq!(arguments, "{city: Paris");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(invoker.calls.is_empty());
    let roles: Vec<_> = session.history().iter().map(ChatMessage::role).collect();
    assert_eq!(roles, ["system", "user", "assistant", "tool"]);
}

#[tokio::test]
async fn remote_failure_propagates_without_retry() {
    let backend = ScriptedBackend::new(vec![tool_call("call_1", "get_weather", r#"{"city":"Oslo"}"#)]);
    let mut invoker = ScriptedInvoker::returning(vec![Err("city not found".to_string())]);
    let mut session = weather_session(10);
    session.push_user_message("weather?");

    let err = session
        .run_completion_round(&backend, &mut invoker, &mut Vec::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ChatError::RemoteInvocation { .. }));
    assert_eq!(invoker.calls.len(), 1);
    assert_eq!(backend.requests().len(), 1);
}

#[tokio::test]
async fn failed_tool_call_is_answered_so_the_next_turn_is_valid() {
    let backend = ScriptedBackend::new(vec![
        tool_call("call_1", "get_weather", r#"{"city":"Oslo"}"#),
        stop("Sorry, I could not look that up."),
    ]);
    let mut invoker = ScriptedInvoker::returning(vec![Err("city not found".to_string())]);
    let mut session = weather_session(10);

    session.push_user_message("weather in Oslo?");
    session
        .run_completion_round(&backend, &mut invoker, &mut Vec::new())
        .await
        .unwrap_err();

    match &session.history()[3] {
        ChatMessage::Tool {
            tool_call_id,
            name,
            content,
        } => {
            assert_eq!(tool_call_id, "call_1");
            assert_eq!(name, "get_weather");
            let text = content.as_str().unwrap();
            assert!(text.starts_with("Tool call failed:"));
            assert!(text.contains("city not found"));
        }
        other => panic!("expected tool message, got {other:?}"),
    }

    session.push_user_message("never mind");
    session
        .run_completion_round(&backend, &mut invoker, &mut Vec::new())
        .await
        .unwrap();

    let second = &backend.requests()[1];
    let roles: Vec<_> = second.messages.iter().map(ChatMessage::role).collect();
    assert_eq!(roles, ["system", "user", "assistant", "tool", "user"]);
}

#[test]
fn answering_pending_tool_call_ignores_settled_history() {
    let mut session = weather_session(10);
    session.push_user_message("hello");
    assert!(!session.answer_pending_tool_call(&ChatError::Interrupted));
    assert_eq!(session.history().len(), 2);
}

#[tokio::test]
async fn endless_tool_calls_hit_the_round_limit() {
    let backend = ScriptedBackend::new(vec![
        tool_call("call_1", "get_weather", r#"{"city":"A"}"#),
        tool_call("call_2", "get_weather", r#"{"city":"B"}"#),
        tool_call("call_3", "get_weather", r#"{"city":"C"}"#),
    ]);
    let mut invoker = ScriptedInvoker::returning(vec![
        Ok(json!("1")),
        Ok(json!("2")),
        Ok(json!("3")),
    ]);
    let mut session = weather_session(2);
    session.push_user_message("loop forever");

    let err = session
        .run_completion_round(&backend, &mut invoker, &mut Vec::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ChatError::RoundLimitExceeded(2)));
    assert_eq!(backend.requests().len(), 2);
    assert_eq!(invoker.calls.len(), 2);
}

#[tokio::test]
async fn only_the_first_of_several_tool_calls_runs() {
    let backend = ScriptedBackend::new(vec![
        json!({
            "choices": [{
                "message": {
                    "tool_calls": [
                        {"id": "call_a", "type": "function",
                         "function": {"name": "get_weather", "arguments": "{\"city\":\"Rome\"}"}},
                        {"id": "call_b", "type": "function",
                         "function": {"name": "get_weather", "arguments": "{\"city\":\"Nice\"}"}}
                    ]
                },
                "finish_reason": "tool_calls"
            }]
        }),
        stop("Rome is sunny"),
    ]);
    let mut invoker = ScriptedInvoker::returning(vec![Ok(json!("sunny"))]);
    let mut session = weather_session(10);
    session.push_user_message("weather in Rome and Nice");

    session
        .run_completion_round(&backend, &mut invoker, &mut Vec::new())
        .await
        .unwrap();

    assert_eq!(invoker.calls.len(), 1);
    assert_eq!(invoker.calls[0].1.get("city"), Some(&json!("Rome")));

    let tool_ids: Vec<_> = session
        .history()
        .iter()
        .filter_map(|message| match message {
            ChatMessage::Tool { tool_call_id, .. } => Some(tool_call_id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(tool_ids, vec!["call_a"]);
}

#[tokio::test]
async fn tool_calls_finish_without_calls_is_an_error() {
    let backend = ScriptedBackend::new(vec![json!({
        "choices": [{"message": {"content": null, "tool_calls": []}, "finish_reason": "tool_calls"}]
    })]);
    let mut session = weather_session(10);
    session.push_user_message("hi");

    let err = session
        .run_completion_round(&backend, &mut ScriptedInvoker::default(), &mut Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::Completion(_)));
}

#[test]
fn blank_and_null_arguments_mean_no_arguments() {
    assert!(parse_tool_arguments("ping", "").unwrap().is_empty());
    assert!(parse_tool_arguments("ping", "  ").unwrap().is_empty());
    assert!(parse_tool_arguments("ping", "null").unwrap().is_empty());
}

#[test]
fn non_object_arguments_are_malformed() {
    let err = parse_tool_arguments("multiply", "[2, 3]").unwrap_err();
    assert!(err.to_string().contains("an array"));
    assert!(parse_tool_arguments("multiply", "\"2 x 3\"").is_err());
}
