use regex::Regex;
use serde_json::{json, Value};
use tracing::warn;

use crate::errors::TransportError;
use crate::models::message::{Message, ToolCallRequest};
use crate::models::role::Role;
use crate::providers::base::Usage;
use crate::registry::ToolDescriptor;

/// Convert the internal transcript to the chat-completion message spec,
/// injecting the system prompt (when configured) as the first entry.
pub fn messages_to_openai_spec(system: Option<&str>, messages: &[Message]) -> Vec<Value> {
    let mut spec = Vec::with_capacity(messages.len() + 1);
    if let Some(system) = system {
        spec.push(json!({
            "role": "system",
            "content": system,
        }));
    }
    for message in messages {
        if message.role == Role::Tool {
            spec.push(json!({
                "role": "tool",
                "content": message.content,
                "tool_call_id": message.tool_call_id,
            }));
            continue;
        }
        let mut converted = json!({
            "role": message.role,
            "content": message.content,
        });
        if !message.tool_calls.is_empty() {
            let calls: Vec<Value> = message
                .tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": {
                            "name": sanitize_function_name(&call.name),
                            "arguments": call.arguments.to_string(),
                        }
                    })
                })
                .collect();
            converted["tool_calls"] = Value::Array(calls);
        }
        spec.push(converted);
    }
    spec
}

/// Convert tool descriptors to the endpoint's `tools` parameter.
pub fn tools_to_openai_spec(tools: &[ToolDescriptor]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.parameters,
                }
            })
        })
        .collect()
}

/// Convert a non-streaming chat-completion response to an assistant
/// [`Message`].
pub fn response_to_message(response: &Value) -> Result<Message, TransportError> {
    let raw = response
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| TransportError::Response("missing choices[0].message".to_string()))?;

    let content = raw
        .get("content")
        .and_then(|content| content.as_str())
        .unwrap_or_default();
    let mut message = Message::assistant(content);

    if let Some(calls) = raw.get("tool_calls").and_then(|calls| calls.as_array()) {
        for call in calls {
            let id = call["id"].as_str().unwrap_or_default();
            let name = call["function"]["name"].as_str().unwrap_or_default();
            if !is_valid_function_name(name) {
                warn!(name, "model produced an invalid function name");
            }
            let arguments = call["function"]["arguments"].as_str().unwrap_or_default();
            message =
                message.with_tool_call(ToolCallRequest::with_id(id, name, parse_arguments(arguments)));
        }
    }

    Ok(message)
}

/// Parse the JSON string the endpoint uses for tool-call arguments.
///
/// A payload that does not parse is kept verbatim so schema validation can
/// reject it with a diagnostic the model gets to see.
pub fn parse_arguments(raw: &str) -> Value {
    if raw.is_empty() {
        return json!({});
    }
    serde_json::from_str(raw).unwrap_or_else(|_| {
        warn!("tool call arguments are not valid JSON");
        Value::String(raw.to_string())
    })
}

/// Extract token usage from a chat-completion response.
pub fn get_usage(response: &Value) -> Usage {
    let usage = &response["usage"];
    let input_tokens = usage
        .get("prompt_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32);
    let output_tokens = usage
        .get("completion_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32);
    let total_tokens = usage
        .get("total_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32)
        .or_else(|| match (input_tokens, output_tokens) {
            (Some(input), Some(output)) => Some(input + output),
            _ => None,
        });
    Usage::new(input_tokens, output_tokens, total_tokens)
}

pub fn sanitize_function_name(name: &str) -> String {
    let re = Regex::new(r"[^a-zA-Z0-9_-]").unwrap();
    re.replace_all(name, "_").to_string()
}

pub fn is_valid_function_name(name: &str) -> bool {
    let re = Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
    re.is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldType, Schema};
    use serde_json::json;

    #[test]
    fn test_messages_to_openai_spec() {
        let spec = messages_to_openai_spec(None, &[Message::user("Hello")]);
        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["role"], "user");
        assert_eq!(spec[0]["content"], "Hello");
    }

    #[test]
    fn test_system_prompt_injected_first() {
        let spec = messages_to_openai_spec(Some("Be terse."), &[Message::user("Hi")]);
        assert_eq!(spec.len(), 2);
        assert_eq!(spec[0]["role"], "system");
        assert_eq!(spec[0]["content"], "Be terse.");
    }

    #[test]
    fn test_tool_call_pairing_survives_conversion() {
        let call = ToolCallRequest::with_id("call_7", "sum_numbers", json!({"num1": 1}));
        let messages = vec![
            Message::assistant("").with_tool_call(call),
            Message::tool("call_7", "{\"result\":1}"),
        ];
        let spec = messages_to_openai_spec(None, &messages);

        assert_eq!(spec[0]["tool_calls"][0]["id"], "call_7");
        assert_eq!(
            spec[0]["tool_calls"][0]["function"]["arguments"],
            "{\"num1\":1}"
        );
        assert_eq!(spec[1]["role"], "tool");
        assert_eq!(spec[1]["tool_call_id"], spec[0]["tool_calls"][0]["id"]);
    }

    #[test]
    fn test_tools_to_openai_spec() {
        let schema = Schema::new().field("input", FieldType::string(), "Test parameter");
        let descriptor = ToolDescriptor {
            name: "test_tool".into(),
            description: "A test tool".into(),
            parameters: schema.to_json_schema(),
        };
        let spec = tools_to_openai_spec(&[descriptor]);

        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["type"], "function");
        assert_eq!(spec[0]["function"]["name"], "test_tool");
        assert_eq!(spec[0]["function"]["parameters"]["type"], "object");
    }

    #[test]
    fn test_response_to_message_text() {
        let response = json!({
            "choices": [{
                "message": { "role": "assistant", "content": "Hello there" }
            }]
        });
        let message = response_to_message(&response).unwrap();
        assert_eq!(message.content, "Hello there");
        assert!(message.tool_calls.is_empty());
    }

    #[test]
    fn test_response_to_message_tool_call() {
        let response = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_123",
                        "type": "function",
                        "function": {
                            "name": "get_weather",
                            "arguments": "{\"location\":\"San Francisco, CA\"}"
                        }
                    }]
                }
            }]
        });
        let message = response_to_message(&response).unwrap();
        assert_eq!(message.tool_calls.len(), 1);
        assert_eq!(message.tool_calls[0].id, "call_123");
        assert_eq!(message.tool_calls[0].name, "get_weather");
        assert_eq!(
            message.tool_calls[0].arguments,
            json!({"location": "San Francisco, CA"})
        );
    }

    #[test]
    fn test_response_missing_message_is_transport_error() {
        let err = response_to_message(&json!({"choices": []})).unwrap_err();
        assert!(matches!(err, TransportError::Response(_)));
    }

    #[test]
    fn test_unparseable_arguments_kept_verbatim() {
        let arguments = parse_arguments("invalid json {");
        assert_eq!(arguments, Value::String("invalid json {".to_string()));
        assert_eq!(parse_arguments(""), json!({}));
    }

    #[test]
    fn test_get_usage_totals() {
        let usage = get_usage(&json!({
            "usage": { "prompt_tokens": 12, "completion_tokens": 15 }
        }));
        assert_eq!(usage.input_tokens, Some(12));
        assert_eq!(usage.output_tokens, Some(15));
        assert_eq!(usage.total_tokens, Some(27));
    }

    #[test]
    fn test_sanitize_function_name() {
        assert_eq!(sanitize_function_name("hello-world"), "hello-world");
        assert_eq!(sanitize_function_name("hello world"), "hello_world");
        assert_eq!(sanitize_function_name("hello@world"), "hello_world");
    }

    #[test]
    fn test_is_valid_function_name() {
        assert!(is_valid_function_name("hello_world"));
        assert!(!is_valid_function_name("hello world"));
        assert!(!is_valid_function_name(""));
    }
}
