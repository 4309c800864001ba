use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::role::Role;

/// A request emitted by the model to invoke a named tool.
///
/// The arguments are the raw payload as the model produced it; validation
/// against the tool's schema happens at dispatch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolCallRequest {
    /// Create a request with a freshly generated call id.
    pub fn new<S: Into<String>>(name: S, arguments: Value) -> Self {
        Self {
            id: format!("call_{}", Uuid::new_v4().simple()),
            name: name.into(),
            arguments,
        }
    }

    /// Create a request with the id assigned by the endpoint.
    pub fn with_id<I, S>(id: I, name: S, arguments: Value) -> Self
    where
        I: Into<String>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// A message to or from the model. Immutable once appended to a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub created: i64,
    pub content: String,
    /// Tool invocations requested by an assistant message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    /// Back-reference to the request this message resolves, when role = tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn new<S: Into<String>>(role: Role, content: S) -> Self {
        Message {
            role,
            created: Utc::now().timestamp(),
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create a new system message with the current timestamp.
    pub fn system<S: Into<String>>(content: S) -> Self {
        Message::new(Role::System, content)
    }

    /// Create a new user message with the current timestamp.
    pub fn user<S: Into<String>>(content: S) -> Self {
        Message::new(Role::User, content)
    }

    /// Create a new assistant message with the current timestamp.
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Message::new(Role::Assistant, content)
    }

    /// Create a tool-result message paired to a tool call by id.
    pub fn tool<I: Into<String>, S: Into<String>>(tool_call_id: I, content: S) -> Self {
        let mut message = Message::new(Role::Tool, content);
        message.tool_call_id = Some(tool_call_id.into());
        message
    }

    /// Add a tool call request to the message.
    pub fn with_tool_call(mut self, call: ToolCallRequest) -> Self {
        self.tool_calls.push(call);
        self
    }

    /// Whether this message asks for tools to be invoked.
    pub fn requests_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}
