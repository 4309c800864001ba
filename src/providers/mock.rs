use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;

use super::base::{CompletionStream, Provider, StreamEvent, Usage};
use crate::errors::TransportError;
use crate::models::message::Message;
use crate::registry::ToolDescriptor;

/// A mock provider that returns pre-configured responses for testing.
pub struct MockProvider {
    responses: Arc<Mutex<Vec<Message>>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses.
    pub fn new(responses: Vec<Message>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
        }
    }

    fn next_response(&self) -> Message {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Message::assistant("")
        } else {
            responses.remove(0)
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(
        &self,
        _system: Option<&str>,
        _messages: &[Message],
        _tools: &[ToolDescriptor],
    ) -> Result<(Message, Usage), TransportError> {
        Ok((self.next_response(), Usage::default()))
    }

    async fn complete_stream(
        &self,
        _system: Option<&str>,
        _messages: &[Message],
        _tools: &[ToolDescriptor],
    ) -> Result<CompletionStream, TransportError> {
        let message = self.next_response();
        let mut events: Vec<Result<StreamEvent, TransportError>> = Vec::new();

        // Break the content into small deltas so stream consumers see
        // real accumulation behavior.
        let mut remaining = message.content.as_str();
        while !remaining.is_empty() {
            let cut = remaining
                .char_indices()
                .nth(8)
                .map_or(remaining.len(), |(i, _)| i);
            events.push(Ok(StreamEvent::ContentDelta(remaining[..cut].to_string())));
            remaining = &remaining[cut..];
        }
        for call in message.tool_calls {
            events.push(Ok(StreamEvent::ToolCall(call)));
        }
        events.push(Ok(StreamEvent::Done));

        Ok(Box::pin(stream::iter(events)))
    }
}

/// A provider whose requests always fail, for transport-error paths.
pub struct FailingProvider;

#[async_trait]
impl Provider for FailingProvider {
    async fn complete(
        &self,
        _system: Option<&str>,
        _messages: &[Message],
        _tools: &[ToolDescriptor],
    ) -> Result<(Message, Usage), TransportError> {
        Err(TransportError::Status {
            status: 503,
            message: "service unavailable".to_string(),
        })
    }

    async fn complete_stream(
        &self,
        _system: Option<&str>,
        _messages: &[Message],
        _tools: &[ToolDescriptor],
    ) -> Result<CompletionStream, TransportError> {
        Err(TransportError::Status {
            status: 503,
            message: "service unavailable".to_string(),
        })
    }
}
