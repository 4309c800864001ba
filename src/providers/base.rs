use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::errors::TransportError;
use crate::models::message::{Message, ToolCallRequest};
use crate::registry::ToolDescriptor;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }

    /// Accumulate another turn's counts into this total.
    pub fn add(&mut self, other: &Usage) {
        fn merge(total: &mut Option<i32>, extra: Option<i32>) {
            if let Some(extra) = extra {
                *total = Some(total.unwrap_or(0) + extra);
            }
        }
        merge(&mut self.input_tokens, other.input_tokens);
        merge(&mut self.output_tokens, other.output_tokens);
        merge(&mut self.total_tokens, other.total_tokens);
    }
}

/// One increment of a streaming completion.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A fragment of assistant text.
    ContentDelta(String),
    /// A tool-call request, emitted once its fragments are fully
    /// accumulated.
    ToolCall(ToolCallRequest),
    /// The endpoint signalled the end of this completion.
    Done,
}

/// A lazy, finite, non-restartable sequence of completion events.
/// Dropping it releases the underlying connection.
pub type CompletionStream = BoxStream<'static, Result<StreamEvent, TransportError>>;

/// Base trait for chat-completion backends (OpenAI-compatible endpoints).
#[async_trait]
pub trait Provider: Send + Sync {
    /// Generate the next message for the given transcript.
    async fn complete(
        &self,
        system: Option<&str>,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<(Message, Usage), TransportError>;

    /// Generate the next message as an incremental event stream.
    async fn complete_stream(
        &self,
        system: Option<&str>,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<CompletionStream, TransportError>;
}
