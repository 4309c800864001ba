//! The tool-calling dispatch loop.
//!
//! An [`Agent`] owns one provider and one tool registry. Each `generate`
//! call seeds a fresh transcript, round-trips it to the model, resolves any
//! requested tool calls through the registry, and repeats until the model
//! produces a final answer or the turn budget runs out. Tool failures are
//! fed back into the conversation so the model can recover; transport
//! failures and non-convergence terminate the call.

use std::sync::Arc;

use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::json;
use tracing::{debug, warn};

use crate::errors::AgentError;
use crate::models::message::{Message, ToolCallRequest};
use crate::providers::base::{Provider, StreamEvent, Usage};
use crate::registry::{ToolDescriptor, ToolRegistry};

pub const DEFAULT_MAX_TURNS: usize = 10;

/// The phase a `generate` call is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    AwaitingModel,
    DispatchingTools,
    Done,
    Failed,
}

/// Caller input: a bare prompt or a prepared message sequence.
pub enum Prompt {
    Text(String),
    Messages(Vec<Message>),
}

impl From<&str> for Prompt {
    fn from(text: &str) -> Self {
        Prompt::Text(text.to_string())
    }
}

impl From<String> for Prompt {
    fn from(text: String) -> Self {
        Prompt::Text(text)
    }
}

impl From<Vec<Message>> for Prompt {
    fn from(messages: Vec<Message>) -> Self {
        Prompt::Messages(messages)
    }
}

/// The result of a converged `generate` call.
#[derive(Debug, Clone)]
pub struct Completion {
    /// The final assistant message.
    pub message: Message,
    /// Every message of the call, including tool requests and results.
    pub transcript: Vec<Message>,
    /// Token usage accumulated across all turns.
    pub usage: Usage,
    pub state: AgentState,
}

/// Events yielded by a streaming `generate` call.
///
/// The stream is finite and non-restartable; it ends with `Completed` or
/// with an `Err` item, never by silent truncation.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// A fragment of assistant text, surfaced as it arrives.
    ContentDelta { partial_content: String },
    /// The model requested a tool invocation.
    ToolCallRequested(ToolCallRequest),
    /// A tool invocation was resolved into its transcript payload.
    ToolCallCompleted {
        id: String,
        content: String,
        is_error: bool,
    },
    /// The model produced its final answer.
    Completed { message: Message },
}

/// Drives conversations against a model endpoint with tool support.
pub struct Agent {
    provider: Box<dyn Provider>,
    registry: Arc<ToolRegistry>,
    system_prompt: Option<String>,
    max_turns: usize,
}

impl Agent {
    pub fn new(provider: Box<dyn Provider>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            registry,
            system_prompt: None,
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    fn seed(&self, prompt: Prompt) -> Vec<Message> {
        match prompt {
            Prompt::Text(text) => vec![Message::user(text)],
            Prompt::Messages(messages) => messages,
        }
    }

    /// Resolve one tool call into the payload of its paired tool message.
    ///
    /// Dispatch errors are encoded into the payload instead of raised; the
    /// model is an active participant capable of correcting course.
    async fn resolve_tool_call(&self, call: &ToolCallRequest) -> (String, bool) {
        match self
            .registry
            .dispatch(&call.name, call.arguments.clone())
            .await
        {
            Ok(result) => (result.to_string(), false),
            Err(error) => {
                warn!(tool = %call.name, %error, "tool call failed, reporting to the model");
                (json!({ "error": error.to_string() }).to_string(), true)
            }
        }
    }

    /// Run the conversation to completion and return the final message.
    pub async fn generate(&self, prompt: impl Into<Prompt>) -> Result<Completion, AgentError> {
        let mut transcript = self.seed(prompt.into());
        let tools: Vec<ToolDescriptor> = self.registry.descriptors().collect();
        let mut usage = Usage::default();

        for turn in 0..self.max_turns {
            debug!(turn, state = ?AgentState::AwaitingModel, "requesting completion");
            let (message, turn_usage) = self
                .provider
                .complete(self.system_prompt.as_deref(), &transcript, &tools)
                .await?;
            usage.add(&turn_usage);
            transcript.push(message.clone());

            if !message.requests_tools() {
                return Ok(Completion {
                    message,
                    transcript,
                    usage,
                    state: AgentState::Done,
                });
            }

            debug!(turn, state = ?AgentState::DispatchingTools, calls = message.tool_calls.len(), "resolving tool calls");
            for call in &message.tool_calls {
                let (content, _) = self.resolve_tool_call(call).await;
                transcript.push(Message::tool(call.id.clone(), content));
            }
        }

        Err(AgentError::TurnLimit {
            limit: self.max_turns,
            transcript,
        })
    }

    /// Run the conversation as a lazy stream of [`AgentEvent`]s.
    ///
    /// Content fragments are yielded as they arrive while being accumulated
    /// into the message the loop evaluates. Dropping the stream abandons
    /// the call; nothing outlives it.
    pub fn generate_stream(
        &self,
        prompt: impl Into<Prompt>,
    ) -> BoxStream<'_, Result<AgentEvent, AgentError>> {
        let mut transcript = self.seed(prompt.into());
        Box::pin(try_stream! {
            let tools: Vec<ToolDescriptor> = self.registry.descriptors().collect();
            let mut turn = 0;

            loop {
                if turn == self.max_turns {
                    let transcript = std::mem::take(&mut transcript);
                    Err(AgentError::TurnLimit { limit: self.max_turns, transcript })?;
                }
                turn += 1;

                debug!(turn, state = ?AgentState::AwaitingModel, "requesting streaming completion");
                let mut events = self
                    .provider
                    .complete_stream(self.system_prompt.as_deref(), &transcript, &tools)
                    .await?;

                let mut content = String::new();
                let mut calls: Vec<ToolCallRequest> = Vec::new();
                while let Some(event) = events.next().await {
                    match event? {
                        StreamEvent::ContentDelta(delta) => {
                            content.push_str(&delta);
                            yield AgentEvent::ContentDelta { partial_content: delta };
                        }
                        StreamEvent::ToolCall(call) => {
                            yield AgentEvent::ToolCallRequested(call.clone());
                            calls.push(call);
                        }
                        StreamEvent::Done => break,
                    }
                }

                let mut message = Message::assistant(content);
                for call in calls {
                    message = message.with_tool_call(call);
                }
                transcript.push(message.clone());

                if !message.requests_tools() {
                    yield AgentEvent::Completed { message };
                    break;
                }

                debug!(turn, state = ?AgentState::DispatchingTools, calls = message.tool_calls.len(), "resolving tool calls");
                for call in &message.tool_calls {
                    let (content, is_error) = self.resolve_tool_call(call).await;
                    transcript.push(Message::tool(call.id.clone(), content.clone()));
                    yield AgentEvent::ToolCallCompleted {
                        id: call.id.clone(),
                        content,
                        is_error,
                    };
                }
            }
        })
    }
}
