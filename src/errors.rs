use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::message::Message;
use crate::schema::ValidationError;

/// Errors local to a single tool dispatch.
///
/// These are recovered into the conversation as tool-role messages so the
/// model can correct course; they never abort a `generate` call.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(#[from] ValidationError),

    #[error("Tool execution failed: {0}")]
    Execution(String),
}

/// Returned when registering a tool under a name that is already taken.
/// The registry keeps the first registration.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Duplicate tool name: {0}")]
pub struct DuplicateToolError(pub String);

/// Failures at the HTTP boundary with the model endpoint. Fatal to the
/// current call; retry policy belongs to the caller.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Server error {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Response(String),
}

/// Errors that terminate a `generate` call.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The model kept requesting tools without converging. Carries the full
    /// transcript so the caller can inspect what happened.
    #[error("Turn limit of {limit} reached without a final response")]
    TurnLimit {
        limit: usize,
        transcript: Vec<Message>,
    },
}
