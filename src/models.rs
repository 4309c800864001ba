//! The conversation data model exchanged with the model endpoint.
//!
//! Messages follow the shape of the chat-completion wire contract: a role,
//! text content, and (for assistant turns) the tool calls the model wants
//! resolved. The structs here are the internal form; conversion to and from
//! the exact wire payload lives in `providers::utils`.
pub mod message;
pub mod role;
