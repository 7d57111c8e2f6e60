//! Diabetes education chat
//!
//! Wraps an external LLM runtime with a per-conversation message store,
//! a topic filter and keyword search over a plain-text reference guide.

mod guide;
mod llm;
mod service;
mod session;
mod topic;

pub use guide::ReferenceGuide;
pub use llm::{ChatModel, OllamaChat, OllamaConfig};
pub use service::{ChatHealth, ChatReply, ChatService};
pub use session::{ChatMessage, Role, SessionManager, MAX_STORED_MESSAGES};
pub use topic::{TopicFilter, REFUSAL};

use thiserror::Error;

use crate::models::ModelError;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Invalid message: {0}")]
    Validation(String),

    #[error("Chat model unavailable: {0}")]
    Model(#[from] ModelError),

    #[error("Chat is disabled")]
    Disabled,
}

pub type ChatResult<T> = Result<T, ChatError>;

#[cfg(test)]
pub(crate) mod testing {
    pub use super::llm::testing::*;
}
