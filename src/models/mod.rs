use serde::{Deserialize, Serialize};

pub mod chat_request;
pub mod chat_response;

pub use chat_request::ChatRequest;
pub use chat_response::{ChatReply, ErrorEnvelope, SummaryReply};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        ChatMessage {
            role: Role::System,
            content: content.to_string(),
        }
    }

    #[cfg(test)]
    pub fn user(content: &str) -> Self {
        ChatMessage {
            role: Role::User,
            content: content.to_string(),
        }
    }

    #[cfg(test)]
    pub fn assistant(content: &str) -> Self {
        ChatMessage {
            role: Role::Assistant,
            content: content.to_string(),
        }
    }
}
