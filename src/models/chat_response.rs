use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ChatReply {
    pub reply: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SummaryReply {
    pub title: String,
}

impl SummaryReply {
    pub fn from_content(content: &str) -> Self {
        SummaryReply {
            title: content.trim().to_string(),
        }
    }
}

/// `error` is either a local message or the upstream error body as received.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorEnvelope {
    pub error: Value,
}

impl ErrorEnvelope {
    pub fn message(message: impl Into<String>) -> Self {
        ErrorEnvelope {
            error: Value::String(message.into()),
        }
    }
}
