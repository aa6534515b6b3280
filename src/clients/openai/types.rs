use serde::{Deserialize, Serialize};

use crate::error::UpstreamError;
use crate::models::ChatMessage;

#[derive(Debug, Serialize, Deserialize)]
#[allow(dead_code)]
pub struct Usage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[allow(dead_code)]
pub struct ResponseMessage {
    #[serde(default)]
    pub role: Option<String>,
    /// `null` when the model produced no text, e.g. after a content filter stop.
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[allow(dead_code)]
pub struct Choice {
    pub message: ResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub index: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    /// `system_prompt` first, then `history` in its original order.
    pub fn with_system_prompt(
        model: &str,
        system_prompt: &str,
        history: Vec<ChatMessage>,
        max_tokens: Option<u32>,
    ) -> Self {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(system_prompt));
        messages.extend(history);
        CompletionRequest {
            model: model.to_string(),
            messages,
            max_tokens,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[allow(dead_code)]
pub struct CompletionResponse {
    pub id: Option<String>,
    pub object: Option<String>,
    pub created: Option<i64>,
    pub model: Option<String>,
    pub usage: Option<Usage>,
    pub choices: Vec<Choice>,
}

impl CompletionResponse {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Text of the first choice.
    pub fn into_content(self) -> Result<String, UpstreamError> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or(UpstreamError::NoChoices)?;
        choice.message.content.ok_or(UpstreamError::NoContent {
            finish_reason: choice.finish_reason,
        })
    }
}
