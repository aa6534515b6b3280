use hyper::StatusCode;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Failed to send request to OpenAI API: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx reply. `body` is the parsed JSON, the raw text, or `None` when empty.
    #[error("Request failed with status code {}", .status.as_u16())]
    Status {
        status: reqwest::StatusCode,
        body: Option<Value>,
    },

    #[error("Failed to parse OpenAI API response: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("OpenAI API response contained no choices")]
    NoChoices,

    #[error("OpenAI API response contained no message content (finish_reason: {})", .finish_reason.as_deref().unwrap_or("unknown"))]
    NoContent { finish_reason: Option<String> },
}

impl UpstreamError {
    /// What the caller sees under `error`: the upstream body if there was one.
    pub fn payload(&self) -> Value {
        match self {
            UpstreamError::Status { body: Some(body), .. } => body.clone(),
            other => Value::String(other.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("OpenAI API key not set.")]
    MissingApiKey,

    #[error("Invalid JSON body: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Invalid request body: {0}")]
    InvalidBody(#[source] serde_json::Error),

    #[error("Failed to read request body")]
    UnreadableBody,

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::MissingApiKey | RelayError::Upstream(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            RelayError::InvalidJson(_) | RelayError::InvalidBody(_) | RelayError::UnreadableBody => {
                StatusCode::BAD_REQUEST
            }
            RelayError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            RelayError::Upstream(e) => e.payload(),
            other => Value::String(other.to_string()),
        }
    }
}
