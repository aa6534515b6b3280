use std::time::Duration;

use http::header;
use serde_json::Value;
use tracing::{debug, error};

use crate::error::UpstreamError;

use super::types::{CompletionRequest, CompletionResponse};

/// Thin wrapper over a pooled reqwest client pointed at one completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(OpenAiClient {
            client,
            base_url: base_url.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get_completion_message(
        &self,
        api_key: &str,
        completion_request: &CompletionRequest,
    ) -> Result<CompletionResponse, UpstreamError> {
        debug!(
            "Sending request to LLM API: {} - {} ({} messages)",
            completion_request.model,
            self.base_url,
            completion_request.messages.len(),
        );

        let response = self
            .client
            .post(self.base_url.as_str())
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", api_key))
            .json(completion_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    error!("The request to the LLM API timed out.");
                } else if e.is_connect() {
                    error!("Failed to connect to the LLM API: {}", e);
                }
                e
            })?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            debug!("LLM API returned error status {}: {}", status, response_text);
            return Err(UpstreamError::Status {
                status,
                body: error_body(&response_text),
            });
        }

        CompletionResponse::from_json(&response_text).map_err(|e| {
            debug!("Raw response: {}", response_text);
            UpstreamError::Malformed(e)
        })
    }
}

fn error_body(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())))
}
