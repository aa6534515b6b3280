use bytes::Bytes;
use http::{Response, StatusCode};
use http_body_util::Full;
use serde_json::Value;
use tracing::{error, info};

use crate::clients::openai::types::CompletionRequest;
use crate::error::RelayError;
use crate::models::{ChatReply, ChatRequest, SummaryReply};
use crate::state::AppState;

use super::{error_response, json_response};

pub const CHAT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

pub const SUMMARIZE_SYSTEM_PROMPT: &str = "Given the following chat, generate a short, clear, and engaging title (max 8 words) that best describes the main topic or purpose of the conversation. Do not include generic words like \"Chat\" or \"Conversation\". Only return the title.";

pub const SUMMARY_MAX_TOKENS: u32 = 20;

/// `POST /chat`: the assistant's next reply to the given history.
pub async fn chat(state: &AppState, body: Bytes) -> Response<Full<Bytes>> {
    match relay(state, &body, CHAT_SYSTEM_PROMPT, None).await {
        Ok(reply) => json_response(StatusCode::OK, &ChatReply { reply }),
        Err(e) => error_response(&e),
    }
}

/// `POST /summarize`: a short title for the given history.
pub async fn summarize(state: &AppState, body: Bytes) -> Response<Full<Bytes>> {
    match relay(state, &body, SUMMARIZE_SYSTEM_PROMPT, Some(SUMMARY_MAX_TOKENS)).await {
        Ok(content) => json_response(StatusCode::OK, &SummaryReply::from_content(&content)),
        Err(e) => error_response(&e),
    }
}

async fn relay(
    state: &AppState,
    body: &[u8],
    system_prompt: &str,
    max_tokens: Option<u32>,
) -> Result<String, RelayError> {
    let value = parse_body(body)?;
    let api_key = state.config.api_key().ok_or(RelayError::MissingApiKey)?;
    let chat_request = ChatRequest::from_value(value).map_err(RelayError::InvalidBody)?;

    let completion_request = CompletionRequest::with_system_prompt(
        &state.config.model,
        system_prompt,
        chat_request.messages,
        max_tokens,
    );
    info!(
        "Forwarding {} messages to {}",
        completion_request.messages.len(),
        completion_request.model
    );

    let content = state
        .openai
        .get_completion_message(api_key, &completion_request)
        .await
        .and_then(|response| response.into_content())
        .map_err(|e| {
            error!("OpenAI API error: {}", e);
            e
        })?;
    Ok(content)
}

/// An empty body reads as `{}`, so the credential check still comes first.
fn parse_body(body: &[u8]) -> Result<Value, RelayError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_slice(body).map_err(RelayError::InvalidJson)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use crate::state::AppState;
    use crate::test_support::{
        body_json, silent_url, test_config, test_state, unreachable_url, MockUpstream,
    };
    use std::time::{Duration, Instant};
    use serde_json::json;

    const HISTORY: &str = r#"{"messages":[
        {"role":"user","content":"Plan a trip to Lisbon"},
        {"role":"assistant","content":"How many days?"},
        {"role":"user","content":"Three"}
    ]}"#;

    fn completion(content: &str) -> String {
        json!({
            "id": "chatcmpl-test",
            "object": "chat.completion",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}, "finish_reason": "stop"}]
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_chat_returns_reply() {
        let upstream = MockUpstream::start(StatusCode::OK, &completion("Hello!")).await;
        let state = test_state(Some("sk-test"), &upstream.url);

        let response = chat(&state, Bytes::from(HISTORY)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"reply": "Hello!"}));
    }

    #[tokio::test]
    async fn test_chat_prepends_system_prompt() {
        let upstream = MockUpstream::start(StatusCode::OK, &completion("ok")).await;
        let state = test_state(Some("sk-test"), &upstream.url);

        chat(&state, Bytes::from(HISTORY)).await;

        let received = upstream.requests();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].authorization.as_deref(), Some("Bearer sk-test"));
        assert_eq!(
            received[0].body,
            json!({
                "model": "gpt-3.5-turbo",
                "messages": [
                    {"role": "system", "content": CHAT_SYSTEM_PROMPT},
                    {"role": "user", "content": "Plan a trip to Lisbon"},
                    {"role": "assistant", "content": "How many days?"},
                    {"role": "user", "content": "Three"}
                ]
            })
        );
    }

    #[tokio::test]
    async fn test_summarize_trims_title_and_bounds_tokens() {
        let upstream = MockUpstream::start(StatusCode::OK, &completion("  My Trip Plan  ")).await;
        let state = test_state(Some("sk-test"), &upstream.url);

        let response = summarize(&state, Bytes::from(HISTORY)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"title": "My Trip Plan"}));

        let received = upstream.requests();
        assert_eq!(received[0].body["max_tokens"], json!(20));
        assert_eq!(
            received[0].body["messages"][0],
            json!({"role": "system", "content": SUMMARIZE_SYSTEM_PROMPT})
        );
        assert_eq!(received[0].body["messages"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_missing_key_skips_upstream() {
        let upstream = MockUpstream::start(StatusCode::OK, &completion("unused")).await;
        let state = test_state(None, &upstream.url);

        for response in [
            chat(&state, Bytes::from(HISTORY)).await,
            summarize(&state, Bytes::from(HISTORY)).await,
            chat(&state, Bytes::new()).await,
        ] {
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(
                body_json(response).await,
                json!({"error": "OpenAI API key not set."})
            );
        }
        assert!(upstream.requests().is_empty());
    }

    #[tokio::test]
    async fn test_upstream_error_body_passed_through() {
        let upstream =
            MockUpstream::start(StatusCode::BAD_REQUEST, r#"{"error":"invalid_request"}"#).await;
        let state = test_state(Some("sk-test"), &upstream.url);

        let response = chat(&state, Bytes::from(HISTORY)).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({"error": {"error": "invalid_request"}})
        );
    }

    #[tokio::test]
    async fn test_summarize_error_policy_matches_chat() {
        let upstream = MockUpstream::start(StatusCode::UNAUTHORIZED, "").await;
        let state = test_state(Some("sk-bad"), &upstream.url);

        let response = summarize(&state, Bytes::from(HISTORY)).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Request failed with status code 401"})
        );
    }

    #[tokio::test]
    async fn test_malformed_upstream_body() {
        let upstream = MockUpstream::start(StatusCode::OK, r#"{"object":"chat.completion"}"#).await;
        let state = test_state(Some("sk-test"), &upstream.url);

        let response = chat(&state, Bytes::from(HISTORY)).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Failed to parse OpenAI API response"));
    }

    #[tokio::test]
    async fn test_empty_choices() {
        let upstream = MockUpstream::start(StatusCode::OK, r#"{"choices":[]}"#).await;
        let state = test_state(Some("sk-test"), &upstream.url);

        let response = chat(&state, Bytes::from(HISTORY)).await;

        assert_eq!(
            body_json(response).await,
            json!({"error": "OpenAI API response contained no choices"})
        );
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let state = test_state(Some("sk-test"), &unreachable_url().await);

        let response = chat(&state, Bytes::from(HISTORY)).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Failed to send request to OpenAI API"));
    }

    #[tokio::test]
    async fn test_upstream_timeout() {
        let config = RelayConfig {
            upstream_timeout_secs: 1,
            ..test_config(Some("sk-test"), &silent_url().await)
        };
        let state = AppState::new(config).unwrap();

        let started = Instant::now();
        let response = summarize(&state, Bytes::from(HISTORY)).await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Failed to send request to OpenAI API"));
    }

    #[tokio::test]
    async fn test_null_content_reported() {
        let upstream = MockUpstream::start(
            StatusCode::OK,
            r#"{"choices":[{"message":{"role":"assistant","content":null},"finish_reason":"content_filter"}]}"#,
        )
        .await;
        let state = test_state(Some("sk-test"), &upstream.url);

        let response = chat(&state, Bytes::from(HISTORY)).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({"error": "OpenAI API response contained no message content (finish_reason: content_filter)"})
        );
    }

    #[tokio::test]
    async fn test_invalid_bodies_rejected_before_upstream() {
        let upstream = MockUpstream::start(StatusCode::OK, &completion("unused")).await;
        let state = test_state(Some("sk-test"), &upstream.url);

        let not_json = chat(&state, Bytes::from("{messages:")).await;
        assert_eq!(not_json.status(), StatusCode::BAD_REQUEST);

        let bad_role = chat(
            &state,
            Bytes::from(r#"{"messages":[{"role":"wizard","content":"hi"}]}"#),
        )
        .await;
        assert_eq!(bad_role.status(), StatusCode::BAD_REQUEST);

        let missing = summarize(&state, Bytes::from("{}")).await;
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        assert!(upstream.requests().is_empty());
    }

    #[test]
    fn test_parse_body_empty_is_object() {
        assert_eq!(parse_body(b"").unwrap(), json!({}));
        assert_eq!(parse_body(b"  \n").unwrap(), json!({}));
        assert!(parse_body(b"[").is_err());
    }
}
