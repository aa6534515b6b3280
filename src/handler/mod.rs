use std::error::Error as StdError;

use bytes::Bytes;
use http::{header, HeaderValue, Response, StatusCode};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use serde::Serialize;
use tracing::error;

use crate::error::RelayError;
use crate::models::ErrorEnvelope;

pub mod completions;

/// Same ceiling as a default Express JSON parser.
pub const MAX_BODY_BYTES: usize = 100 * 1024;

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(body) {
        Ok(bytes) => {
            let mut response = Response::new(Full::new(Bytes::from(bytes)));
            *response.status_mut() = status;
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json; charset=utf-8"),
            );
            response
        }
        Err(e) => {
            error!("Failed to serialize response body: {}", e);
            let mut response = Response::new(Full::new(Bytes::from("Internal Server Error")));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}

pub fn error_response(err: &RelayError) -> Response<Full<Bytes>> {
    json_response(err.status(), &ErrorEnvelope { error: err.payload() })
}

pub fn not_found() -> Response<Full<Bytes>> {
    json_response(StatusCode::NOT_FOUND, &ErrorEnvelope::message("Not Found"))
}

pub async fn read_body<B>(body: B) -> Result<Bytes, RelayError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    match Limited::new(body, MAX_BODY_BYTES).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(RelayError::PayloadTooLarge)
        }
        Err(e) => {
            error!("Error reading request body: {}", e);
            Err(RelayError::UnreadableBody)
        }
    }
}
