//! Request pipeline. Security headers go on every response; the other stages
//! run in order: CORS, rate limit, body parsing, routing. A stage either
//! passes the request on or answers it.

use std::convert::Infallible;
use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::{Method, Request, Response};
use http_body_util::Full;
use hyper::body::Body;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::handler::{self, completions, error_response};
use crate::models::ErrorEnvelope;
use crate::state::AppState;

use self::cors::CorsDecision;

pub mod cors;
pub mod rate_limit;
pub mod security_headers;

pub async fn handle<B>(
    state: Arc<AppState>,
    peer: SocketAddr,
    req: Request<B>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let trace_id = Uuid::new_v4();
    let span = info_span!("request", %trace_id);
    async move {
        info!("Received request: {} {} from {}", req.method(), req.uri().path(), peer);
        let mut response = run_stages(&state, peer, req).await;
        security_headers::apply(response.headers_mut());
        info!("Responded {}", response.status());
        Ok(response)
    }
    .instrument(span)
    .await
}

async fn run_stages<B>(state: &AppState, peer: SocketAddr, req: Request<B>) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let cors = state.cors.evaluate(req.headers());
    if let CorsDecision::Rejected(origin) = &cors {
        warn!("Rejected request from origin {}", origin);
        return handler::json_response(
            http::StatusCode::FORBIDDEN,
            &ErrorEnvelope::message("Not allowed by CORS"),
        );
    }
    if cors::is_preflight(req.method()) {
        return cors.preflight_response(req.headers());
    }

    let decision = state.limiter.check(peer.ip());
    let mut response = if decision.allowed {
        route(state, req).await
    } else {
        warn!("Rate limit exceeded for {}", peer.ip());
        state.limiter.rejection()
    };
    state.limiter.apply_headers(&decision, response.headers_mut());
    cors.apply_headers(response.headers_mut());
    response
}

async fn route<B>(state: &AppState, req: Request<B>) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let op = match (req.method(), req.uri().path()) {
        (&Method::POST, "/chat") => Operation::Chat,
        (&Method::POST, "/summarize") => Operation::Summarize,
        _ => return handler::not_found(),
    };
    let body = match handler::read_body(req.into_body()).await {
        Ok(body) => body,
        Err(e) => return error_response(&e),
    };
    match op {
        Operation::Chat => completions::chat(state, body).await,
        Operation::Summarize => completions::summarize(state, body).await,
    }
}

enum Operation {
    Chat,
    Summarize,
}
