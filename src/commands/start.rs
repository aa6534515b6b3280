use std::sync::Arc;

use anyhow::Error;
use http::Request;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::RelayConfig;
use crate::pipeline::{self, rate_limit};
use crate::state::AppState;

pub async fn start_server(config: RelayConfig) -> Result<(), Error> {
    let addr = config.addr()?;
    if config.api_key().is_none() {
        warn!("OPENAI_API_KEY is not set; /chat and /summarize will return errors");
    }
    let state = Arc::new(AppState::new(config)?);
    let pruner = rate_limit::spawn_pruner(state.limiter.clone());

    let listener = TcpListener::bind(addr).await?;
    info!("Server running on http://{}", addr);
    info!("Relaying to {}", state.openai.base_url());

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                let io = TokioIo::new(stream);
                let state = state.clone();

                tokio::task::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| pipeline::handle(state.clone(), peer, req));
                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        error!("Error serving connection: {:?}", err);
                    }
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    pruner.abort();
    Ok(())
}

pub async fn run(mut config: RelayConfig, port: Option<u16>) -> Result<(), Error> {
    if let Some(port) = port {
        config.port = port;
    }
    start_server(config).await
}
