use std::sync::Arc;

use anyhow::{Context, Error};

use crate::clients::openai::OpenAiClient;
use crate::config::RelayConfig;
use crate::pipeline::cors::CorsPolicy;
use crate::pipeline::rate_limit::FixedWindowLimiter;

/// Everything a request needs, shared by all connections.
pub struct AppState {
    pub config: RelayConfig,
    pub openai: OpenAiClient,
    pub cors: CorsPolicy,
    pub limiter: Arc<FixedWindowLimiter>,
}

impl AppState {
    pub fn new(config: RelayConfig) -> Result<Self, Error> {
        let openai = OpenAiClient::new(&config.openai_base_url, config.upstream_timeout())
            .context("Failed to build HTTP client")?;
        let cors = CorsPolicy::new(config.allowed_origins.clone());
        let limiter = Arc::new(FixedWindowLimiter::new(
            config.rate_limit_max,
            config.rate_limit_window(),
        ));
        Ok(AppState {
            config,
            openai,
            cors,
            limiter,
        })
    }
}
