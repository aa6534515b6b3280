use std::collections::HashMap;
use std::env;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Error};
use dirs_next::config_dir;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const PORT: &str = "PORT";
const RELAY_HOST: &str = "RELAY_HOST";
const RELAY_OPENAI_BASE_URL: &str = "RELAY_OPENAI_BASE_URL";
const RELAY_MODEL: &str = "RELAY_MODEL";
const RELAY_ALLOWED_ORIGINS: &str = "RELAY_ALLOWED_ORIGINS";
const RELAY_RATE_LIMIT_WINDOW_SECS: &str = "RELAY_RATE_LIMIT_WINDOW_SECS";
const RELAY_RATE_LIMIT_MAX: &str = "RELAY_RATE_LIMIT_MAX";
const RELAY_UPSTREAM_TIMEOUT_SECS: &str = "RELAY_UPSTREAM_TIMEOUT_SECS";

/// Process-wide relay settings. Built once at startup and shared read-only.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RelayConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,
    #[serde(default = "default_rate_limit_max")]
    pub rate_limit_max: u32,
    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5001
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "https://chatbot-flame-three.vercel.app".to_string(),
    ]
}
fn default_rate_limit_window_secs() -> u64 {
    15 * 60
}
fn default_rate_limit_max() -> u32 {
    100
}
fn default_upstream_timeout_secs() -> u64 {
    30
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            openai_api_key: None,
            host: default_host(),
            port: default_port(),
            openai_base_url: default_openai_base_url(),
            model: default_model(),
            allowed_origins: default_allowed_origins(),
            rate_limit_window_secs: default_rate_limit_window_secs(),
            rate_limit_max: default_rate_limit_max(),
            upstream_timeout_secs: default_upstream_timeout_secs(),
        }
    }
}

pub fn default_config_path() -> PathBuf {
    let mut path = config_dir()
        .or_else(|| env::current_dir().ok())
        .unwrap_or_default();
    path.push("chat-relay");
    path.push("relay.toml");
    path
}

impl RelayConfig {
    /// Defaults, then the TOML file (if present), then `.env`, then the
    /// process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(default_config_path);
        let config = if path.exists() {
            info!("Loading config from {}", path.display());
            Self::from_file(&path)?
        } else {
            debug!("No config file at {}, using defaults", path.display());
            RelayConfig::default()
        };
        let dotenv = read_dotenv(None)?;
        config.with_env(layered_env(dotenv))?.validated()
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self, Error> {
        Ok(toml::from_str(content)?)
    }

    /// Overlays environment values. `lookup` stands in for `std::env::var`.
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(OPENAI_API_KEY) {
            self.openai_api_key = Some(key);
        }
        if let Some(host) = lookup(RELAY_HOST) {
            self.host = host;
        }
        if let Some(port) = lookup(PORT) {
            self.port = parse_var(PORT, &port)?;
        }
        if let Some(url) = lookup(RELAY_OPENAI_BASE_URL) {
            self.openai_base_url = url;
        }
        if let Some(model) = lookup(RELAY_MODEL) {
            self.model = model;
        }
        if let Some(origins) = lookup(RELAY_ALLOWED_ORIGINS) {
            self.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(secs) = lookup(RELAY_RATE_LIMIT_WINDOW_SECS) {
            self.rate_limit_window_secs = parse_var(RELAY_RATE_LIMIT_WINDOW_SECS, &secs)?;
        }
        if let Some(max) = lookup(RELAY_RATE_LIMIT_MAX) {
            self.rate_limit_max = parse_var(RELAY_RATE_LIMIT_MAX, &max)?;
        }
        if let Some(secs) = lookup(RELAY_UPSTREAM_TIMEOUT_SECS) {
            self.upstream_timeout_secs = parse_var(RELAY_UPSTREAM_TIMEOUT_SECS, &secs)?;
        }
        Ok(self)
    }

    /// Checks addresses and URLs and normalizes the origin allow-list.
    pub fn validated(mut self) -> Result<Self, Error> {
        self.host
            .parse::<IpAddr>()
            .with_context(|| format!("Invalid host address: {}", self.host))?;
        Url::parse(&self.openai_base_url)
            .with_context(|| format!("Invalid OpenAI base URL: {}", self.openai_base_url))?;
        if self.rate_limit_window_secs == 0 {
            return Err(anyhow!("rate_limit_window_secs must be greater than zero"));
        }
        if self.upstream_timeout_secs == 0 {
            return Err(anyhow!("upstream_timeout_secs must be greater than zero"));
        }
        self.allowed_origins = self
            .allowed_origins
            .iter()
            .map(|origin| normalize_origin(origin))
            .collect::<Result<_, _>>()?;
        if self.openai_api_key.as_deref().is_some_and(str::is_empty) {
            self.openai_api_key = None;
        }
        Ok(self)
    }

    pub fn api_key(&self) -> Option<&str> {
        self.openai_api_key.as_deref().filter(|k| !k.is_empty())
    }

    pub fn addr(&self) -> Result<SocketAddr, Error> {
        let ip: IpAddr = self
            .host
            .parse()
            .with_context(|| format!("Invalid host address: {}", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    /// TOML rendering with the API key masked.
    pub fn to_masked_toml(&self) -> Result<String, Error> {
        let mut shown = self.clone();
        shown.openai_api_key = shown.openai_api_key.as_deref().map(mask_key);
        Ok(toml::to_string_pretty(&shown)?)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "openai_api_key" => self.api_key().map(mask_key),
            "host" => Some(self.host.clone()),
            "port" => Some(self.port.to_string()),
            "openai_base_url" => Some(self.openai_base_url.clone()),
            "model" => Some(self.model.clone()),
            "allowed_origins" => Some(self.allowed_origins.join(",")),
            "rate_limit_window_secs" => Some(self.rate_limit_window_secs.to_string()),
            "rate_limit_max" => Some(self.rate_limit_max.to_string()),
            "upstream_timeout_secs" => Some(self.upstream_timeout_secs.to_string()),
            _ => None,
        }
    }
}

/// Variables from a `.env` file: `path`, or the nearest one found from the
/// working directory upwards. A missing file yields nothing. The process
/// environment is left untouched.
pub fn read_dotenv(path: Option<&Path>) -> Result<HashMap<String, String>, Error> {
    let iter = match path {
        Some(path) => dotenvy::from_path_iter(path),
        None => dotenvy::dotenv_iter(),
    };
    let iter = match iter {
        Ok(iter) => iter,
        Err(e) if e.not_found() => return Ok(HashMap::new()),
        Err(e) => return Err(Error::new(e).context("Failed to open .env file")),
    };
    let vars = iter
        .collect::<Result<HashMap<_, _>, _>>()
        .context("Failed to parse .env file")?;
    debug!("Read {} variables from .env", vars.len());
    Ok(vars)
}

/// Process environment first, `.env` values for anything it does not set.
fn layered_env(dotenv: HashMap<String, String>) -> impl Fn(&str) -> Option<String> {
    move |key| env::var(key).ok().or_else(|| dotenv.get(key).cloned())
}

fn parse_var<T>(name: &str, value: &str) -> Result<T, Error>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for {}: {}", name, value))
}

/// `scheme://host[:port]`, the form browsers send in the `Origin` header.
fn normalize_origin(origin: &str) -> Result<String, Error> {
    let url = Url::parse(origin.trim()).with_context(|| format!("Invalid origin: {}", origin))?;
    let origin = url.origin();
    if !origin.is_tuple() {
        return Err(anyhow!("Origin has no host: {}", url));
    }
    Ok(origin.ascii_serialization())
}

fn mask_key(key: &str) -> String {
    let tail: String = key
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("****{}", tail)
}
