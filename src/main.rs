use anyhow::Error;
use clap::Parser;

use args::{Args, SubCommands};
use config::RelayConfig;

mod args;
mod clients;
mod commands;
mod config;
mod error;
mod handler;
mod models;
mod pipeline;
mod state;
#[cfg(test)]
mod test_support;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "chat_relay=info".to_string()),
        )
        .init();
    let args = Args::parse();
    let config = RelayConfig::load(args.config.as_deref())?;
    match args.subcmd {
        Some(SubCommands::Start(start)) => commands::start::run(config, start.port).await?,
        Some(SubCommands::Config(config_cmd)) => commands::config::run(&config, &config_cmd)?,
        None => commands::start::run(config, None).await?,
    };
    Ok(())
}
