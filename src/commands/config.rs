use anyhow::{anyhow, Error};

use crate::args::ConfigSubCommand;
use crate::config::RelayConfig;

pub fn execute(config: &RelayConfig, cmd: &ConfigSubCommand) -> Result<String, Error> {
    match &cmd.get {
        Some(key) => match config.get(key) {
            Some(value) => Ok(value),
            None if key == "openai_api_key" => Ok(String::new()),
            None => Err(anyhow!("Unknown configuration key: {}", key)),
        },
        None => config.to_masked_toml(),
    }
}

pub fn run(config: &RelayConfig, cmd: &ConfigSubCommand) -> Result<(), Error> {
    println!("{}", execute(config, cmd)?);
    Ok(())
}
