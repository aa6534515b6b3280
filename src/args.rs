use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about = r###"
chat-relay sits between a browser chat client and an OpenAI-compatible
completion API. It keeps the API key on the server, adds a fixed system
instruction to each conversation, and hands back either the assistant's
reply (POST /chat) or a short conversation title (POST /summarize).

Requests are only accepted from allow-listed origins and are rate limited
per client address.
"###
)]
pub struct Args {
    /// Path to a relay.toml. Defaults to the user config directory.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub subcmd: Option<SubCommands>,
}

#[derive(Parser, Debug)]
pub enum SubCommands {
    /// Start the relay server (the default).
    Start(StartSubCommand),
    /// Print the effective configuration.
    Config(ConfigSubCommand),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Start the relay server", long_about = None)]
pub struct StartSubCommand {
    /// Override the listen port.
    #[arg(short, long)]
    pub port: Option<u16>,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Show configuration values", long_about = None)]
pub struct ConfigSubCommand {
    /// Print a single value, e.g. `chat-relay config --get port`
    #[arg(short, long)]
    pub get: Option<String>,
}
