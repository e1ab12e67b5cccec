use std::path::PathBuf;

use clap::Parser;

/// Parley: a real-time publish/subscribe hub over WebSockets.
#[derive(Parser, Debug)]
#[command(name = "parley", version, about)]
pub struct Args {
    /// Config file path. Defaults to the platform config directory.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Interface to bind, overriding `server.host`.
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on, overriding `server.port`.
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Log level override (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Print the effective configuration as JSON and exit.
    #[arg(long)]
    pub print_config: bool,
}

pub fn parse() -> Args {
    Args::parse()
}
