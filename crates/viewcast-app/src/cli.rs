use clap::Parser;

/// Viewcast — watch a livestream's live viewer count from the terminal.
#[derive(Parser, Debug)]
#[command(name = "viewcast", version, about)]
pub struct Args {
    /// Livestream id to observe.
    pub livestream_id: String,

    /// Config file path override.
    #[arg(long)]
    pub config: Option<String>,

    /// Access token override (skips the configured token file).
    #[arg(long)]
    pub token: Option<String>,

    /// Log level override (debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

pub fn parse() -> Args {
    Args::parse()
}
