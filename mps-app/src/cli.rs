use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mps-panel")]
#[command(about = "Status panel for configured social web services")]
#[command(version)]
pub struct Cli {
    /// Configuration file (YAML); missing files fall back to defaults
    #[arg(short, long, default_value = "mps.yaml", env = "MPS_CONFIG")]
    pub config: PathBuf,

    /// Start with connectivity reported as offline
    #[arg(long)]
    pub offline: bool,

    /// Print the panel state as JSON once it settles, without a terminal UI
    #[arg(long)]
    pub dump: bool,

    /// How long `--dump` waits for services to settle, in milliseconds
    #[arg(long, default_value_t = 200)]
    pub settle_ms: u64,
}
