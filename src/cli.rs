use clap::Parser;
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 18080;

#[derive(Debug, Parser)]
#[command(
    name = "clawdash",
    about = "Web dashboard for running and configuring the picoclaw gateway",
    version
)]
pub struct Cli {
    /// Port for the dashboard web server
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Gateway binary (default: ./build/picoclaw, ./picoclaw, then PATH)
    #[arg(long, env = "CLAWDASH_BINARY")]
    pub binary: Option<PathBuf>,

    /// Gateway config file (default: ~/.picoclaw/config.json)
    #[arg(long, env = "CLAWDASH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Don't open the dashboard in a browser
    #[arg(long)]
    pub no_open: bool,
}
