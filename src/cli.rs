use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// haos-agent - privileged system agent for the host management process
#[derive(Parser, Debug)]
#[command(name = "haos-agent")]
#[command(about = "Expose device wipe, SSH key and kernel module operations over D-Bus")]
#[command(version)]
pub struct Cli {
    /// JSON configuration file overriding the built-in defaults
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Serve on the session bus instead of the system bus
    #[arg(long, global = true)]
    pub session: bool,

    /// Skip the root and binary pre-flight checks
    #[arg(long, global = true)]
    pub skip_preflight: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the agent until SIGINT/SIGTERM/SIGHUP (default)
    Serve,
    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        config: PathBuf,
    },
    /// Print the effective configuration and the live kernel module state
    Status,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
