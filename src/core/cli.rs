use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "mail-proxy")]
#[command(about = "Fetches messages from remote mailbox accounts and persists them locally", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build the proxy from a configuration file and process its sources
    Run {
        /// Path to the JSON configuration file
        #[arg(short, long, value_name = "FILE")]
        config: String,

        /// Proxy name used in logs and aggregated errors
        #[arg(long, default_value = "proxy")]
        name: String,

        /// Process only the source with this name
        #[arg(long)]
        source: Option<String>,
    },
    /// Validate a configuration file and print a summary without connecting
    Check {
        /// Path to the JSON configuration file
        #[arg(short, long, value_name = "FILE")]
        config: String,
    },
}
