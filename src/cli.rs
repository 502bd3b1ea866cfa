use clap::{Parser, Subcommand};

/// onetimeshare — share a secret that can be read exactly once
#[derive(Parser)]
#[command(name = "onetimeshare", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve {
        /// Port to bind (overrides OTS_PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Use a JSON file as storage instead of the default SQLite database
        #[arg(long)]
        json: bool,
    },

    /// Print a freshly generated encryption key for OTS_ENCRYPTION_KEY
    Keygen,
}
