use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use keyhold::cli::{self, Cli};

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays clean for command output. The log
    // layer never receives secret material; see tests/secret_hygiene.rs.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    cli::run(Cli::parse())
}
