use clap::Parser;
use tracing_subscriber::EnvFilter;

use palisade::cli::{self, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Reports go to stdout; diagnostics stay on stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("palisade=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    std::process::exit(cli::run(cli).await);
}
