//! `spectrum` entry point.

use clap::Parser;
use spectrum_cli::Cli;

#[tokio::main]
async fn main() {
    // Logs go to stderr so that JSON on stdout stays machine readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!("spectrum v{} starting", env!("CARGO_PKG_VERSION"));
    std::process::exit(cli.run().await);
}
