//! unirepack - NuGet to UPM repackager CLI

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use unirepack_cli::Cli;
use unirepack_cli::reporter::ConsoleReporter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = cli.log_level();
        EnvFilter::new(format!(
            "unirepack={level},unirepack_cli={level},unirepack_core={level}"
        ))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted, cancelling...");
            on_signal.cancel();
        }
    });

    let reporter = Arc::new(ConsoleReporter);
    unirepack_cli::execute(&cli, reporter, cancel).await?;
    Ok(())
}
