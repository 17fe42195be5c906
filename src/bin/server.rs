//! fileserve binary

use clap::Parser;
use fileserve::http::{DEFAULT_CAPACITY, DEFAULT_THREADS};
use fileserve::{CancellationToken, ServerBuilder, signal};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Serve the files in a directory over HTTP/1.0
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Directory to serve
    directory: PathBuf,

    /// Port to listen on
    port: u16,

    /// Interface to bind
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Number of worker threads
    #[arg(long, default_value_t = DEFAULT_THREADS)]
    threads: usize,

    /// Accepted connections buffered for the workers
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    capacity: usize,
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let server = match ServerBuilder::new(&args.directory)
        .host(args.bind)
        .port(args.port)
        .threads(args.threads)
        .capacity(args.capacity)
        .build()
    {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "failed to start server");
            return ExitCode::FAILURE;
        }
    };

    let cancel = CancellationToken::new();
    let interrupts = match signal::spawn_interrupt_listener(cancel.clone()) {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!(error = %e, "failed to install interrupt handler");
            return ExitCode::FAILURE;
        }
    };

    let result = server.run(cancel.clone());

    // release the listener thread if the server stopped on its own
    signal::stop_interrupt_listener(&cancel, interrupts);

    match result {
        Ok(stats) => {
            tracing::info!(handled = stats.handled, failed = stats.failed, "bye");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "server failed");
            ExitCode::FAILURE
        }
    }
}
