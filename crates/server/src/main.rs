//! # Habitus Server - Main Entry Point
//!
//! HTTP inference server predicting user behavior classes from
//! device-usage metrics.

use clap::Parser;
use habitus_server::ServerCliOptions;
use habitus_shared::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line options
    let cli_opts = ServerCliOptions::parse();

    // Initialize logging with the specified level
    cli_opts.logging.init_logging();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Habitus prediction server"
    );

    // Run the server with the parsed options
    cli_opts.run().await
}
