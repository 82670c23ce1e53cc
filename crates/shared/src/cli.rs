//! Shared CLI functionality for Habitus binaries
//!
//! Common CLI options that are flattened into the server's command-line
//! interface to keep flags and environment variables consistent.

use clap::Args;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Common logging options
#[derive(Args, Debug, Clone)]
pub struct LoggingOptions {
    /// Logging level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", env = "HABITUS_LOG_LEVEL")]
    pub log_level: String,
}

/// Common metrics options
#[derive(Args, Debug, Clone)]
pub struct MetricsOptions {
    /// Enable metrics collection
    #[arg(long, default_value_t = true, env = "HABITUS_ENABLE_METRICS")]
    pub enable_metrics: bool,
}

impl LoggingOptions {
    /// Initialize logging with the configured level
    pub fn init_logging(&self) {
        let level = self.parse_log_level();

        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(true)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .expect("Failed to set logging subscriber");
    }

    /// Parse the log level string into a tracing Level
    pub fn parse_log_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "error" => Level::ERROR,
            "warn" => Level::WARN,
            "info" => Level::INFO,
            "debug" => Level::DEBUG,
            "trace" => Level::TRACE,
            _ => Level::INFO,
        }
    }
}
