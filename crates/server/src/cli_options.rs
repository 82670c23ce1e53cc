//! CLI options for the Habitus prediction server
//!
//! Defines the command-line interface for the server binary. CLI flags
//! take precedence over `HABITUS_*` environment variables, which in turn
//! override compiled defaults.

use crate::artifacts::Artifacts;
use crate::config::{ServerConfig, DEFAULT_PORT};
use crate::server::PredictionServer;
use clap::Parser;
use habitus_shared::{LoggingOptions, MetricsOptions, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Habitus - user behavior prediction server
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ServerCliOptions {
    /// Full address to listen on (overrides --port)
    #[arg(short, long, env = "HABITUS_LISTEN_ADDR")]
    pub listen_addr: Option<SocketAddr>,

    /// Port to listen on, bound to all interfaces
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "HABITUS_PORT")]
    pub port: u16,

    /// Path to the fitted classifier parameter file
    #[arg(short, long, default_value = "model.json", env = "HABITUS_MODEL_PATH")]
    pub model_path: PathBuf,

    /// Path to the fitted feature scaler parameter file
    #[arg(short, long, default_value = "scaler.json", env = "HABITUS_SCALER_PATH")]
    pub scaler_path: PathBuf,

    /// Service name reported in the metrics endpoint
    #[arg(long, default_value = "habitus-server", env = "HABITUS_SERVICE_NAME")]
    pub service_name: String,

    #[command(flatten)]
    pub logging: LoggingOptions,

    #[command(flatten)]
    pub metrics: MetricsOptions,
}

impl ServerCliOptions {
    /// Run the prediction server with the configured options
    ///
    /// Loads the fitted artifacts, then starts the HTTP server. A failed
    /// artifact load does not abort startup: the error is logged and the
    /// server runs in degraded mode, rejecting every prediction request
    /// until it is restarted with valid artifact files.
    pub async fn run(self) -> Result<()> {
        let config = self.to_config()?;

        info!(
            listen_addr = %config.listen_addr,
            model_path = ?config.model_path,
            scaler_path = ?config.scaler_path,
            "Prediction server starting"
        );

        let artifacts = match Artifacts::load(&config.model_path, &config.scaler_path) {
            Ok(artifacts) => Some(Arc::new(artifacts)),
            Err(e) => {
                error!(error = %e, "Failed to load fitted artifacts; serving in degraded mode");
                None
            }
        };

        let server = PredictionServer::new(config, artifacts)?;
        server.start().await
    }

    /// Convert CLI options to a validated ServerConfig
    fn to_config(&self) -> Result<ServerConfig> {
        let listen_addr = self
            .listen_addr
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], self.port)));

        ServerConfig::new(ServerConfig {
            listen_addr,
            model_path: self.model_path.clone(),
            scaler_path: self.scaler_path.clone(),
            log_level: self.logging.log_level.clone(),
            enable_metrics: self.metrics.enable_metrics,
            service_name: self.service_name.clone(),
        })
    }
}
