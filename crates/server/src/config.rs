//! Server configuration management
//!
//! ## Configuration Sources (precedence order)
//!
//! 1. Command line arguments (highest priority)
//! 2. Environment variables (HABITUS_*)
//! 3. Compiled defaults (lowest priority)

use habitus_shared::{HabitusError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{debug, info};

/// Default port the service listens on when nothing else is configured
pub const DEFAULT_PORT: u16 = 5000;

/// Configuration for the prediction server
///
/// All fields are validated during construction so the server can start
/// without surprises. Configuration is immutable after validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Address to bind the HTTP server to
    ///
    /// **Default**: `0.0.0.0:5000` (all interfaces, fixed default port)
    /// **Environment**: `HABITUS_LISTEN_ADDR`, or `HABITUS_PORT` to change
    /// only the port
    pub listen_addr: SocketAddr,

    /// Path to the fitted classifier parameter file
    ///
    /// **Default**: `model.json`
    /// **Environment**: `HABITUS_MODEL_PATH`
    pub model_path: PathBuf,

    /// Path to the fitted feature scaler parameter file
    ///
    /// **Default**: `scaler.json`
    /// **Environment**: `HABITUS_SCALER_PATH`
    pub scaler_path: PathBuf,

    /// Logging verbosity level
    ///
    /// **Default**: `"info"`
    /// **Environment**: `HABITUS_LOG_LEVEL`
    /// **Validation**: one of "error", "warn", "info", "debug", "trace"
    pub log_level: String,

    /// Enable metrics collection
    ///
    /// **Default**: `true`
    /// **Environment**: `HABITUS_ENABLE_METRICS`
    pub enable_metrics: bool,

    /// Service name reported in the metrics endpoint
    ///
    /// **Default**: `"habitus-server"`
    /// **Environment**: `HABITUS_SERVICE_NAME`
    pub service_name: String,
}

impl Default for ServerConfig {
    /// Creates a default configuration matching the original service
    /// contract: bind all interfaces on port 5000, artifacts read from the
    /// working directory.
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            model_path: PathBuf::from("model.json"),
            scaler_path: PathBuf::from("scaler.json"),
            log_level: "info".to_string(),
            enable_metrics: true,
            service_name: "habitus-server".to_string(),
        }
    }
}

impl ServerConfig {
    /// Creates a new configuration with validation
    ///
    /// # Validation Rules
    ///
    /// 1. Artifact paths must be non-empty
    /// 2. Log level must be valid
    pub fn new(config: ServerConfig) -> Result<Self> {
        if config.model_path.as_os_str().is_empty() {
            return Err(HabitusError::configuration(
                "model_path cannot be empty",
                None,
            ));
        }

        if config.scaler_path.as_os_str().is_empty() {
            return Err(HabitusError::configuration(
                "scaler_path cannot be empty",
                None,
            ));
        }

        match config.log_level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            _ => {
                return Err(HabitusError::configuration(
                    format!(
                        "invalid log_level '{}', must be one of: error, warn, info, debug, trace",
                        config.log_level
                    ),
                    None,
                ));
            }
        }

        info!(
            listen_addr = %config.listen_addr,
            model_path = ?config.model_path,
            scaler_path = ?config.scaler_path,
            metrics_enabled = config.enable_metrics,
            "Configuration validation successful"
        );

        Ok(config)
    }

    /// Loads configuration from environment variables
    ///
    /// Reads values from `HABITUS_*` variables, falling back to defaults
    /// for unset variables. `HABITUS_LISTEN_ADDR` overrides the full socket
    /// address; `HABITUS_PORT` changes only the port on the default
    /// all-interfaces bind.
    ///
    /// # Environment Variables
    ///
    /// - `HABITUS_LISTEN_ADDR` - Full listen address
    /// - `HABITUS_PORT` - Listen port (default 5000)
    /// - `HABITUS_MODEL_PATH` - Classifier parameter file
    /// - `HABITUS_SCALER_PATH` - Scaler parameter file
    /// - `HABITUS_LOG_LEVEL` - Logging verbosity
    /// - `HABITUS_ENABLE_METRICS` - Metrics toggle
    /// - `HABITUS_SERVICE_NAME` - Service name
    pub fn from_env() -> Result<Self> {
        debug!("Loading configuration from environment variables");

        let mut config = Self::default();

        if let Ok(port_str) = std::env::var("HABITUS_PORT") {
            let port: u16 = port_str.parse().map_err(|e| {
                HabitusError::configuration(format!("Invalid HABITUS_PORT: {}", e), None)
            })?;
            config.listen_addr.set_port(port);
        }

        // Full address override wins over HABITUS_PORT
        if let Ok(addr) = std::env::var("HABITUS_LISTEN_ADDR") {
            config.listen_addr = addr.parse().map_err(|e| {
                HabitusError::configuration(format!("Invalid HABITUS_LISTEN_ADDR: {}", e), None)
            })?;
        }

        if let Ok(model_path) = std::env::var("HABITUS_MODEL_PATH") {
            config.model_path = PathBuf::from(model_path);
        }

        if let Ok(scaler_path) = std::env::var("HABITUS_SCALER_PATH") {
            config.scaler_path = PathBuf::from(scaler_path);
        }

        if let Ok(log_level) = std::env::var("HABITUS_LOG_LEVEL") {
            config.log_level = log_level;
        }

        if let Ok(metrics_str) = std::env::var("HABITUS_ENABLE_METRICS") {
            config.enable_metrics = metrics_str.parse().map_err(|e| {
                HabitusError::configuration(format!("Invalid HABITUS_ENABLE_METRICS: {}", e), None)
            })?;
        }

        if let Ok(service_name) = std::env::var("HABITUS_SERVICE_NAME") {
            config.service_name = service_name;
        }

        Self::new(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.listen_addr.port(), DEFAULT_PORT);
        assert!(config.listen_addr.ip().is_unspecified());
        assert_eq!(config.model_path, PathBuf::from("model.json"));
        assert_eq!(config.scaler_path, PathBuf::from("scaler.json"));
        assert_eq!(config.log_level, "info");
        assert!(config.enable_metrics);
    }

    #[test]
    fn test_config_validation_success() {
        let config = ServerConfig::default();
        assert!(ServerConfig::new(config).is_ok());
    }

    #[test]
    fn test_config_validation_empty_model_path() {
        let config = ServerConfig {
            model_path: PathBuf::new(),
            ..Default::default()
        };

        let result = ServerConfig::new(config);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("model_path cannot be empty"));
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let config = ServerConfig {
            log_level: "verbose".to_string(),
            ..Default::default()
        };

        let result = ServerConfig::new(config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("invalid log_level"));
    }
}
