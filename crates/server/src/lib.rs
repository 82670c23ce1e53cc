//! # Habitus Server
//!
//! HTTP inference server for user behavior classification. Loads a
//! pre-fitted classifier and feature scaler at startup and serves a single
//! prediction endpoint that maps a device-usage record to a behavior-class
//! label.
//!
//! ## Features
//!
//! - Startup loading of fitted artifact files (classifier + scaler)
//! - Request validation with precise, field-naming error messages
//! - Hard-coded binary gender encoding matching the fitted model
//! - Health and metrics endpoints for monitoring

pub mod artifacts;
pub mod cli_options;
pub mod config;
pub mod features;
pub mod pipeline;
pub mod server;

pub use artifacts::{Artifacts, BehaviorClassifier, FeatureScaler};
pub use cli_options::ServerCliOptions;
pub use config::ServerConfig;
pub use pipeline::PredictionPipeline;
pub use server::PredictionServer;
