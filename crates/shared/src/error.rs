//! # Shared Error Handling Module
//!
//! Error types for the Habitus prediction service with proper
//! classification, context preservation, and HTTP status mapping.
//!
//! ## Error Categories
//!
//! - **Configuration Errors**: Invalid service configuration at startup
//! - **Request Validation Errors**: Malformed or incomplete prediction input
//! - **Artifact Errors**: Classifier/scaler missing or corrupt
//! - **Network Errors**: Socket binding and transport failures
//! - **Internal Errors**: Unexpected failures during request processing

use std::net::AddrParseError;
use thiserror::Error;
use tracing::warn;

/// Result type alias for Habitus operations
///
/// This is the standard Result type used throughout the Habitus codebase.
/// It provides a consistent interface for error handling and makes
/// error propagation more ergonomic.
pub type Result<T> = std::result::Result<T, HabitusError>;

/// Message returned to clients when the fitted artifacts are missing
const ARTIFACT_UNAVAILABLE_MESSAGE: &str = "Model or scaler not loaded. Check server logs.";

/// Generic message returned to clients for unexpected failures.
/// Internal detail is logged server-side and never leaks into responses.
const INTERNAL_ERROR_MESSAGE: &str = "An error occurred during prediction.";

/// Error types for Habitus prediction service operations
///
/// Each variant includes relevant context and maps to a well-defined HTTP
/// status code. Validation errors carry the precise reason shown to the
/// caller; everything else degrades to a generic client message.
#[derive(Error, Debug)]
pub enum HabitusError {
    /// Configuration validation errors
    ///
    /// Raised during startup when the provided configuration is invalid.
    /// The service refuses to start until the configuration is corrected.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// Optional source error for additional context
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Request validation errors
    ///
    /// Raised when an incoming prediction request fails validation:
    /// unparsable JSON, a missing required feature, or an invalid
    /// categorical value. Always recoverable by the caller resubmitting a
    /// corrected request.
    ///
    /// **HTTP Status Mapping**: 400 Bad Request
    #[error("Request validation failed: {reason}")]
    RequestValidation {
        /// Reason for validation failure, named precisely for the caller
        reason: String,
    },

    /// Fitted artifacts missing or corrupt
    ///
    /// Raised when the classifier or scaler failed to load at startup.
    /// Every prediction request fails with this error until the process is
    /// restarted with valid artifact files.
    ///
    /// **HTTP Status Mapping**: 500 Internal Server Error
    #[error("Artifacts unavailable: {reason}")]
    ArtifactUnavailable {
        /// Why the artifacts could not be loaded
        reason: String,
    },

    /// Network-level failures
    ///
    /// Raised when the server cannot bind its listen address or the
    /// transport fails while serving.
    ///
    /// **HTTP Status Mapping**: 502 Bad Gateway
    #[error("Network error on {target}: {message}")]
    Network {
        /// Address involved in the failure
        target: String,
        /// Descriptive error message
        message: String,
        /// Underlying network error for debugging
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal system errors
    ///
    /// Unexpected failures that shouldn't occur during normal operation.
    /// Logged server-side; clients receive a generic message only.
    ///
    /// **HTTP Status Mapping**: 500 Internal Server Error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal failure
        message: String,
        /// Source error for debugging
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl HabitusError {
    /// Creates a configuration error with context
    ///
    /// # Examples
    ///
    /// ```rust
    /// use habitus_shared::error::HabitusError;
    ///
    /// let error = HabitusError::configuration("Invalid listen address", None);
    /// ```
    pub fn configuration(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Configuration {
            message: message.into(),
            source,
        }
    }

    /// Creates a request validation error
    ///
    /// The reason is shown verbatim to the caller, so it must name the
    /// offending field where possible and contain no internal detail.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use habitus_shared::error::HabitusError;
    ///
    /// let error = HabitusError::request_validation("Missing feature: gender");
    /// assert_eq!(error.to_http_status(), 400);
    /// ```
    pub fn request_validation(reason: impl Into<String>) -> Self {
        Self::RequestValidation {
            reason: reason.into(),
        }
    }

    /// Creates an artifact-unavailable error
    ///
    /// # Examples
    ///
    /// ```rust
    /// use habitus_shared::error::HabitusError;
    ///
    /// let error = HabitusError::artifact_unavailable("model.json not found");
    /// assert_eq!(error.to_http_status(), 500);
    /// ```
    pub fn artifact_unavailable(reason: impl Into<String>) -> Self {
        Self::ArtifactUnavailable {
            reason: reason.into(),
        }
    }

    /// Creates a network error with target and context
    pub fn network(
        target: impl Into<String>,
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Network {
            target: target.into(),
            message: message.into(),
            source,
        }
    }

    /// Creates an internal error with source context
    pub fn internal(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source,
        }
    }

    /// Maps this error to an appropriate HTTP status code
    ///
    /// # Status Code Mapping
    ///
    /// - Request validation: 400 Bad Request
    /// - Artifact unavailable: 500 Internal Server Error (the external
    ///   contract reports a missing model as a server-side failure)
    /// - Network errors: 502 Bad Gateway
    /// - Internal errors: 500 Internal Server Error
    /// - Configuration errors: 500 (should never reach the HTTP layer)
    pub fn to_http_status(&self) -> u16 {
        match self {
            HabitusError::Configuration { .. } => {
                // Configuration errors shouldn't reach the HTTP layer
                warn!("Configuration error reached HTTP status mapping");
                500
            }
            HabitusError::RequestValidation { .. } => 400,
            HabitusError::ArtifactUnavailable { .. } => 500,
            HabitusError::Network { .. } => 502,
            HabitusError::Internal { .. } => 500,
        }
    }

    /// Returns the message shown to the HTTP client for this error
    ///
    /// Validation failures are reported precisely (naming the offending
    /// field). Missing artifacts get a fixed operator-facing hint. All
    /// other failures degrade to a generic message so internal detail
    /// never leaks to callers.
    pub fn client_message(&self) -> &str {
        match self {
            HabitusError::RequestValidation { reason } => reason,
            HabitusError::ArtifactUnavailable { .. } => ARTIFACT_UNAVAILABLE_MESSAGE,
            _ => INTERNAL_ERROR_MESSAGE,
        }
    }

    /// Checks if this error represents a temporary condition
    ///
    /// Validation and artifact errors are permanent: the former need a
    /// corrected request, the latter a restart with valid artifact files.
    pub fn is_temporary(&self) -> bool {
        match self {
            HabitusError::Configuration { .. } => false,
            HabitusError::RequestValidation { .. } => false,
            HabitusError::ArtifactUnavailable { .. } => false,
            HabitusError::Network { .. } => true,
            HabitusError::Internal { .. } => false,
        }
    }
}

/// Conversion from address parsing errors
///
/// Makes error handling more ergonomic when parsing listen addresses in
/// configuration.
impl From<AddrParseError> for HabitusError {
    fn from(err: AddrParseError) -> Self {
        HabitusError::configuration(
            format!("Invalid network address: {}", err),
            Some(Box::new(err)),
        )
    }
}

/// Conversion from I/O errors
impl From<std::io::Error> for HabitusError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::ConnectionReset => {
                HabitusError::network("unknown", "Connection failed", Some(Box::new(err)))
            }
            _ => HabitusError::internal("I/O error", Some(Box::new(err))),
        }
    }
}
