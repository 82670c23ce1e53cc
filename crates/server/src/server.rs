//! # Prediction HTTP Server
//!
//! HTTP server exposing the prediction pipeline plus operational
//! endpoints.
//!
//! ## Endpoints
//!
//! - `GET /`: Static JSON service description with an example input
//! - `POST /predict`: Runs the prediction pipeline on the request body
//! - `GET /health`: Simple health check endpoint
//! - `GET /metrics`: Returns service vitals JSON for monitoring
//!
//! Requests are handled independently and synchronously to completion;
//! the pipeline and metrics collector are shared read-only across all
//! connections. A malformed request can never terminate the process:
//! every pipeline failure is mapped to a JSON error response.

use crate::artifacts::Artifacts;
use crate::config::ServerConfig;
use crate::pipeline::PredictionPipeline;
use habitus_shared::{HabitusError, MetricsCollector, Result};
use http::{Method, StatusCode};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server};
use serde::Serialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{debug, error, info, instrument, warn};

/// HTTP server for the Habitus prediction service
///
/// Owns the validated configuration, the metrics collector, and the
/// prediction pipeline built from the artifacts loaded at startup. The
/// pipeline state is immutable for the life of the process: a server that
/// started without artifacts serves every prediction request a 500 until
/// restarted.
pub struct PredictionServer {
    /// Validated server configuration
    config: Arc<ServerConfig>,
    /// Shared metrics collector for observability
    metrics: Arc<MetricsCollector>,
    /// Prediction pipeline over the loaded artifacts
    pipeline: Arc<PredictionPipeline>,
    /// Shutdown signal sender
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl PredictionServer {
    /// Creates a new server instance with validated configuration
    ///
    /// # Arguments
    ///
    /// * `config` - Server configuration (validated on construction)
    /// * `artifacts` - The artifact set loaded at startup, or `None` to
    ///   serve in degraded mode
    ///
    /// # Examples
    ///
    /// ```rust
    /// use habitus_server::{PredictionServer, ServerConfig};
    ///
    /// let server = PredictionServer::new(ServerConfig::default(), None).unwrap();
    /// assert!(!server.is_ready());
    /// ```
    pub fn new(config: ServerConfig, artifacts: Option<Arc<Artifacts>>) -> Result<Self> {
        let config = Arc::new(ServerConfig::new(config)?);
        let pipeline = Arc::new(PredictionPipeline::new(artifacts));

        info!(
            listen_addr = %config.listen_addr,
            artifacts_loaded = pipeline.ready(),
            "Prediction server initialized"
        );

        Ok(Self {
            config,
            metrics: Arc::new(MetricsCollector::new()),
            pipeline,
            shutdown_tx: None,
        })
    }

    /// Returns a reference to the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns a reference to the server's metrics collector
    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Whether the fitted artifacts are loaded and predictions can succeed
    pub fn is_ready(&self) -> bool {
        self.pipeline.ready()
    }

    /// Returns the configured listen address
    pub fn listen_addr(&self) -> SocketAddr {
        self.config.listen_addr
    }

    /// Starts the HTTP server
    ///
    /// Binds to the configured address and serves requests until a
    /// shutdown signal (internal oneshot or ctrl-c) is received. Blocks
    /// the current async task; spawn separately for non-blocking use.
    ///
    /// # Error Conditions
    ///
    /// - Address already in use (port conflict)
    /// - Permission denied for privileged ports
    /// - Transport failure while serving
    #[instrument(skip(self))]
    pub async fn start(mut self) -> Result<()> {
        info!(
            listen_addr = %self.config.listen_addr,
            service_name = %self.config.service_name,
            "Starting prediction HTTP server"
        );

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        self.shutdown_tx = Some(shutdown_tx);

        if !self.pipeline.ready() {
            warn!("Artifacts are not loaded; every prediction request will fail until restart");
        }

        // Clone shared state for the service closure
        let pipeline = Arc::clone(&self.pipeline);
        let metrics = Arc::clone(&self.metrics);
        let service_name = self.config.service_name.clone();
        let version = env!("CARGO_PKG_VERSION").to_string();
        let enable_metrics = self.config.enable_metrics;

        let make_svc = make_service_fn(move |_conn| {
            let pipeline = Arc::clone(&pipeline);
            let metrics = Arc::clone(&metrics);
            let service_name = service_name.clone();
            let version = version.clone();

            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    handle_request(
                        req,
                        Arc::clone(&pipeline),
                        Arc::clone(&metrics),
                        service_name.clone(),
                        version.clone(),
                        enable_metrics,
                    )
                }))
            }
        });

        let server = match Server::try_bind(&self.config.listen_addr) {
            Ok(builder) => builder.serve(make_svc).with_graceful_shutdown(async {
                tokio::select! {
                    _ = shutdown_rx => {
                        info!("Shutdown signal received");
                    }
                    _ = signal::ctrl_c() => {
                        info!("Interrupt signal received, shutting down");
                    }
                }
            }),
            Err(e) => {
                error!(error = %e, listen_addr = %self.config.listen_addr, "Failed to bind to address");
                return Err(HabitusError::network(
                    self.config.listen_addr.to_string(),
                    "Failed to bind to address",
                    Some(Box::new(e)),
                ));
            }
        };

        info!(
            listen_addr = %self.config.listen_addr,
            "Prediction HTTP server listening"
        );

        if let Err(e) = server.await {
            error!(error = %e, "HTTP server error");
            return Err(HabitusError::network(
                self.config.listen_addr.to_string(),
                "HTTP server error",
                Some(Box::new(e)),
            ));
        }

        info!("Prediction HTTP server shut down");
        Ok(())
    }

    /// Initiates graceful shutdown of a running server
    ///
    /// Signals the server to stop accepting new connections and drain
    /// existing ones.
    pub async fn shutdown(&mut self) -> Result<()> {
        info!("Initiating server shutdown");

        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            shutdown_tx
                .send(())
                .map_err(|_| HabitusError::internal("Failed to send shutdown signal", None))?;
            Ok(())
        } else {
            Err(HabitusError::internal("Server is not running", None))
        }
    }
}

impl std::fmt::Debug for PredictionServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionServer")
            .field("listen_addr", &self.config.listen_addr)
            .field("service_name", &self.config.service_name)
            .field("ready", &self.pipeline.ready())
            .finish_non_exhaustive()
    }
}

/// Service vitals reported by the `/metrics` endpoint
#[derive(Debug, Serialize)]
struct ServiceVitals {
    /// Whether the fitted artifacts are loaded
    ready: bool,
    /// Service name from configuration
    service: String,
    /// Crate version
    version: String,
    /// Requests currently in flight
    active_requests: usize,
    /// Total requests received since startup
    total_requests: u64,
    /// Error rate in percent, absent until the first request
    error_rate: Option<f64>,
    /// Human-readable uptime summary
    status_message: String,
}

/// Routes an incoming HTTP request to the appropriate handler
///
/// Every branch produces a response; processing failures are mapped to
/// JSON error bodies so the connection task never propagates an error.
#[instrument(skip_all, fields(method = ?req.method(), path = req.uri().path()))]
async fn handle_request(
    req: Request<Body>,
    pipeline: Arc<PredictionPipeline>,
    metrics: Arc<MetricsCollector>,
    service_name: String,
    version: String,
    enable_metrics: bool,
) -> std::result::Result<Response<Body>, Infallible> {
    let start_time = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    if enable_metrics {
        metrics.record_request();
    }

    let response = match (&method, path.as_str()) {
        (&Method::GET, "/") => handle_home_request(),
        (&Method::POST, "/predict") => handle_predict_request(req, pipeline.as_ref()).await,
        (&Method::GET, "/health") => handle_health_request(),
        (&Method::GET, "/metrics") if enable_metrics => {
            handle_vitals_request(&metrics, &pipeline, &service_name, &version)
        }
        _ => {
            warn!(
                method = %method,
                path = %path,
                "Request to unknown endpoint"
            );
            json_error_response(StatusCode::NOT_FOUND, "Not Found")
        }
    };

    if enable_metrics {
        metrics.record_response(response.status().as_u16());
        metrics.record_request_duration(start_time.elapsed());
    }

    debug!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        "Request completed"
    );

    Ok(response)
}

/// Handles the `GET /` service description request
fn handle_home_request() -> Response<Body> {
    let body = serde_json::json!({
        "message": "Welcome to the User Behavior Prediction API",
        "usage": {
            "endpoint": "/predict",
            "method": "POST",
            "example_input": {
                "appUsageTime": 250,
                "screenOnTime": 5.2,
                "batteryDrain": 1500,
                "appsInstalled": 50,
                "dataUsage": 800,
                "age": 28,
                "gender": "Male"
            }
        }
    });

    json_response(StatusCode::OK, body.to_string())
}

/// Handles the `POST /predict` request
///
/// Reads the body, runs the pipeline, and maps the outcome to the
/// external contract: 200 with the predicted label, 400 with a precise
/// validation message, or 500 with a generic message (artifact failures
/// and unexpected errors — detail stays in the server logs).
async fn handle_predict_request(
    req: Request<Body>,
    pipeline: &PredictionPipeline,
) -> Response<Body> {
    let body_bytes = match hyper::body::to_bytes(req.into_body()).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(error = %e, "Failed to read prediction request body");
            return json_error_response(StatusCode::BAD_REQUEST, "Failed to read request body");
        }
    };

    match pipeline.predict(&body_bytes) {
        Ok(label) => {
            let body = serde_json::json!({ "predicted_user_behavior_class": label });
            json_response(StatusCode::OK, body.to_string())
        }
        Err(e) => {
            let status = StatusCode::from_u16(e.to_http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

            if status.is_server_error() {
                error!(error = %e, "Prediction request failed");
            } else {
                debug!(error = %e, "Prediction request rejected");
            }

            json_error_response(status, e.client_message())
        }
    }
}

/// Handles the `GET /health` request
fn handle_health_request() -> Response<Body> {
    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/plain")
        .header("cache-control", "no-cache")
        .body(Body::from("healthy"))
        .unwrap_or_else(|e| {
            error!(error = %e, "Failed to build health response");
            Response::new(Body::empty())
        })
}

/// Handles the `GET /metrics` service vitals request
fn handle_vitals_request(
    metrics: &MetricsCollector,
    pipeline: &PredictionPipeline,
    service_name: &str,
    version: &str,
) -> Response<Body> {
    let snapshot = metrics.snapshot();

    let vitals = ServiceVitals {
        ready: pipeline.ready(),
        service: service_name.to_string(),
        version: version.to_string(),
        active_requests: snapshot.active_requests,
        total_requests: snapshot.total_requests,
        error_rate: if snapshot.total_requests > 0 {
            Some(snapshot.error_rate() * 100.0)
        } else {
            None
        },
        status_message: format!("Uptime: {}s", snapshot.uptime.as_secs()),
    };

    match serde_json::to_string(&vitals) {
        Ok(json) => Response::builder()
            .status(StatusCode::OK)
            .header("content-type", "application/json")
            .header("cache-control", "no-cache, no-store, must-revalidate")
            .body(Body::from(json))
            .unwrap_or_else(|e| {
                error!(error = %e, "Failed to build vitals response");
                Response::new(Body::empty())
            }),
        Err(e) => {
            error!(error = %e, "Failed to serialize service vitals");
            json_error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to serialize vitals",
            )
        }
    }
}

fn json_response(status: StatusCode, body: String) -> Response<Body> {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap_or_else(|e| {
            error!(error = %e, "Failed to build response");
            Response::new(Body::empty())
        })
}

fn json_error_response(status: StatusCode, message: &str) -> Response<Body> {
    json_response(status, serde_json::json!({ "error": message }).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{
        LinearClassifier, LinearClassifierParams, StandardScaler, StandardScalerParams,
    };

    fn identity_artifacts() -> Arc<Artifacts> {
        let scaler = StandardScaler::from_params(StandardScalerParams {
            mean: vec![0.0; 7],
            scale: vec![1.0; 7],
        })
        .unwrap();

        // Single class: every valid request predicts 3
        let classifier = LinearClassifier::from_params(LinearClassifierParams {
            classes: vec![3],
            coefficients: vec![vec![0.0; 7]],
            intercepts: vec![0.0],
        })
        .unwrap();

        Arc::new(Artifacts::from_parts(
            Box::new(scaler),
            Box::new(classifier),
        ))
    }

    /// Classifier whose prediction depends on the encoded gender position
    fn gender_sensitive_artifacts() -> Arc<Artifacts> {
        let scaler = StandardScaler::from_params(StandardScalerParams {
            mean: vec![0.0; 7],
            scale: vec![1.0; 7],
        })
        .unwrap();

        let classifier = LinearClassifier::from_params(LinearClassifierParams {
            classes: vec![1, 2],
            coefficients: vec![
                vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, -10.0],
                vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 10.0],
            ],
            intercepts: vec![1.0, 0.0],
        })
        .unwrap();

        Arc::new(Artifacts::from_parts(
            Box::new(scaler),
            Box::new(classifier),
        ))
    }

    async fn dispatch(
        pipeline: Arc<PredictionPipeline>,
        req: Request<Body>,
    ) -> Response<Body> {
        let metrics = Arc::new(MetricsCollector::new());
        handle_request(
            req,
            pipeline,
            metrics,
            "test-service".to_string(),
            "0.0.0".to_string(),
            true,
        )
        .await
        .unwrap()
    }

    fn predict_request(body: &'static str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/predict")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    const VALID_BODY: &str = r#"{"appUsageTime":250,"screenOnTime":5.2,"batteryDrain":1500,"appsInstalled":50,"dataUsage":800,"age":28,"gender":"Male"}"#;

    #[tokio::test]
    async fn test_predict_happy_path() {
        let pipeline = Arc::new(PredictionPipeline::new(Some(identity_artifacts())));
        let response = dispatch(pipeline, predict_request(VALID_BODY)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/json"
        );

        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["predicted_user_behavior_class"], 3);
    }

    #[tokio::test]
    async fn test_predict_missing_gender() {
        let pipeline = Arc::new(PredictionPipeline::new(Some(identity_artifacts())));
        let response = dispatch(
            pipeline,
            predict_request(
                r#"{"appUsageTime":250,"screenOnTime":5.2,"batteryDrain":1500,"appsInstalled":50,"dataUsage":800,"age":28}"#,
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Missing feature: gender");
    }

    #[tokio::test]
    async fn test_predict_invalid_gender() {
        let pipeline = Arc::new(PredictionPipeline::new(Some(identity_artifacts())));
        let body = VALID_BODY.replace("\"Male\"", "\"Other\"");
        let req = Request::builder()
            .method(Method::POST)
            .uri("/predict")
            .body(Body::from(body))
            .unwrap();
        let response = dispatch(pipeline, req).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Invalid Gender value. Must be \"Male\" or \"Female\".");
    }

    #[tokio::test]
    async fn test_predict_unparsable_body_is_400() {
        let pipeline = Arc::new(PredictionPipeline::new(Some(identity_artifacts())));
        let response = dispatch(pipeline, predict_request("{oops")).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Invalid JSON input");
    }

    #[tokio::test]
    async fn test_predict_non_object_body_is_400() {
        let pipeline = Arc::new(PredictionPipeline::new(Some(identity_artifacts())));
        let response = dispatch(pipeline, predict_request("[1,2,3]")).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_predict_degraded_mode_is_500() {
        let pipeline = Arc::new(PredictionPipeline::new(None));
        let response = dispatch(pipeline, predict_request(VALID_BODY)).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Model or scaler not loaded. Check server logs.");
    }

    #[tokio::test]
    async fn test_predict_key_order_is_irrelevant() {
        let pipeline = Arc::new(PredictionPipeline::new(Some(gender_sensitive_artifacts())));

        let reordered = r#"{"gender":"Male","age":28,"dataUsage":800,"appsInstalled":50,"batteryDrain":1500,"screenOnTime":5.2,"appUsageTime":250}"#;

        let first = dispatch(Arc::clone(&pipeline), predict_request(VALID_BODY)).await;
        let second = dispatch(pipeline, predict_request(reordered)).await;

        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::OK);

        let first = hyper::body::to_bytes(first.into_body()).await.unwrap();
        let second = hyper::body::to_bytes(second.into_body()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_home_request() {
        let pipeline = Arc::new(PredictionPipeline::new(Some(identity_artifacts())));
        let req = Request::builder()
            .method(Method::GET)
            .uri("/")
            .body(Body::empty())
            .unwrap();
        let response = dispatch(pipeline, req).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "Welcome to the User Behavior Prediction API");
        assert_eq!(json["usage"]["endpoint"], "/predict");
        assert_eq!(json["usage"]["example_input"]["gender"], "Male");
    }

    #[tokio::test]
    async fn test_health_request() {
        let pipeline = Arc::new(PredictionPipeline::new(None));
        let req = Request::builder()
            .method(Method::GET)
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = dispatch(pipeline, req).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        assert_eq!(body, "healthy");
    }

    #[tokio::test]
    async fn test_vitals_request() {
        let pipeline = Arc::new(PredictionPipeline::new(Some(identity_artifacts())));
        let metrics = Arc::new(MetricsCollector::new());

        let req = Request::builder()
            .method(Method::GET)
            .uri("/metrics")
            .body(Body::empty())
            .unwrap();

        let response = handle_request(
            req,
            pipeline,
            Arc::clone(&metrics),
            "test-service".to_string(),
            "0.0.0".to_string(),
            true,
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["ready"], true);
        assert_eq!(json["service"], "test-service");
        assert_eq!(json["total_requests"], 1);
        assert!(json["status_message"].as_str().unwrap().contains("Uptime"));

        // The /metrics request itself was recorded
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 1);
        assert_eq!(snapshot.status_2xx, 1);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let pipeline = Arc::new(PredictionPipeline::new(None));
        let req = Request::builder()
            .method(Method::GET)
            .uri("/unknown")
            .body(Body::empty())
            .unwrap();
        let response = dispatch(pipeline, req).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_predict_is_404() {
        let pipeline = Arc::new(PredictionPipeline::new(None));
        let req = Request::builder()
            .method(Method::GET)
            .uri("/predict")
            .body(Body::empty())
            .unwrap();
        let response = dispatch(pipeline, req).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_metrics_disabled_hides_vitals() {
        let pipeline = Arc::new(PredictionPipeline::new(None));
        let metrics = Arc::new(MetricsCollector::new());

        let req = Request::builder()
            .method(Method::GET)
            .uri("/metrics")
            .body(Body::empty())
            .unwrap();

        let response = handle_request(
            req,
            pipeline,
            Arc::clone(&metrics),
            "test-service".to_string(),
            "0.0.0".to_string(),
            false,
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(metrics.snapshot().total_requests, 0);
    }

    #[tokio::test]
    async fn test_server_shutdown_without_start() {
        let mut server = PredictionServer::new(ServerConfig::default(), None).unwrap();

        let result = server.shutdown().await;
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Server is not running"));
    }
}
