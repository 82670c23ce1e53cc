//! Server Tests
//!
//! Tests for server lifecycle and management functionality.

use habitus_server::{PredictionServer, ServerConfig};
use std::path::PathBuf;

#[tokio::test]
async fn test_server_creation() {
    let server = PredictionServer::new(ServerConfig::default(), None).unwrap();

    assert_eq!(server.listen_addr().port(), 5000);
    assert!(!server.is_ready());
}

#[tokio::test]
async fn test_server_with_custom_config() {
    let config = ServerConfig {
        listen_addr: "127.0.0.1:9999".parse().unwrap(),
        service_name: "habitus-test".to_string(),
        ..Default::default()
    };

    let server = PredictionServer::new(config, None).unwrap();
    assert_eq!(server.listen_addr().port(), 9999);
    assert_eq!(server.config().service_name, "habitus-test");
}

#[tokio::test]
async fn test_server_rejects_invalid_config() {
    let config = ServerConfig {
        model_path: PathBuf::new(),
        ..Default::default()
    };

    let result = PredictionServer::new(config, None);
    assert!(result.is_err());
}

#[tokio::test]
async fn test_server_metrics_access() {
    let server = PredictionServer::new(ServerConfig::default(), None).unwrap();

    let snapshot = server.metrics().snapshot();
    assert_eq!(snapshot.total_requests, 0);
    assert_eq!(snapshot.active_requests, 0);
}

#[tokio::test]
async fn test_server_bind_error() {
    // Occupy a port first so the server bind deterministically fails
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let config = ServerConfig {
        listen_addr: occupied.local_addr().unwrap(),
        ..Default::default()
    };

    let server = PredictionServer::new(config, None).unwrap();
    let result = server.start().await;
    assert!(result.is_err());
}
