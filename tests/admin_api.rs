//! The HTTP surface, driven over a real socket.

use std::sync::Arc;
use std::time::Duration;

use rpc_balancer::config::BalancerConfig;
use rpc_balancer::http::{AppState, HttpServer};
use rpc_balancer::interceptor::CallInterceptor;
use rpc_balancer::lifecycle::Shutdown;
use rpc_balancer::load_balancer::registry::BackendRegistry;
use rpc_balancer::observability::MetricsCollector;
use serde_json::Value;
use tokio::net::TcpListener;

struct Running {
    base: String,
    api_key: String,
    registry: Arc<BackendRegistry>,
    metrics: Arc<MetricsCollector>,
    shutdown: Shutdown,
    task: tokio::task::JoinHandle<Result<(), std::io::Error>>,
}

async fn start() -> Running {
    let mut config = BalancerConfig::default();
    config.admin.enabled = true;
    config.admin.api_key = "test-key".to_string();

    let registry = Arc::new(BackendRegistry::with_backends(["10.0.0.1:50051"]));
    let metrics = Arc::new(MetricsCollector::new());
    let shutdown = Shutdown::new();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let server = HttpServer::new(AppState {
        registry: registry.clone(),
        metrics: metrics.clone(),
        config: Arc::new(config),
    });
    let task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    Running {
        base,
        api_key: "test-key".to_string(),
        registry,
        metrics,
        shutdown,
        task,
    }
}

#[tokio::test]
async fn test_admin_roundtrip_over_http() {
    let running = start().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/admin/backends", running.base))
        .bearer_auth(&running.api_key)
        .json(&serde_json::json!({ "address": "10.0.0.2:50051" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::CREATED);
    assert!(running.registry.contains("10.0.0.2:50051"));

    let list: Value = client
        .get(format!("{}/admin/backends", running.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list["total"], 2);
    assert_eq!(list["healthy"], 0);
    assert_eq!(list["backends"][0]["address"], "10.0.0.1:50051");
    assert_eq!(list["backends"][1]["health"], "unknown");

    let res = client
        .delete(format!("{}/admin/backends/10.0.0.1:50051", running.base))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::UNAUTHORIZED);

    let res = client
        .delete(format!("{}/admin/backends/10.0.0.1:50051", running.base))
        .bearer_auth(&running.api_key)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::NO_CONTENT);
    assert_eq!(running.registry.addresses(), vec!["10.0.0.2:50051"]);

    running.shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), running.task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_metrics_endpoint_reflects_calls() {
    let running = start().await;
    let interceptor = CallInterceptor::new(running.metrics.clone());

    let _: Result<(), std::io::Error> = interceptor.unary("/svc/Ping", || async { Ok(()) }).await;

    let res = reqwest::get(format!("{}/metrics", running.base)).await.unwrap();
    assert!(res
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/plain")));
    let body = res.text().await.unwrap();
    assert!(body.contains(r#"rpc_requests_total{method="/svc/Ping",status="ok"} 1"#));
    assert!(body.contains("rpc_active_connections 0"));

    running.shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), running.task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
