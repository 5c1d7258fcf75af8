//! Concurrent and long-running calls through the interceptor.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{stream, StreamExt};
use rpc_balancer::client::BalancedClient;
use rpc_balancer::interceptor::CallInterceptor;
use rpc_balancer::load_balancer::{registry::BackendRegistry, Balancer};
use rpc_balancer::observability::{CallStatus, MetricsCollector};
use rpc_balancer::resilience::RetryPolicy;
use rpc_balancer::Error;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_are_all_accounted() {
    const TOTAL: usize = 200;
    const FAILING: usize = 37;

    let interceptor = CallInterceptor::new(Arc::new(MetricsCollector::new()));
    let mut tasks = Vec::with_capacity(TOTAL);

    for i in 0..TOTAL {
        let interceptor = interceptor.clone();
        tasks.push(tokio::spawn(async move {
            interceptor
                .unary("/load.Service/Call", || async move {
                    tokio::time::sleep(Duration::from_millis((i % 5) as u64)).await;
                    if i < FAILING {
                        Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
                    } else {
                        Ok(i)
                    }
                })
                .await
        }));
    }

    let mut ok = 0;
    for task in tasks {
        if task.await.unwrap().is_ok() {
            ok += 1;
        }
    }
    assert_eq!(ok, TOTAL - FAILING);

    let snapshot = interceptor.metrics().snapshot();
    let method = "/load.Service/Call";
    assert_eq!(snapshot.request_count(method, CallStatus::Ok), (TOTAL - FAILING) as u64);
    assert_eq!(snapshot.request_count(method, CallStatus::Error), FAILING as u64);
    assert_eq!(snapshot.error_count(method, "ConnectionReset"), FAILING as u64);
    assert_eq!(snapshot.duration_count(method), TOTAL as u64);
    assert_eq!(snapshot.active_connections(), 0);
}

#[tokio::test]
async fn test_stream_error_after_delay_records_full_duration() {
    let interceptor = CallInterceptor::new(Arc::new(MetricsCollector::new()));
    let items = stream::iter(vec![Ok::<u32, io::Error>(1)]).chain(stream::once(async {
        tokio::time::sleep(Duration::from_millis(40)).await;
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "stream broke"))
    }));

    let out: Vec<_> = interceptor.streaming("/svc/Watch", items).collect().await;
    assert_eq!(out.len(), 2);
    assert!(out[1].is_err());

    let snapshot = interceptor.metrics().snapshot();
    assert_eq!(snapshot.request_count("/svc/Watch", CallStatus::Error), 1);
    assert_eq!(snapshot.error_count("/svc/Watch", "BrokenPipe"), 1);
    assert!(snapshot.duration_sum("/svc/Watch") >= 0.04);
    assert_eq!(snapshot.active_connections(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_balanced_client_spreads_load() {
    let registry = Arc::new(BackendRegistry::with_backends(["a:1", "b:2", "c:3"]));
    for address in ["a:1", "b:2", "c:3"] {
        registry.mark_healthy(address);
    }
    let client = BalancedClient::new(
        Arc::new(Balancer::round_robin(registry)),
        CallInterceptor::new(Arc::new(MetricsCollector::new())),
        RetryPolicy::none(),
    );

    let mut tasks = Vec::new();
    for _ in 0..30 {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            client
                .call("/svc/Echo", |address| async move { Ok::<_, Error>(address) })
                .await
                .unwrap()
        }));
    }

    let mut per_backend = std::collections::HashMap::new();
    for task in tasks {
        *per_backend.entry(task.await.unwrap()).or_insert(0) += 1;
    }
    // A shared cursor hands out exactly one third each.
    assert_eq!(per_backend.len(), 3);
    assert!(per_backend.values().all(|&n| n == 10));
}
