//! End-to-end over a real socket.

mod common;

use std::time::Duration;

use tokio::net::TcpListener;

use common::{is_lower_hex, Harness};
use telemetry_demo::http::HttpServer;
use telemetry_demo::lifecycle::Shutdown;
use telemetry_demo::observability::metrics::detached_handle;

#[tokio::test]
async fn test_serves_over_tcp_and_shuts_down_gracefully() {
    let harness = Harness::new();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(harness.config.clone(), Some(detached_handle()));
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let client = reqwest::Client::new();
    let response = client
        .get(format!("http://{}/end1/9", addr))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("x-request-id"));
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["root"], 3.0);
    assert!(is_lower_hex(&body["trace_id"], 32));

    let metrics = client
        .get(format!("http://{}/metrics", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(metrics.status(), 200);

    drop(client);
    shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());

    assert_eq!(harness.logs.request_records().len(), 2);
}
