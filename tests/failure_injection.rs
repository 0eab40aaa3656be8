//! Failure injection: a broken span pipeline must never fail a request.

mod common;

use std::time::{Duration, Instant};

use axum::http::StatusCode;
use opentelemetry_sdk::error::{OTelSdkError, OTelSdkResult};
use opentelemetry_sdk::trace::{
    BatchConfigBuilder, BatchSpanProcessor, SdkTracerProvider, SpanData, SpanExporter,
};

use common::{get, is_lower_hex, Harness};
use telemetry_demo::config::{ExporterKind, TracingConfig};
use telemetry_demo::observability::export::SpanSink;
use telemetry_demo::observability::tracer_provider;

/// Exporter that rejects every batch.
#[derive(Debug)]
struct RejectingExporter;

impl SpanExporter for RejectingExporter {
    async fn export(&self, _batch: Vec<SpanData>) -> OTelSdkResult {
        Err(OTelSdkError::InternalFailure("collector unavailable".into()))
    }
}

/// Exporter that takes `delay` per batch.
#[derive(Debug)]
struct SlowExporter {
    delay: Duration,
}

impl SpanExporter for SlowExporter {
    async fn export(&self, _batch: Vec<SpanData>) -> OTelSdkResult {
        std::thread::sleep(self.delay);
        Ok(())
    }
}

#[tokio::test]
async fn test_rejecting_exporter_does_not_affect_responses() {
    let sink = SpanSink::new(RejectingExporter);
    let failures = sink.failures();
    let provider = SdkTracerProvider::builder().with_simple_exporter(sink).build();
    let harness = Harness::with_provider(provider);

    let ok = get(harness.router(), "/end1/4").await;
    assert_eq!(ok.status, StatusCode::OK);
    assert!(is_lower_hex(&ok.body["trace_id"], 32));

    let bad = get(harness.router(), "/end1/-4").await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);

    // request + end1 + square + root, twice
    assert_eq!(failures.dropped(), 8);
    assert_eq!(harness.logs.request_records().len(), 2);
}

#[tokio::test]
async fn test_unreachable_collector_is_tolerated() {
    // Nothing listens on port 1.
    let config = TracingConfig {
        exporter: ExporterKind::Collector,
        collector_endpoint: "http://127.0.0.1:1".into(),
        export_timeout_secs: 1,
        max_queue_size: 64,
        max_batch_size: 2,
        scheduled_delay_ms: 50,
        ..TracingConfig::default()
    };
    let (provider, failures) = tracer_provider(&config, "telemetry-demo").unwrap();
    let harness = Harness::with_provider(provider.clone());

    for _ in 0..3 {
        let response = get(harness.router(), "/end2/?text=Ok").await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["reversed"], "ko");
    }

    let drained = tokio::task::spawn_blocking(move || provider.shutdown());
    tokio::time::timeout(Duration::from_secs(10), drained)
        .await
        .expect("span export did not drain")
        .unwrap()
        .unwrap();
    assert!(failures.dropped() > 0);
    assert_eq!(harness.logs.request_records().len(), 3);
}

#[tokio::test]
async fn test_slow_exporter_never_delays_requests() {
    let export_delay = Duration::from_millis(500);
    let batch = BatchConfigBuilder::default()
        .with_max_queue_size(2)
        .with_max_export_batch_size(1)
        .with_scheduled_delay(Duration::from_secs(3600))
        .build();
    let processor = BatchSpanProcessor::builder(SpanSink::new(SlowExporter { delay: export_delay }))
        .with_batch_config(batch)
        .build();
    let provider = SdkTracerProvider::builder().with_span_processor(processor).build();
    let harness = Harness::with_provider(provider);

    let started = Instant::now();
    let response = get(harness.router(), "/end2/?text=abc").await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(started.elapsed() < export_delay);

    let record = harness.only_record();
    assert!(record["latency_ms"].as_u64().unwrap() < export_delay.as_millis() as u64);
}
