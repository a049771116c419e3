//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{Counter, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Upload Metrics
    pub static ref UPLOADS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("cidgate_uploads_total", "Total number of uploads by outcome"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref UPLOAD_BYTES_TOTAL: Counter = Counter::new(
        "cidgate_upload_bytes_total",
        "Total bytes written to object storage"
    ).expect("metric can be created");

    // Poller Metrics
    pub static ref POLL_ATTEMPTS_TOTAL: IntCounter = IntCounter::new(
        "cidgate_poll_attempts_total",
        "Total number of object metadata lookups issued while waiting for a CID"
    ).expect("metric can be created");
    pub static ref POLL_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "cidgate_poll_duration_seconds",
            "Time spent waiting for a CID"
        ).buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 45.0, 60.0]),
        &["result"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("cidgate_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
///
/// Safe to call more than once; repeated registrations are ignored.
pub fn init_metrics() {
    let collectors: [Box<dyn prometheus::core::Collector>; 5] = [
        Box::new(UPLOADS_TOTAL.clone()),
        Box::new(UPLOAD_BYTES_TOTAL.clone()),
        Box::new(POLL_ATTEMPTS_TOTAL.clone()),
        Box::new(POLL_DURATION_SECONDS.clone()),
        Box::new(ERRORS_TOTAL.clone()),
    ];

    for collector in collectors {
        if let Err(error) = REGISTRY.register(collector) {
            tracing::debug!(%error, "Metric already registered");
        }
    }

    tracing::info!("Metrics registry initialized");
}
