use prometheus::{Encoder, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;
use std::time::Duration;

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

// Metrics
pub static API_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static API_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static UPLOADS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static SESSION_INVALIDATIONS_TOTAL: OnceLock<IntCounter> = OnceLock::new();

pub fn init_metrics() {
    let registry = Registry::new();

    let requests_total = IntCounterVec::new(
        Opts::new(
            "portal_api_requests_total",
            "Total number of requests sent to the video API",
        ),
        &["method", "endpoint", "status"],
    )
    .expect("metric can be created");

    let request_duration = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "portal_api_request_duration_seconds",
            "Video API request duration in seconds",
        ),
        &["method", "endpoint"],
    )
    .expect("metric can be created");

    let uploads_total = IntCounterVec::new(
        Opts::new("portal_uploads_total", "Upload attempts by outcome"),
        &["outcome"],
    )
    .expect("metric can be created");

    let invalidations = IntCounter::new(
        "portal_session_invalidations_total",
        "Sessions cleared because the API rejected the credential",
    )
    .expect("metric can be created");

    registry
        .register(Box::new(requests_total.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(request_duration.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(uploads_total.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(invalidations.clone()))
        .expect("collector can be registered");

    // Initialize globals
    let _ = REGISTRY.set(registry);
    let _ = API_REQUESTS_TOTAL.set(requests_total);
    let _ = API_REQUEST_DURATION_SECONDS.set(request_duration);
    let _ = UPLOADS_TOTAL.set(uploads_total);
    let _ = SESSION_INVALIDATIONS_TOTAL.set(invalidations);
}

/// Recording is a no-op until `init_metrics` has run (library use, tests).
pub fn record_api_request(method: &str, endpoint: &str, status: &str, elapsed: Duration) {
    if let Some(counter) = API_REQUESTS_TOTAL.get() {
        counter.with_label_values(&[method, endpoint, status]).inc();
    }
    if let Some(histogram) = API_REQUEST_DURATION_SECONDS.get() {
        histogram
            .with_label_values(&[method, endpoint])
            .observe(elapsed.as_secs_f64());
    }
}

pub fn record_upload(outcome: &str) {
    if let Some(counter) = UPLOADS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

pub fn record_session_invalidated() {
    if let Some(counter) = SESSION_INVALIDATIONS_TOTAL.get() {
        counter.inc();
    }
}

pub fn get_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return String::new();
    };

    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
