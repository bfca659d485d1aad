//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{Counter, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("platzigram_http_requests_total", "Total number of HTTP requests"),
        &["method", "endpoint", "status"]
    ).expect("metric can be created");
    pub static ref HTTP_REQUEST_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "platzigram_http_request_duration_seconds",
            "HTTP request duration in seconds"
        ).buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["method", "endpoint"]
    ).expect("metric can be created");

    // Account Metrics
    pub static ref LOGINS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("platzigram_logins_total", "Total number of login attempts"),
        &["result"]
    ).expect("metric can be created");
    pub static ref SIGNUPS_TOTAL: IntCounter = IntCounter::new(
        "platzigram_signups_total",
        "Total number of accounts created"
    ).expect("metric can be created");
    pub static ref SESSIONS_PURGED_TOTAL: IntCounter = IntCounter::new(
        "platzigram_sessions_purged_total",
        "Total number of expired sessions removed"
    ).expect("metric can be created");

    // Content Metrics
    pub static ref POSTS_CREATED_TOTAL: IntCounter = IntCounter::new(
        "platzigram_posts_created_total",
        "Total number of posts created"
    ).expect("metric can be created");
    pub static ref USERS_TOTAL: IntGauge = IntGauge::new(
        "platzigram_users_total",
        "Total number of registered users"
    ).expect("metric can be created");

    // Storage Metrics
    pub static ref MEDIA_UPLOADS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("platzigram_media_uploads_total", "Total number of media uploads"),
        &["kind"]
    ).expect("metric can be created");
    pub static ref MEDIA_BYTES_UPLOADED: Counter = Counter::new(
        "platzigram_media_bytes_uploaded_total",
        "Total bytes of media uploaded"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("platzigram_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
            .expect("HTTP_REQUESTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
            .expect("HTTP_REQUEST_DURATION_SECONDS can be registered");
        REGISTRY
            .register(Box::new(LOGINS_TOTAL.clone()))
            .expect("LOGINS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(SIGNUPS_TOTAL.clone()))
            .expect("SIGNUPS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(SESSIONS_PURGED_TOTAL.clone()))
            .expect("SESSIONS_PURGED_TOTAL can be registered");
        REGISTRY
            .register(Box::new(POSTS_CREATED_TOTAL.clone()))
            .expect("POSTS_CREATED_TOTAL can be registered");
        REGISTRY
            .register(Box::new(USERS_TOTAL.clone()))
            .expect("USERS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(MEDIA_UPLOADS_TOTAL.clone()))
            .expect("MEDIA_UPLOADS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(MEDIA_BYTES_UPLOADED.clone()))
            .expect("MEDIA_BYTES_UPLOADED can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}
