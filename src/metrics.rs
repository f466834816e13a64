//! Prometheus metrics registry, instruments, and the `/metrics` handler.

use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use lazy_static::lazy_static;
use prometheus::{Encoder, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use std::time::Duration;

use crate::error::AppError;

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Login Metrics
    pub static ref LOGIN_ATTEMPTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("wingbox_login_attempts_total", "Total number of OAuth callback attempts"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref PROVIDER_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("wingbox_provider_requests_total", "Total number of identity provider requests"),
        &["endpoint", "status"]
    ).expect("metric can be created");
    pub static ref PROVIDER_REQUEST_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "wingbox_provider_request_duration_seconds",
            "Identity provider request duration in seconds"
        ).buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["endpoint"]
    ).expect("metric can be created");

    // Database Metrics
    pub static ref USERS_CREATED_TOTAL: prometheus::IntCounter = prometheus::IntCounter::new(
        "wingbox_users_created_total",
        "Total number of local users created on first login"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("wingbox_errors_total", "Total number of error responses"),
        &["error_type"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
///
/// Safe to call more than once; already-registered collectors are skipped.
pub fn init_metrics() {
    let collectors: [Box<dyn prometheus::core::Collector>; 5] = [
        Box::new(LOGIN_ATTEMPTS_TOTAL.clone()),
        Box::new(PROVIDER_REQUESTS_TOTAL.clone()),
        Box::new(PROVIDER_REQUEST_DURATION_SECONDS.clone()),
        Box::new(USERS_CREATED_TOTAL.clone()),
        Box::new(ERRORS_TOTAL.clone()),
    ];

    for collector in collectors {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(error) => tracing::warn!(%error, "Failed to register metric"),
        }
    }

    tracing::info!("Metrics registry initialized");
}

/// Record one identity provider round trip.
pub fn observe_provider_request(endpoint: &str, status: &str, elapsed: Duration) {
    PROVIDER_REQUESTS_TOTAL
        .with_label_values(&[endpoint, status])
        .inc();
    PROVIDER_REQUEST_DURATION_SECONDS
        .with_label_values(&[endpoint])
        .observe(elapsed.as_secs_f64());
}

/// GET /metrics
///
/// Renders the registry in Prometheus text exposition format.
pub async fn render() -> Result<impl IntoResponse, AppError> {
    let encoder = TextEncoder::new();
    let body = encoder
        .encode_to_string(&REGISTRY.gather())
        .map_err(|e| AppError::Internal(e.into()))?;

    Ok(([(CONTENT_TYPE, encoder.format_type().to_string())], body))
}
