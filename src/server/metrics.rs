use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all ShopLens metrics
const PREFIX: &str = "shoplens";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Sync Job Metrics
    pub static ref SYNC_JOBS_STARTED_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_sync_jobs_started_total"), "Jobs admitted by the dispatcher"),
        &["job_type"]
    ).expect("Failed to create sync_jobs_started_total metric");

    pub static ref SYNC_JOBS_COMPLETED_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_sync_jobs_completed_total"), "Settled jobs by outcome"),
        &["job_type", "status"]
    ).expect("Failed to create sync_jobs_completed_total metric");

    pub static ref SYNC_JOB_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_sync_job_duration_seconds"),
            "Job wall-clock duration in seconds"
        )
        .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 180.0, 600.0]),
        &["job_type"]
    ).expect("Failed to create sync_job_duration_seconds metric");

    pub static ref SYNC_JOBS_RUNNING: Gauge = Gauge::new(
        format!("{PREFIX}_sync_jobs_running"),
        "Jobs currently running"
    ).expect("Failed to create sync_jobs_running metric");

    pub static ref SYNC_JOBS_REJECTED_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_sync_jobs_rejected_total"), "Jobs refused at admission"),
        &["reason"]
    ).expect("Failed to create sync_jobs_rejected_total metric");

    // Partition Metrics
    pub static ref PARTITION_SYNCS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_partition_syncs_total"), "Partition sync attempts by outcome"),
        &["partition", "status"]
    ).expect("Failed to create partition_syncs_total metric");

    pub static ref DOCUMENTS_INDEXED_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_documents_indexed_total"),
        "Documents written to the search index"
    ).expect("Failed to create documents_indexed_total metric");

    // Circuit Breaker Metrics
    pub static ref BREAKER_TRIPS_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_breaker_trips_total"),
        "Circuit breakers opened"
    ).expect("Failed to create breaker_trips_total metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(SYNC_JOBS_STARTED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(SYNC_JOBS_COMPLETED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(SYNC_JOB_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(SYNC_JOBS_RUNNING.clone()));
    let _ = REGISTRY.register(Box::new(SYNC_JOBS_REJECTED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PARTITION_SYNCS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(DOCUMENTS_INDEXED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(BREAKER_TRIPS_TOTAL.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

/// Record a job passing admission
pub fn record_job_started(job_type: &str) {
    SYNC_JOBS_STARTED_TOTAL.with_label_values(&[job_type]).inc();
}

/// Record a job settling
pub fn record_job_completed(job_type: &str, success: bool, duration_secs: f64) {
    let status = if success { "success" } else { "failure" };
    SYNC_JOBS_COMPLETED_TOTAL
        .with_label_values(&[job_type, status])
        .inc();
    SYNC_JOB_DURATION_SECONDS
        .with_label_values(&[job_type])
        .observe(duration_secs);
}

/// Update the running jobs gauge
pub fn set_running_jobs(count: usize) {
    SYNC_JOBS_RUNNING.set(count as f64);
}

/// Record a job refused at admission
pub fn record_job_rejected(reason: &str) {
    SYNC_JOBS_REJECTED_TOTAL.with_label_values(&[reason]).inc();
}

/// Record the outcome of one partition within a sync pass
pub fn record_partition_sync(partition: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    PARTITION_SYNCS_TOTAL
        .with_label_values(&[partition, status])
        .inc();
}

/// Record documents written to the index
pub fn record_documents_indexed(count: usize) {
    DOCUMENTS_INDEXED_TOTAL.inc_by(count as f64);
}

/// Record a circuit breaker opening
pub fn record_breaker_trip() {
    BREAKER_TRIPS_TOTAL.inc();
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_else(|_| String::from(""));
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
