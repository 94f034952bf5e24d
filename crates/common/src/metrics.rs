use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    // Ingestion metrics
    pub static ref INGESTED_ORDERS: CounterVec = register_counter_vec!(
        "orders_ingested_total",
        "Total number of stream records processed by the ingest pipeline",
        &["outcome"]
    )
    .expect("metric cannot be created");

    // Cache metrics
    pub static ref CACHE_REQUESTS: CounterVec = register_counter_vec!(
        "order_cache_requests_total",
        "Total number of order cache lookups",
        &["backend", "status"]
    )
    .expect("metric cannot be created");

    // Store metrics
    pub static ref STORE_DURATION: HistogramVec = register_histogram_vec!(
        "order_store_operation_duration_seconds",
        "Order store operation duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("metric cannot be created");
}

/// Get all metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record the outcome of one ingested record
/// ("persisted", "decode_error", "validation_error", "store_error").
pub fn record_ingest(outcome: &str) {
    INGESTED_ORDERS.with_label_values(&[outcome]).inc();
}

/// Record a cache lookup against the given backend.
pub fn record_cache_request(backend: &str, hit: bool) {
    let status = if hit { "hit" } else { "miss" };
    CACHE_REQUESTS.with_label_values(&[backend, status]).inc();
}

/// Record the duration of a durable store operation.
pub fn record_store_operation(operation: &str, duration_secs: f64) {
    STORE_DURATION
        .with_label_values(&[operation])
        .observe(duration_secs);
}
