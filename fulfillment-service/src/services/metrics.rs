//! Prometheus metrics for fulfillment-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// Conversion runs by outcome.
pub static CONVERSIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fulfillment_conversions_total",
        "Total number of request conversions by outcome",
        &["outcome"] // converted, partial_failure, nothing_to_convert
    )
    .expect("Failed to register conversions_total")
});

/// Orders created by vendor kind.
pub static ORDERS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fulfillment_orders_total",
        "Total number of orders created by vendor kind",
        &["vendor_kind", "source"]
    )
    .expect("Failed to register orders_total")
});

/// Challan lifecycle events.
pub static CHALLANS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fulfillment_challans_total",
        "Total number of challan lifecycle events",
        &["event"] // issued, paid, converted, cancelled
    )
    .expect("Failed to register challans_total")
});

/// Payment counter.
pub static PAYMENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fulfillment_payments_total",
        "Total number of challan payments by payment method",
        &["payment_method"]
    )
    .expect("Failed to register payments_total")
});

/// Payment amount counter.
pub static PAYMENT_AMOUNT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fulfillment_payment_amount_total",
        "Total amount recorded against challans",
        &["payment_method"]
    )
    .expect("Failed to register payment_amount_total")
});

/// Reads and writes served by the local cache instead of the remote store.
pub static STORE_FALLBACKS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fulfillment_store_fallbacks_total",
        "Total number of store operations degraded to the local cache",
        &["collection", "operation"]
    )
    .expect("Failed to register store_fallbacks_total")
});

/// Store operation duration histogram.
pub static STORE_OPERATION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "fulfillment_store_operation_duration_seconds",
        "Store operation duration in seconds",
        &["collection", "operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("Failed to register store_operation_duration")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fulfillment_errors_total",
        "Total number of errors by type",
        &["error_type"]
    )
    .expect("Failed to register errors_total")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&CONVERSIONS_TOTAL);
    Lazy::force(&ORDERS_TOTAL);
    Lazy::force(&CHALLANS_TOTAL);
    Lazy::force(&PAYMENTS_TOTAL);
    Lazy::force(&PAYMENT_AMOUNT_TOTAL);
    Lazy::force(&STORE_FALLBACKS_TOTAL);
    Lazy::force(&STORE_OPERATION_DURATION);
    Lazy::force(&ERRORS_TOTAL);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
