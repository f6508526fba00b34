//! Prometheus metrics for the quoting loop.
//!
//! # Panics
//!
//! Registration uses `unwrap()`. A failure there means a duplicate metric
//! name, which is a programming error caught on first use at startup.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram, register_int_counter,
    register_int_counter_vec, CounterVec, Encoder, Gauge, Histogram, IntCounter, IntCounterVec,
    TextEncoder,
};

use crate::error::{TelemetryError, TelemetryResult};

/// Completed quote cycles.
pub static CYCLES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("midspread_cycles_total", "Completed quote cycles").unwrap()
});

/// Cycles restarted from INIT after a failure.
/// Labels: kind (market_data/price_sanity/venue_call)
pub static CYCLE_RESTARTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "midspread_cycle_restarts_total",
        "Quote cycles aborted and restarted",
        &["kind"]
    )
    .unwrap()
});

/// Cycle wall time in milliseconds.
pub static CYCLE_DURATION_MS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "midspread_cycle_duration_ms",
        "Quote cycle duration in milliseconds",
        vec![50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0]
    )
    .unwrap()
});

/// Tier dispatches by mode.
/// Labels: mode (shallow/full)
pub static DISPATCHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "midspread_dispatches_total",
        "Tier dispatches by mode",
        &["mode"]
    )
    .unwrap()
});

/// Reference prices rejected by the guard.
pub static GUARD_BREACHES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "midspread_guard_breaches_total",
        "Reference prices outside the guard band"
    )
    .unwrap()
});

/// Orders accepted by the venue.
pub static ORDERS_POSTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "midspread_orders_posted_total",
        "Orders accepted by the venue",
        &["side"]
    )
    .unwrap()
});

/// Orders the venue refused or that failed in transit.
pub static ORDER_POST_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "midspread_order_post_failures_total",
        "Order submissions that failed",
        &["side"]
    )
    .unwrap()
});

/// Cancel attempts.
/// Labels: result (ok/failed)
pub static CANCELS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "midspread_cancels_total",
        "Cancel attempts by result",
        &["result"]
    )
    .unwrap()
});

/// Last reference (mid) price.
pub static REFERENCE_PRICE: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("midspread_reference_price", "Last reference mid price").unwrap()
});

/// Last inventory balance ratio.
pub static BALANCE_RATIO: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("midspread_balance_ratio", "Last inventory balance ratio").unwrap()
});

/// Metrics helper.
pub struct Metrics;

impl Metrics {
    pub fn cycle_completed(duration_ms: f64) {
        CYCLES_TOTAL.inc();
        CYCLE_DURATION_MS.observe(duration_ms);
    }

    pub fn cycle_restarted(kind: &str) {
        CYCLE_RESTARTS_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn dispatched(mode: &str) {
        DISPATCHES_TOTAL.with_label_values(&[mode]).inc();
    }

    pub fn guard_breached() {
        GUARD_BREACHES_TOTAL.inc();
    }

    pub fn order_posted(side: &str) {
        ORDERS_POSTED_TOTAL.with_label_values(&[side]).inc();
    }

    pub fn order_post_failed(side: &str) {
        ORDER_POST_FAILURES_TOTAL.with_label_values(&[side]).inc();
    }

    pub fn cancels(ok: usize, failed: usize) {
        CANCELS_TOTAL.with_label_values(&["ok"]).inc_by(ok as u64);
        CANCELS_TOTAL.with_label_values(&["failed"]).inc_by(failed as u64);
    }

    pub fn reference_price(price: f64) {
        REFERENCE_PRICE.set(price);
    }

    pub fn balance_ratio(ratio: f64) {
        BALANCE_RATIO.set(ratio);
    }

    /// Text exposition of every registered metric.
    pub fn render() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&prometheus::gather(), &mut buffer)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}
