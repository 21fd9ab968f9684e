//! Prometheus metrics for maprelay.
//!
//! - `maprelay_requests_total{outcome}` - handled chat messages by outcome
//! - `maprelay_rejections_total{reason}` - admission rejections by reason
//! - `maprelay_request_duration_seconds` - time from message to dispatch
//! - `maprelay_joins_total{result}` - channel joins by result
//! - `maprelay_joined_channels` - channels currently joined (gauge)
//! - `maprelay_live_users` - registered users live in the target game (gauge)

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::{Once, OnceLock};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters
// ========================================================================

/// Chat messages handled, by outcome (`ignored`, `rejected`, `dispatched`).
pub static REQUESTS: OnceLock<IntCounterVec> = OnceLock::new();

/// Admission rejections by reason code.
pub static REJECTIONS: OnceLock<IntCounterVec> = OnceLock::new();

/// Join attempts by result (`ok`, `timeout`, `error`).
pub static JOINS: OnceLock<IntCounterVec> = OnceLock::new();

/// In-game commands by name.
pub static COMMANDS: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gauges
// ========================================================================

pub static JOINED_CHANNELS: OnceLock<IntGauge> = OnceLock::new();

pub static LIVE_USERS: OnceLock<IntGauge> = OnceLock::new();

// ========================================================================
// Histograms
// ========================================================================

pub static REQUEST_DURATION: OnceLock<Histogram> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Call at startup before any metrics are recorded; later calls are no-ops.
/// Metrics recorded before `init` are dropped silently.
pub fn init() {
    static INIT: Once = Once::new();
    INIT.call_once(register_all);
}

fn register_all() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    register!(REQUESTS, IntCounterVec::new(Opts::new("maprelay_requests_total", "Chat messages handled by outcome"), &["outcome"]));
    register!(REJECTIONS, IntCounterVec::new(Opts::new("maprelay_rejections_total", "Admission rejections by reason"), &["reason"]));
    register!(JOINS, IntCounterVec::new(Opts::new("maprelay_joins_total", "Channel joins by result"), &["result"]));
    register!(COMMANDS, IntCounterVec::new(Opts::new("maprelay_commands_total", "In-game commands by name"), &["command"]));
    register!(JOINED_CHANNELS, IntGauge::new("maprelay_joined_channels", "Channels currently joined"));
    register!(LIVE_USERS, IntGauge::new("maprelay_live_users", "Registered users live in the target game"));
    register!(REQUEST_DURATION, Histogram::with_opts(
        HistogramOpts::new("maprelay_request_duration_seconds", "Time from chat message to dispatch")
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0])));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Update helpers
// ============================================================================

fn inc(metric: &OnceLock<IntCounterVec>, label: &str) {
    if let Some(m) = metric.get() {
        m.with_label_values(&[label]).inc();
    }
}

fn set(metric: &OnceLock<IntGauge>, value: usize) {
    if let Some(m) = metric.get() {
        m.set(i64::try_from(value).unwrap_or(i64::MAX));
    }
}

pub fn record_request(outcome: &str) {
    inc(&REQUESTS, outcome);
}

pub fn record_rejection(reason: &str) {
    inc(&REJECTIONS, reason);
}

pub fn record_join(result: &str) {
    inc(&JOINS, result);
}

pub fn record_command(command: &str) {
    inc(&COMMANDS, command);
}

pub fn set_joined_channels(count: usize) {
    set(&JOINED_CHANNELS, count);
}

pub fn set_live_users(count: usize) {
    set(&LIVE_USERS, count);
}

pub fn observe_request_duration(seconds: f64) {
    if let Some(m) = REQUEST_DURATION.get() {
        m.observe(seconds);
    }
}
