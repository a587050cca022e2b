use prometheus::{
    Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use lazy_static::lazy_static;
use std::sync::Once;

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref TRANSITIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("hostlink_transitions_total", "State transitions by link and destination state"),
        &["link", "state"]
    ).unwrap();

    pub static ref CONNECT_ATTEMPTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("hostlink_connect_attempts_total", "Connection attempts by link"),
        &["link"]
    ).unwrap();

    pub static ref CONNECT_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("hostlink_connect_failures_total", "Failed connection attempts by link"),
        &["link"]
    ).unwrap();

    pub static ref WATCHDOG_EXPIRIES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("hostlink_watchdog_expiries_total", "Liveness timeouts by link"),
        &["link"]
    ).unwrap();

    pub static ref IGNORED_TRIGGERS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("hostlink_ignored_triggers_total", "Triggers with no transition from the current state"),
        &["link"]
    ).unwrap();

    pub static ref CONNECTED_LINKS: IntGauge = IntGauge::with_opts(
        Opts::new("hostlink_connected_links", "Number of links in the connected state")
    ).unwrap();
}

static REGISTER: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Safe to call more than once.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(TRANSITIONS_TOTAL.clone()),
            Box::new(CONNECT_ATTEMPTS_TOTAL.clone()),
            Box::new(CONNECT_FAILURES_TOTAL.clone()),
            Box::new(WATCHDOG_EXPIRIES_TOTAL.clone()),
            Box::new(IGNORED_TRIGGERS_TOTAL.clone()),
            Box::new(CONNECTED_LINKS.clone()),
        ];
        for collector in collectors {
            // Only fails on duplicate names, which the Once rules out
            let _ = REGISTRY.register(collector);
        }
    });
}

/// Gather metrics in Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        register_metrics();
        register_metrics();

        TRANSITIONS_TOTAL.with_label_values(&["bingo", "connected"]).inc();
        CONNECT_ATTEMPTS_TOTAL.with_label_values(&["bingo"]).inc();
        WATCHDOG_EXPIRIES_TOTAL.with_label_values(&["bingo"]).inc();
        CONNECTED_LINKS.set(1);

        let metrics = gather_metrics();
        assert!(metrics.contains("hostlink_transitions_total"));
        assert!(metrics.contains("hostlink_watchdog_expiries_total"));
        assert!(metrics.contains("hostlink_connected_links"));
    }
}
