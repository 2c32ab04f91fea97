//! Metrics instrumentation
//!
//! Thin wrappers around the `metrics` facade so call sites stay one-liners and
//! metric names live in a single place. A consumer installs a recorder
//! (Prometheus exporter, statsd, ...); without one these are no-ops.

/// Label values shared across counters and histograms
pub mod labels {
    /// `mysql_native_password` authentication plugin
    pub const PLUGIN_NATIVE: &str = "mysql_native_password";

    /// `caching_sha2_password` authentication plugin
    pub const PLUGIN_CACHING_SHA2: &str = "caching_sha2_password";
}

/// Counter metrics
pub mod counters {
    /// A connection attempt started
    pub fn connect_attempted() {
        metrics::counter!("mysql_wire_connect_attempts_total").increment(1);
    }

    /// A connection attempt failed before reaching Idle
    pub fn connect_failed(reason: &str) {
        metrics::counter!("mysql_wire_connect_failures_total", "reason" => reason.to_string())
            .increment(1);
    }

    /// Authentication started with the given plugin
    pub fn auth_attempted(plugin: &str) {
        metrics::counter!("mysql_wire_auth_attempts_total", "plugin" => plugin.to_string())
            .increment(1);
    }

    /// Authentication accepted by the server
    pub fn auth_successful(plugin: &str) {
        metrics::counter!("mysql_wire_auth_success_total", "plugin" => plugin.to_string())
            .increment(1);
    }

    /// Authentication rejected
    pub fn auth_failed(plugin: &str, reason: &str) {
        metrics::counter!(
            "mysql_wire_auth_failures_total",
            "plugin" => plugin.to_string(),
            "reason" => reason.to_string()
        )
        .increment(1);
    }
}

/// Histogram metrics
pub mod histograms {
    /// Wall-clock duration of the full handshake (TLS + auth + charset), in ms
    pub fn handshake_duration(plugin: &str, millis: u64) {
        metrics::histogram!("mysql_wire_handshake_duration_ms", "plugin" => plugin.to_string())
            .record(millis as f64);
    }
}
