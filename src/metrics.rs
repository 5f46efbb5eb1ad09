//! Metrics collection and export module

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Dispatcher counters
    pub groups_submitted: IntCounter,
    pub groups_confirmed: IntCounter,
    pub groups_failed: IntCounter,
    pub resubmissions: IntCounter,
    pub blockhash_expired: IntCounter,
    pub execution_errors: IntCounter,

    /// Lifecycle calls by operation name and outcome
    pub lifecycle_calls: IntCounterVec,

    // Histograms
    pub confirmation_latency: Histogram,
    pub build_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let groups_submitted = IntCounter::with_opts(Opts::new(
            "swap_groups_submitted_total",
            "Operation groups signed and submitted",
        ))?;

        let groups_confirmed = IntCounter::with_opts(Opts::new(
            "swap_groups_confirmed_total",
            "Operation groups confirmed on the ledger",
        ))?;

        let groups_failed = IntCounter::with_opts(Opts::new(
            "swap_groups_failed_total",
            "Operation groups that ended in failure",
        ))?;

        let resubmissions = IntCounter::with_opts(Opts::new(
            "swap_resubmissions_total",
            "Resubmissions of a signed transaction not yet visible",
        ))?;

        let blockhash_expired = IntCounter::with_opts(Opts::new(
            "swap_blockhash_expired_total",
            "Groups abandoned because their blockhash window closed",
        ))?;

        let execution_errors = IntCounter::with_opts(Opts::new(
            "swap_execution_errors_total",
            "Groups rejected by the on-ledger program",
        ))?;

        let lifecycle_calls = IntCounterVec::new(
            Opts::new("swap_lifecycle_calls_total", "Lifecycle calls by outcome"),
            &["operation", "outcome"],
        )?;

        let confirmation_latency = Histogram::with_opts(
            HistogramOpts::new(
                "swap_group_confirmation_seconds",
                "Time from submission to confirmation of one group",
            )
            .buckets(vec![0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]),
        )?;

        let build_latency = Histogram::with_opts(
            HistogramOpts::new("swap_build_seconds", "Operation group build latency")
                .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
        )?;

        // Register all metrics
        registry.register(Box::new(groups_submitted.clone()))?;
        registry.register(Box::new(groups_confirmed.clone()))?;
        registry.register(Box::new(groups_failed.clone()))?;
        registry.register(Box::new(resubmissions.clone()))?;
        registry.register(Box::new(blockhash_expired.clone()))?;
        registry.register(Box::new(execution_errors.clone()))?;
        registry.register(Box::new(lifecycle_calls.clone()))?;
        registry.register(Box::new(confirmation_latency.clone()))?;
        registry.register(Box::new(build_latency.clone()))?;

        Ok(Self {
            registry,
            groups_submitted,
            groups_confirmed,
            groups_failed,
            resubmissions,
            blockhash_expired,
            execution_errors,
            lifecycle_calls,
            confirmation_latency,
            build_latency,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_lifecycle(&self, operation: &str, ok: bool) {
        let outcome = if ok { "ok" } else { "error" };
        self.lifecycle_calls
            .with_label_values(&[operation, outcome])
            .inc();
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.elapsed_secs());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        let m = Metrics::new().unwrap();
        m.groups_submitted.inc();
        m.record_lifecycle("deposit", true);
        let text = m.render().unwrap();
        assert!(text.contains("swap_groups_submitted_total 1"));
        assert!(text.contains("operation=\"deposit\""));
    }

    #[test]
    fn test_global_metrics_is_shared() {
        let before = metrics().resubmissions.get();
        metrics().resubmissions.inc();
        assert!(metrics().resubmissions.get() > before);
    }
}
