//! Prometheus metrics for the puzzle pipeline.
//!
//! All metrics live in a [`ForgeMetrics`] instance that owns its own
//! `prometheus::Registry`. Construct one at process start and hand it to the
//! components that record into it as `Arc<ForgeMetrics>`.
//!
//! # Example
//!
//! ```ignore
//! use puzzle_forge::metrics::ForgeMetrics;
//!
//! let metrics = ForgeMetrics::new()?;
//! metrics.record_attempt("accepted");
//! println!("{}", metrics.export());
//! ```

use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Metric name prefix.
const NAMESPACE: &str = "puzzle_forge";

/// Pipeline metrics bound to a private registry.
#[derive(Clone)]
pub struct ForgeMetrics {
    registry: Registry,
    attempts_total: IntCounterVec,
    runs_total: IntCounterVec,
    final_score: Histogram,
    llm_calls_total: IntCounterVec,
    llm_latency: HistogramVec,
}

impl ForgeMetrics {
    /// Creates and registers every pipeline metric.
    ///
    /// # Errors
    ///
    /// Returns a `prometheus::Error` if a metric definition is invalid.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some(NAMESPACE.to_string()), None)?;

        let attempts_total = IntCounterVec::new(
            Opts::new("attempts_total", "Orchestrator attempts by outcome"),
            &["outcome"],
        )?;

        let runs_total = IntCounterVec::new(
            Opts::new("runs_total", "Orchestration runs by result"),
            &["result"],
        )?;

        let final_score = Histogram::with_opts(
            HistogramOpts::new("final_score", "Final quality score of scored attempts")
                .buckets(vec![40.0, 50.0, 60.0, 70.0, 80.0, 85.0, 90.0, 95.0, 100.0]),
        )?;

        let llm_calls_total = IntCounterVec::new(
            Opts::new("llm_calls_total", "Structured LLM calls by stage and status"),
            &["stage", "status"],
        )?;

        let llm_latency = HistogramVec::new(
            HistogramOpts::new("llm_latency_seconds", "Structured LLM call latency in seconds")
                .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
            &["stage"],
        )?;

        registry.register(Box::new(attempts_total.clone()))?;
        registry.register(Box::new(runs_total.clone()))?;
        registry.register(Box::new(final_score.clone()))?;
        registry.register(Box::new(llm_calls_total.clone()))?;
        registry.register(Box::new(llm_latency.clone()))?;

        Ok(Self {
            registry,
            attempts_total,
            runs_total,
            final_score,
            llm_calls_total,
            llm_latency,
        })
    }

    /// Records one orchestrator attempt (`accepted`, `duplicate`, `below_threshold`, `failed`).
    pub fn record_attempt(&self, outcome: &str) {
        self.attempts_total.with_label_values(&[outcome]).inc();
    }

    /// Records a finished orchestration run (`accepted`, `degraded`, `exhausted`, `quota`).
    pub fn record_run(&self, result: &str) {
        self.runs_total.with_label_values(&[result]).inc();
    }

    /// Observes the final score of a fully scored attempt.
    pub fn observe_final_score(&self, score: f64) {
        self.final_score.observe(score);
    }

    /// Records a single provider call for a pipeline stage.
    pub fn record_llm_call(&self, stage: &str, status: &str, latency_secs: f64) {
        self.llm_calls_total
            .with_label_values(&[stage, status])
            .inc();
        self.llm_latency
            .with_label_values(&[stage])
            .observe(latency_secs);
    }

    /// Current count for an attempt outcome.
    pub fn attempts(&self, outcome: &str) -> u64 {
        self.attempts_total.with_label_values(&[outcome]).get()
    }

    /// Current count for a run result.
    pub fn runs(&self, result: &str) -> u64 {
        self.runs_total.with_label_values(&[result]).get()
    }

    /// Current count of LLM calls for a stage and status.
    pub fn llm_calls(&self, stage: &str, status: &str) -> u64 {
        self.llm_calls_total
            .with_label_values(&[stage, status])
            .get()
    }

    /// The underlying registry, for mounting on an exporter.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Exports all metrics in Prometheus text format.
    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!(error = %e, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl std::fmt::Debug for ForgeMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForgeMetrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instances_are_independent() {
        let a = ForgeMetrics::new().expect("metrics should register");
        let b = ForgeMetrics::new().expect("second registry should not collide");

        a.record_attempt("accepted");
        a.record_attempt("accepted");

        assert_eq!(a.attempts("accepted"), 2);
        assert_eq!(b.attempts("accepted"), 0);
    }

    #[test]
    fn test_export_contains_namespaced_metrics() {
        let metrics = ForgeMetrics::new().expect("metrics should register");
        metrics.record_run("degraded");
        metrics.observe_final_score(72.0);
        metrics.record_llm_call("quality_review", "ok", 1.2);

        let text = metrics.export();
        assert!(text.contains("puzzle_forge_runs_total"));
        assert!(text.contains("result=\"degraded\""));
        assert!(text.contains("puzzle_forge_final_score_bucket"));
        assert!(text.contains("puzzle_forge_llm_latency_seconds"));
        assert_eq!(metrics.llm_calls("quality_review", "ok"), 1);
    }
}
