/// Prometheus metrics for prediction serving, model loading and training.
///
/// All metrics live in a single process-wide registry and are exposed in the
/// text format by [`gather_metrics`].
///
/// # Example
/// ```no_run
/// use url_sentinel::metrics::PREDICTIONS_TOTAL;
///
/// PREDICTIONS_TOTAL.with_label_values(&["good"]).inc();
/// ```
use lazy_static::lazy_static;
use prometheus::{CounterVec, Gauge, Histogram, HistogramOpts, Opts, Registry};

const NAMESPACE: &str = "url_sentinel";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    // ============================================================================
    // Serving Metrics
    // ============================================================================

    /// Predictions served
    ///
    /// Labels: label (good, bad)
    pub static ref PREDICTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("predictions_total", "Total number of predictions served")
            .namespace(NAMESPACE),
        &["label"]
    ).expect("Failed to create PREDICTIONS_TOTAL metric");

    /// Failed prediction requests
    ///
    /// Labels: reason (model_unavailable, inference)
    pub static ref PREDICTION_ERRORS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("prediction_errors_total", "Total number of failed predictions")
            .namespace(NAMESPACE),
        &["reason"]
    ).expect("Failed to create PREDICTION_ERRORS_TOTAL metric");

    /// End-to-end prediction latency including feature extraction
    pub static ref PREDICTION_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "prediction_duration_seconds",
            "Prediction latency in seconds, extraction included"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0])
    ).expect("Failed to create PREDICTION_DURATION_SECONDS metric");

    /// Feedback rows appended to the train corpus
    ///
    /// Labels: outcome (ok, error)
    pub static ref FEEDBACK_WRITES_TOTAL: CounterVec = CounterVec::new(
        Opts::new("feedback_writes_total", "Total number of feedback row writes")
            .namespace(NAMESPACE),
        &["outcome"]
    ).expect("Failed to create FEEDBACK_WRITES_TOTAL metric");

    /// Feature lookups by outcome
    ///
    /// Labels: lookup (dns, whois, geo, page, script), outcome (ok, timeout, error)
    pub static ref EXTRACTION_LOOKUPS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("extraction_lookups_total", "Total number of feature lookups")
            .namespace(NAMESPACE),
        &["lookup", "outcome"]
    ).expect("Failed to create EXTRACTION_LOOKUPS_TOTAL metric");

    // ============================================================================
    // Model Lifecycle Metrics
    // ============================================================================

    /// Active pipeline loads
    ///
    /// Labels: outcome (loaded, unchanged, failed)
    pub static ref MODEL_LOADS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("model_loads_total", "Total number of pipeline load attempts")
            .namespace(NAMESPACE),
        &["outcome"]
    ).expect("Failed to create MODEL_LOADS_TOTAL metric");

    /// 1 while a pipeline is loaded
    pub static ref MODEL_LOADED: Gauge = Gauge::with_opts(
        Opts::new("model_loaded", "Whether a pipeline is ready to serve")
            .namespace(NAMESPACE)
    ).expect("Failed to create MODEL_LOADED metric");

    /// Training runs
    ///
    /// Labels: outcome (published, failed)
    pub static ref TRAINING_RUNS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("training_runs_total", "Total number of training runs")
            .namespace(NAMESPACE),
        &["outcome"]
    ).expect("Failed to create TRAINING_RUNS_TOTAL metric");

    /// Training run duration
    pub static ref TRAINING_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new("training_duration_seconds", "Training run duration in seconds")
            .namespace(NAMESPACE)
            .buckets(vec![1.0, 10.0, 60.0, 300.0, 900.0, 1800.0, 3600.0, 7200.0])
    ).expect("Failed to create TRAINING_DURATION_SECONDS metric");
}

/// Register every metric with the global registry.
///
/// Safe to call more than once; metrics already registered are skipped.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(PREDICTIONS_TOTAL.clone()),
        Box::new(PREDICTION_ERRORS_TOTAL.clone()),
        Box::new(PREDICTION_DURATION_SECONDS.clone()),
        Box::new(FEEDBACK_WRITES_TOTAL.clone()),
        Box::new(EXTRACTION_LOOKUPS_TOTAL.clone()),
        Box::new(MODEL_LOADS_TOTAL.clone()),
        Box::new(MODEL_LOADED.clone()),
        Box::new(TRAINING_RUNS_TOTAL.clone()),
        Box::new(TRAINING_DURATION_SECONDS.clone()),
    ];

    for collector in collectors {
        match PROMETHEUS_REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_repeatable() {
        assert!(init_metrics().is_ok());
        assert!(init_metrics().is_ok());
    }

    #[test]
    fn test_prediction_counter() {
        PREDICTIONS_TOTAL.with_label_values(&["bad"]).inc();

        let value = PREDICTIONS_TOTAL.with_label_values(&["bad"]).get();
        assert!(value >= 1.0);
    }

    #[test]
    fn test_gather_contains_namespace() {
        init_metrics().unwrap();
        MODEL_LOADS_TOTAL.with_label_values(&["failed"]).inc();

        let text = gather_metrics();
        assert!(text.contains("url_sentinel_model_loads_total"));
    }
}
