//! Prometheus metrics for the prediction service.
//!
//! ## Usage
//!
//! Call [`init_metrics`] once at process startup **before** serving traffic.
//! The helper functions (`record_stage_latency`, `inc_request`, …) are no-ops
//! if `init_metrics` was never called, so the pipeline is always safe to
//! run — observability simply degrades gracefully.
//!
//! ## Metrics Exposed
//!
//! | Name | Type | Labels |
//! |------|------|--------|
//! | `emissions_requests_total` | Counter | `endpoint` |
//! | `emissions_errors_total` | Counter | `endpoint`, `err_type` |
//! | `emissions_stage_duration_seconds` | Histogram | `stage` |
//! | `emissions_vocabulary_size` | Gauge | `column` |
//! | `emissions_unseen_labels_total` | Counter | `column` |

use crate::PredictionError;
use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;
use std::time::Duration;

// ── Internal metrics bundle ────────────────────────────────────────────────

/// All Prometheus metrics for the service, bundled together so they can be
/// stored in a single [`OnceLock`] and initialised atomically.
pub struct Metrics {
    /// Prometheus registry that owns all metric descriptors.
    pub registry: Registry,
    /// Total requests received per endpoint.
    pub requests_total: CounterVec,
    /// Errors by endpoint and error kind.
    pub errors_total: CounterVec,
    /// Processing latency per pipeline stage (encode, inference).
    pub stage_duration: HistogramVec,
    /// Current number of known labels per categorical column.
    pub vocabulary_size: IntGaugeVec,
    /// Labels absorbed at serving time per categorical column.
    pub unseen_labels_total: CounterVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

// ── Initialisation ─────────────────────────────────────────────────────────

/// Initialise all Prometheus metrics and register them with a private registry.
///
/// Must be called once at process startup before the server starts accepting
/// requests. Calling it a second time is a no-op (returns `Ok(())`).
///
/// # Errors
///
/// Returns [`PredictionError::Configuration`] if metric construction or
/// registry registration fails (e.g., duplicate descriptor names).
///
/// # Panics
///
/// This function never panics.
pub fn init_metrics() -> Result<(), PredictionError> {
    if METRICS.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let requests_total = CounterVec::new(
        Opts::new("emissions_requests_total", "Total requests received"),
        &["endpoint"],
    )
    .map_err(|e| PredictionError::Configuration(format!("metrics init failed: {e}")))?;
    registry
        .register(Box::new(requests_total.clone()))
        .map_err(|e| PredictionError::Configuration(format!("metrics registration failed: {e}")))?;

    let errors_total = CounterVec::new(
        Opts::new("emissions_errors_total", "Errors by endpoint and kind"),
        &["endpoint", "err_type"],
    )
    .map_err(|e| PredictionError::Configuration(format!("metrics init failed: {e}")))?;
    registry
        .register(Box::new(errors_total.clone()))
        .map_err(|e| PredictionError::Configuration(format!("metrics registration failed: {e}")))?;

    let stage_duration = HistogramVec::new(
        HistogramOpts::new(
            "emissions_stage_duration_seconds",
            "Processing duration per pipeline stage",
        ),
        &["stage"],
    )
    .map_err(|e| PredictionError::Configuration(format!("metrics init failed: {e}")))?;
    registry
        .register(Box::new(stage_duration.clone()))
        .map_err(|e| PredictionError::Configuration(format!("metrics registration failed: {e}")))?;

    let vocabulary_size = IntGaugeVec::new(
        Opts::new(
            "emissions_vocabulary_size",
            "Known labels per categorical column",
        ),
        &["column"],
    )
    .map_err(|e| PredictionError::Configuration(format!("metrics init failed: {e}")))?;
    registry
        .register(Box::new(vocabulary_size.clone()))
        .map_err(|e| PredictionError::Configuration(format!("metrics registration failed: {e}")))?;

    let unseen_labels_total = CounterVec::new(
        Opts::new(
            "emissions_unseen_labels_total",
            "Labels absorbed at serving time per column",
        ),
        &["column"],
    )
    .map_err(|e| PredictionError::Configuration(format!("metrics init failed: {e}")))?;
    registry
        .register(Box::new(unseen_labels_total.clone()))
        .map_err(|e| PredictionError::Configuration(format!("metrics registration failed: {e}")))?;

    // If another thread raced us, the first one wins; both initializations
    // produce identical metric descriptors, so neither outcome is incorrect.
    let _ = METRICS.set(Metrics {
        registry,
        requests_total,
        errors_total,
        stage_duration,
        vocabulary_size,
        unseen_labels_total,
    });

    Ok(())
}

/// Return a reference to the initialised [`Metrics`], or `None` if
/// [`init_metrics`] has not been called yet.
fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

// ── Public helper functions ────────────────────────────────────────────────

/// Record the processing latency for a pipeline stage.
///
/// No-op if metrics have not been initialised.
///
/// # Panics
///
/// This function never panics.
pub fn record_stage_latency(stage: &str, d: Duration) {
    if let Some(m) = metrics() {
        if let Ok(h) = m.stage_duration.get_metric_with_label_values(&[stage]) {
            h.observe(d.as_secs_f64());
        }
    }
}

/// Increment the request counter for an endpoint.
///
/// No-op if metrics have not been initialised.
///
/// # Panics
///
/// This function never panics.
pub fn inc_request(endpoint: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m.requests_total.get_metric_with_label_values(&[endpoint]) {
            c.inc();
        }
    }
}

/// Increment the error counter for an endpoint and error kind.
///
/// No-op if metrics have not been initialised.
///
/// # Panics
///
/// This function never panics.
pub fn inc_error(endpoint: &str, err_type: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m
            .errors_total
            .get_metric_with_label_values(&[endpoint, err_type])
        {
            c.inc();
        }
    }
}

/// Set the vocabulary-size gauge for a categorical column.
///
/// No-op if metrics have not been initialised.
///
/// # Panics
///
/// This function never panics.
pub fn set_vocabulary_size(column: &str, size: i64) {
    if let Some(m) = metrics() {
        if let Ok(g) = m.vocabulary_size.get_metric_with_label_values(&[column]) {
            g.set(size);
        }
    }
}

/// Increment the unseen-label counter for a categorical column.
///
/// No-op if metrics have not been initialised.
///
/// # Panics
///
/// This function never panics.
pub fn inc_unseen_label(column: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m
            .unseen_labels_total
            .get_metric_with_label_values(&[column])
        {
            c.inc();
        }
    }
}

/// Gather all registered metrics as a raw list of metric families.
///
/// Returns an empty `Vec` if metrics have not been initialised.
///
/// # Panics
///
/// This function never panics.
pub fn gather() -> Vec<prometheus::proto::MetricFamily> {
    metrics().map_or_else(Vec::new, |m| m.registry.gather())
}

/// Gather and encode all metrics in the Prometheus text exposition format.
///
/// Returns an empty string if metrics have not been initialised or if
/// encoding fails. Observability degrades gracefully rather than panicking.
///
/// # Panics
///
/// This function never panics.
pub fn gather_metrics() -> String {
    let families = gather();
    if families.is_empty() {
        return String::new();
    }
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
