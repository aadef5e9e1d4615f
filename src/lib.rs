//! # emissions-predictor
//!
//! HTTP service predicting vehicle CO2 emissions (g/km) from a pre-trained
//! linear regression artifact.
//!
//! ## Architecture
//!
//! Per-request flow, all in-process:
//! ```text
//! JSON body → FeatureRecord → categorical codes → FeatureVector → model → rounded g/km
//! ```
//!
//! The five categorical columns are label-encoded with the vocabularies the
//! model was trained on. A label never seen in training is absorbed at
//! serving time: appended to its column's encoder and assigned the next
//! dense code. Growth is process-local and resets on restart.

// ── Lint policy (aerospace-grade) ─────────────────────────────────────────
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(missing_docs)]

use serde_json::Value;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub mod artifact;
pub mod config;
pub mod encoder;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod web_api;

// Re-exports for convenience
pub use encoder::{CategoricalEncoder, EncoderRegistry};
pub use model::{ConstantModel, LinearModel, RegressionModel};
pub use pipeline::PredictionPipeline;

/// Categorical feature columns, in the exact order the model was trained on.
///
/// This order is load-bearing: codes enter the feature vector in this order,
/// and the model artifact is rejected at startup if its recorded feature
/// names disagree.
pub const CATEGORICAL_COLUMNS: [&str; 5] = [
    "Make",
    "Model",
    "Vehicle Class",
    "Transmission",
    "Fuel Type",
];

/// JSON key for the engine displacement field, in liters.
pub const ENGINE_SIZE_FIELD: &str = "Engine Size(L)";

/// JSON key for the cylinder count field.
pub const CYLINDERS_FIELD: &str = "Cylinders";

/// Width of a complete feature vector: five categorical codes plus the two
/// numeric fields.
pub const FEATURE_COUNT: usize = CATEGORICAL_COLUMNS.len() + 2;

/// Initialise the global tracing subscriber.
///
/// Reads the `LOG_FORMAT` environment variable to choose output format:
/// - `"json"` — structured JSON output for production log aggregators
/// - anything else (including unset) — human-readable pretty output
///   for local development
///
/// Filter level is controlled by `RUST_LOG` (e.g. `RUST_LOG=info`).
///
/// # Errors
///
/// Returns [`PredictionError::Configuration`] if the global subscriber has
/// already been set (e.g. by a previous call or a test harness).
///
/// # Panics
///
/// This function never panics.
///
/// # Example
///
/// ```no_run
/// # use emissions_predictor::{init_tracing, PredictionError};
/// # fn example() -> Result<(), PredictionError> {
/// init_tracing()?;
/// # Ok(()) }
/// ```
pub fn init_tracing() -> Result<(), PredictionError> {
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let result = match format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .with_current_span(true)
            .with_span_list(true)
            .try_init(),
        _ => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init(),
    };

    result.map_err(|e| PredictionError::Configuration(format!("tracing init failed: {e}")))
}

/// Prediction-path errors.
///
/// `MissingField` and `TypeConversion` are client errors: the payload is
/// wrong and the offending field is named so the caller can fix it.
/// `Configuration` and `Inference` are server faults; their detail is logged
/// but never exposed to the caller.
#[derive(Error, Debug)]
pub enum PredictionError {
    /// A required field is absent from the request payload.
    #[error("missing required field: {field}")]
    MissingField {
        /// JSON key of the absent field.
        field: String,
    },

    /// A field is present but has the wrong type or an unparseable value.
    #[error("field '{field}' must be {expected}")]
    TypeConversion {
        /// JSON key of the offending field.
        field: String,
        /// What the field must hold.
        expected: &'static str,
    },

    /// Internal wiring problem: a schema column without an encoder, a
    /// subsystem initialised twice.
    ///
    /// Unreachable through the HTTP surface once startup validation has
    /// passed, which is why it maps to a 5xx rather than a client error.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The model rejected the feature vector or failed to score it.
    #[error("inference failed: {0}")]
    Inference(String),
}

impl PredictionError {
    /// Stable snake_case tag for metrics labels and span fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingField { .. } => "missing_field",
            Self::TypeConversion { .. } => "type_conversion",
            Self::Configuration(_) => "configuration",
            Self::Inference(_) => "inference",
        }
    }

    /// True when the caller sent a bad payload, false for server faults.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::MissingField { .. } | Self::TypeConversion { .. })
    }
}

/// One vehicle's attributes, validated and typed.
///
/// Ephemeral: built per request, never stored. Field names follow the
/// training dataset's column headers (see the JSON key constants above).
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    /// Manufacturer name.
    pub make: String,
    /// Model name.
    pub model: String,
    /// Body class, e.g. `COMPACT` or `SUV - SMALL`.
    pub vehicle_class: String,
    /// Transmission code, e.g. `AS5` or `M6`.
    pub transmission: String,
    /// Fuel type code, e.g. `X` or `Z`.
    pub fuel_type: String,
    /// Engine displacement in liters.
    pub engine_size: f64,
    /// Number of cylinders.
    pub cylinders: i64,
}

impl FeatureRecord {
    /// Extract a record from a JSON request body.
    ///
    /// All seven schema fields are required; unknown keys are ignored. The
    /// numeric fields accept JSON numbers and numeric strings, and a
    /// fractional cylinder count is truncated toward zero. The categorical
    /// fields must be JSON strings.
    ///
    /// # Errors
    ///
    /// [`PredictionError::MissingField`] or
    /// [`PredictionError::TypeConversion`] naming the first offending field
    /// in schema order.
    ///
    /// # Panics
    ///
    /// This function never panics.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use emissions_predictor::{FeatureRecord, PredictionError};
    /// # fn example() -> Result<(), PredictionError> {
    /// let record = FeatureRecord::from_json(&serde_json::json!({
    ///     "Make": "TOYOTA", "Model": "COROLLA", "Vehicle Class": "COMPACT",
    ///     "Transmission": "AS5", "Fuel Type": "X",
    ///     "Engine Size(L)": 1.8, "Cylinders": 4
    /// }))?;
    /// assert_eq!(record.cylinders, 4);
    /// # Ok(()) }
    /// ```
    pub fn from_json(payload: &Value) -> Result<Self, PredictionError> {
        Ok(Self {
            make: require_string(payload, CATEGORICAL_COLUMNS[0])?,
            model: require_string(payload, CATEGORICAL_COLUMNS[1])?,
            vehicle_class: require_string(payload, CATEGORICAL_COLUMNS[2])?,
            transmission: require_string(payload, CATEGORICAL_COLUMNS[3])?,
            fuel_type: require_string(payload, CATEGORICAL_COLUMNS[4])?,
            engine_size: require_f64(payload, ENGINE_SIZE_FIELD)?,
            cylinders: require_i64(payload, CYLINDERS_FIELD)?,
        })
    }

    /// The categorical columns paired with this record's values, in schema
    /// order. This is the order codes enter the feature vector.
    pub fn categorical_fields(&self) -> [(&'static str, &str); 5] {
        [
            (CATEGORICAL_COLUMNS[0], self.make.as_str()),
            (CATEGORICAL_COLUMNS[1], self.model.as_str()),
            (CATEGORICAL_COLUMNS[2], self.vehicle_class.as_str()),
            (CATEGORICAL_COLUMNS[3], self.transmission.as_str()),
            (CATEGORICAL_COLUMNS[4], self.fuel_type.as_str()),
        ]
    }
}

fn require_field<'a>(payload: &'a Value, field: &str) -> Result<&'a Value, PredictionError> {
    payload.get(field).ok_or_else(|| PredictionError::MissingField {
        field: field.to_string(),
    })
}

fn require_string(payload: &Value, field: &str) -> Result<String, PredictionError> {
    match require_field(payload, field)? {
        Value::String(s) => Ok(s.clone()),
        _ => Err(PredictionError::TypeConversion {
            field: field.to_string(),
            expected: "a string",
        }),
    }
}

fn require_f64(payload: &Value, field: &str) -> Result<f64, PredictionError> {
    let type_error = || PredictionError::TypeConversion {
        field: field.to_string(),
        expected: "a finite number",
    };
    let parsed = match require_field(payload, field)? {
        Value::Number(n) => n.as_f64().ok_or_else(type_error)?,
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| type_error())?,
        _ => return Err(type_error()),
    };
    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err(type_error())
    }
}

fn require_i64(payload: &Value, field: &str) -> Result<i64, PredictionError> {
    let type_error = || PredictionError::TypeConversion {
        field: field.to_string(),
        expected: "an integer",
    };
    match require_field(payload, field)? {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else if let Some(f) = n.as_f64() {
                // Fractional counts truncate toward zero.
                Ok(f.trunc() as i64)
            } else {
                Err(type_error())
            }
        }
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| type_error()),
        _ => Err(type_error()),
    }
}

/// Ordered numeric feature vector handed to the model.
///
/// Layout: the five categorical codes in [`CATEGORICAL_COLUMNS`] order,
/// then engine size, then cylinder count.
///
/// # Example
///
/// ```rust
/// use emissions_predictor::FeatureVector;
/// let vector = FeatureVector::new(vec![0.0, 2.0, 0.0, 1.0, 3.0, 2.0, 4.0]);
/// assert_eq!(vector.len(), 7);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(
    /// The raw feature values.
    pub Vec<f64>,
);

impl FeatureVector {
    /// Wrap raw feature values.
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    /// Borrow the values as a slice.
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the vector holds no features.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn complete_body() -> Value {
        json!({
            "Make": "TOYOTA",
            "Model": "COROLLA",
            "Vehicle Class": "COMPACT",
            "Transmission": "AS5",
            "Fuel Type": "X",
            "Engine Size(L)": 1.8,
            "Cylinders": 4
        })
    }

    #[test]
    fn test_from_json_complete_body_parses() {
        let record = FeatureRecord::from_json(&complete_body()).expect("complete body parses");
        assert_eq!(record.make, "TOYOTA");
        assert_eq!(record.fuel_type, "X");
        assert_eq!(record.engine_size, 1.8);
        assert_eq!(record.cylinders, 4);
    }

    #[test]
    fn test_from_json_missing_field_names_it() {
        let mut body = complete_body();
        body.as_object_mut()
            .expect("body is an object")
            .remove("Cylinders");
        let err = FeatureRecord::from_json(&body).expect_err("missing field rejected");
        match err {
            PredictionError::MissingField { field } => assert_eq!(field, "Cylinders"),
            other => panic!("expected MissingField, got {other:?}"),
        }
    }

    #[test]
    fn test_from_json_empty_body_reports_first_schema_field() {
        let err = FeatureRecord::from_json(&json!({})).expect_err("empty body rejected");
        match err {
            PredictionError::MissingField { field } => assert_eq!(field, "Make"),
            other => panic!("expected MissingField, got {other:?}"),
        }
    }

    #[test]
    fn test_from_json_coerces_numeric_strings() {
        let mut body = complete_body();
        body["Engine Size(L)"] = json!("2.4");
        body["Cylinders"] = json!("6");
        let record = FeatureRecord::from_json(&body).expect("numeric strings coerce");
        assert_eq!(record.engine_size, 2.4);
        assert_eq!(record.cylinders, 6);
    }

    #[test]
    fn test_from_json_truncates_fractional_cylinders() {
        let mut body = complete_body();
        body["Cylinders"] = json!(4.8);
        let record = FeatureRecord::from_json(&body).expect("fractional count truncates");
        assert_eq!(record.cylinders, 4);
    }

    #[test]
    fn test_from_json_rejects_non_string_categorical() {
        let mut body = complete_body();
        body["Make"] = json!(12);
        let err = FeatureRecord::from_json(&body).expect_err("numeric make rejected");
        match err {
            PredictionError::TypeConversion { field, .. } => assert_eq!(field, "Make"),
            other => panic!("expected TypeConversion, got {other:?}"),
        }
    }

    #[test]
    fn test_from_json_rejects_null_field() {
        let mut body = complete_body();
        body["Fuel Type"] = json!(null);
        let err = FeatureRecord::from_json(&body).expect_err("null field rejected");
        assert!(
            matches!(err, PredictionError::TypeConversion { ref field, .. } if field == "Fuel Type")
        );
    }

    #[test]
    fn test_from_json_rejects_unparseable_engine_size() {
        let mut body = complete_body();
        body["Engine Size(L)"] = json!("two liters");
        let err = FeatureRecord::from_json(&body).expect_err("prose engine size rejected");
        assert!(
            matches!(err, PredictionError::TypeConversion { ref field, .. } if field == "Engine Size(L)")
        );
    }

    #[test]
    fn test_from_json_rejects_fractional_cylinder_string() {
        let mut body = complete_body();
        body["Cylinders"] = json!("4.5");
        let err = FeatureRecord::from_json(&body).expect_err("fractional string rejected");
        assert!(
            matches!(err, PredictionError::TypeConversion { ref field, .. } if field == "Cylinders")
        );
    }

    #[test]
    fn test_from_json_rejects_non_finite_engine_size_string() {
        let mut body = complete_body();
        body["Engine Size(L)"] = json!("NaN");
        let err = FeatureRecord::from_json(&body).expect_err("NaN engine size rejected");
        assert!(
            matches!(err, PredictionError::TypeConversion { ref field, .. } if field == "Engine Size(L)")
        );
    }

    #[test]
    fn test_from_json_ignores_unknown_keys() {
        let mut body = complete_body();
        body["Fuel Consumption Comb (L/100 km)"] = json!(8.5);
        assert!(FeatureRecord::from_json(&body).is_ok());
    }

    #[test]
    fn test_categorical_fields_follow_schema_order() {
        let record = FeatureRecord::from_json(&complete_body()).expect("complete body parses");
        let fields = record.categorical_fields();
        let columns: Vec<&str> = fields.iter().map(|(column, _)| *column).collect();
        assert_eq!(columns, CATEGORICAL_COLUMNS.to_vec());
        assert_eq!(fields[0].1, "TOYOTA");
        assert_eq!(fields[4].1, "X");
    }

    #[test]
    fn test_feature_vector_accessors() {
        let vector = FeatureVector::new(vec![0.0, 2.0, 0.0, 1.0, 3.0, 2.0, 4.0]);
        assert_eq!(vector.len(), FEATURE_COUNT);
        assert!(!vector.is_empty());
        assert_eq!(vector.as_slice()[5], 2.0);
    }

    #[test]
    fn test_error_kinds_are_stable_tags() {
        let missing = PredictionError::MissingField {
            field: "Make".into(),
        };
        let inference = PredictionError::Inference("boom".into());
        assert_eq!(missing.kind(), "missing_field");
        assert_eq!(inference.kind(), "inference");
        assert!(missing.is_client_error());
        assert!(!inference.is_client_error());
    }

    #[test]
    fn test_error_display_names_field() {
        let err = PredictionError::MissingField {
            field: "Fuel Type".into(),
        };
        assert!(err.to_string().contains("Fuel Type"));
    }

    #[test]
    fn test_init_tracing_second_call_returns_err() {
        // First call may succeed or fail depending on test execution order
        // (another test may have already installed a subscriber).
        let _ = init_tracing();
        // Second call must not panic — it should return Err.
        let result = init_tracing();
        assert!(result.is_err(), "double init must return Err, not panic");
    }
}
