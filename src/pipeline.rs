//! The serving pipeline: record → codes → vector → model → rounded score.
//!
//! ## Responsibility
//!
//! - Encode the five categorical columns in schema order
//! - Assemble the feature vector (codes, then engine size, then cylinders)
//! - Invoke the model and round its score to two decimals
//!
//! ## Guarantees
//!
//! - Field validation completes before the model is touched: a missing or
//!   mistyped field can never reach inference
//! - Identical records yield identical predictions (the model is
//!   deterministic and the registry only ever appends)
//! - Inference failures are logged with the offending feature vector
//!   (numeric codes only, no request content)

use std::sync::Arc;
use std::time::Instant;

use tracing::error;

use crate::encoder::EncoderRegistry;
use crate::model::RegressionModel;
use crate::{metrics, FeatureRecord, FeatureVector, PredictionError, FEATURE_COUNT};

/// Shared serving pipeline. Cloning is cheap: both ends are `Arc`s.
#[derive(Clone)]
pub struct PredictionPipeline {
    registry: Arc<EncoderRegistry>,
    model: Arc<dyn RegressionModel>,
}

impl PredictionPipeline {
    /// Wire a registry and a model together.
    pub fn new(registry: Arc<EncoderRegistry>, model: Arc<dyn RegressionModel>) -> Self {
        Self { registry, model }
    }

    /// Score one validated record.
    ///
    /// # Errors
    ///
    /// [`PredictionError::Configuration`] if the registry is missing a
    /// schema column, [`PredictionError::Inference`] if the model rejects
    /// the vector or fails to score it.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub async fn predict(&self, record: &FeatureRecord) -> Result<f64, PredictionError> {
        let encode_start = Instant::now();
        let mut values = Vec::with_capacity(FEATURE_COUNT);
        for (column, label) in record.categorical_fields() {
            let code = self.registry.encode(column, label).await?;
            values.push(code as f64);
        }
        values.push(record.engine_size);
        values.push(record.cylinders as f64);
        let features = FeatureVector::new(values);
        metrics::record_stage_latency("encode", encode_start.elapsed());

        let infer_start = Instant::now();
        let score = match self.model.predict(&features).await {
            Ok(score) => score,
            Err(err) => {
                error!(
                    target: "emissions::pipeline",
                    features = ?features.as_slice(),
                    error = %err,
                    "model invocation failed"
                );
                return Err(err);
            }
        };
        metrics::record_stage_latency("inference", infer_start.elapsed());

        Ok(round2(score))
    }

    /// Parse a JSON body into a record and score it.
    ///
    /// # Errors
    ///
    /// [`PredictionError::MissingField`] / [`PredictionError::TypeConversion`]
    /// for payload problems, plus everything [`Self::predict`] returns.
    pub async fn predict_json(&self, payload: &serde_json::Value) -> Result<f64, PredictionError> {
        let record = FeatureRecord::from_json(payload)?;
        self.predict(&record).await
    }
}

/// Round to two decimals, halves away from zero.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::CategoricalEncoder;
    use crate::model::{ConstantModel, LinearModel};
    use crate::CATEGORICAL_COLUMNS;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records the vector it was handed and returns a fixed score.
    struct CapturingModel {
        seen: Mutex<Option<Vec<f64>>>,
        value: f64,
    }

    impl CapturingModel {
        fn new(value: f64) -> Self {
            Self {
                seen: Mutex::new(None),
                value,
            }
        }
    }

    #[async_trait]
    impl RegressionModel for CapturingModel {
        async fn predict(&self, features: &FeatureVector) -> Result<f64, PredictionError> {
            *self.seen.lock().expect("capture lock") = Some(features.as_slice().to_vec());
            Ok(self.value)
        }

        fn feature_count(&self) -> usize {
            FEATURE_COUNT
        }
    }

    /// Counts invocations; the missing-field tests assert it stays at zero.
    struct CountingModel {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RegressionModel for CountingModel {
        async fn predict(&self, _features: &FeatureVector) -> Result<f64, PredictionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(0.0)
        }

        fn feature_count(&self) -> usize {
            FEATURE_COUNT
        }
    }

    fn labels(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|label| label.to_string()).collect()
    }

    /// Vocabularies sized so the example record below encodes to
    /// `[0, 2, 0, 1, 3]`.
    fn example_registry() -> Arc<EncoderRegistry> {
        let encoders = vec![
            CategoricalEncoder::new("Make", labels(&["TOYOTA", "HONDA"])),
            CategoricalEncoder::new("Model", labels(&["CIVIC", "CAMRY", "COROLLA"])),
            CategoricalEncoder::new("Vehicle Class", labels(&["COMPACT", "MID-SIZE"])),
            CategoricalEncoder::new("Transmission", labels(&["AS5", "M6"])),
            CategoricalEncoder::new("Fuel Type", labels(&["X", "Z", "D", "E"])),
        ];
        Arc::new(EncoderRegistry::new(encoders).expect("all schema columns supplied"))
    }

    fn example_record() -> FeatureRecord {
        FeatureRecord {
            make: "TOYOTA".to_string(),
            model: "COROLLA".to_string(),
            vehicle_class: "COMPACT".to_string(),
            transmission: "M6".to_string(),
            fuel_type: "E".to_string(),
            engine_size: 2.0,
            cylinders: 4,
        }
    }

    #[tokio::test]
    async fn test_predict_assembles_vector_in_schema_order() {
        let model = Arc::new(CapturingModel::new(210.0));
        let shared: Arc<dyn RegressionModel> = Arc::clone(&model);
        let pipeline = PredictionPipeline::new(example_registry(), shared);

        let prediction = pipeline
            .predict(&example_record())
            .await
            .expect("example record scores");

        assert_eq!(prediction, 210.0);
        let seen = model.seen.lock().expect("capture lock").clone();
        assert_eq!(seen, Some(vec![0.0, 2.0, 0.0, 1.0, 3.0, 2.0, 4.0]));
    }

    #[tokio::test]
    async fn test_predict_rounds_to_two_decimals() {
        let registry = example_registry();
        let cases = [(123.456, 123.46), (0.125, 0.13), (-0.125, -0.13), (210.0, 210.0)];
        for (raw, expected) in cases {
            let pipeline =
                PredictionPipeline::new(Arc::clone(&registry), Arc::new(ConstantModel::new(raw)));
            let prediction = pipeline
                .predict(&example_record())
                .await
                .expect("record scores");
            assert_eq!(prediction, expected, "raw score {raw}");
        }
    }

    #[tokio::test]
    async fn test_predict_is_deterministic() {
        let pipeline = PredictionPipeline::new(
            example_registry(),
            Arc::new(LinearModel::new(
                vec![0.4, 0.003, 1.2, -0.3, -6.4, 31.8, 7.9],
                68.3,
            )),
        );
        let record = example_record();
        let first = pipeline.predict(&record).await.expect("record scores");
        let second = pipeline.predict(&record).await.expect("record scores");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_predict_json_missing_field_never_reaches_model() {
        let model = Arc::new(CountingModel {
            calls: AtomicUsize::new(0),
        });
        let shared: Arc<dyn RegressionModel> = Arc::clone(&model);
        let pipeline = PredictionPipeline::new(example_registry(), shared);

        let mut body = json!({
            "Make": "TOYOTA",
            "Model": "COROLLA",
            "Vehicle Class": "COMPACT",
            "Transmission": "M6",
            "Fuel Type": "E",
            "Engine Size(L)": 2.0,
            "Cylinders": 4
        });
        body.as_object_mut()
            .expect("body is an object")
            .remove("Fuel Type");

        let err = pipeline
            .predict_json(&body)
            .await
            .expect_err("missing field rejected");
        assert!(
            matches!(err, PredictionError::MissingField { ref field } if field == "Fuel Type")
        );
        assert_eq!(
            model.calls.load(Ordering::SeqCst),
            0,
            "validation must fail before inference"
        );
    }

    #[tokio::test]
    async fn test_predict_novel_label_extends_vocabulary_then_reuses_it() {
        // Weight only the Make code so the prediction reveals it.
        let mut weights = vec![0.0; FEATURE_COUNT];
        weights[0] = 1.0;
        let registry = example_registry();
        let pipeline =
            PredictionPipeline::new(Arc::clone(&registry), Arc::new(LinearModel::new(weights, 0.0)));

        let mut record = example_record();
        record.make = "TESLA".to_string();

        let first = pipeline.predict(&record).await.expect("novel make scores");
        assert_eq!(first, 2.0, "novel label takes the next dense code");
        assert_eq!(
            registry.vocabulary_size("Make").await.expect("schema column"),
            3
        );

        let second = pipeline.predict(&record).await.expect("known make scores");
        assert_eq!(second, 2.0, "the absorbed label keeps its code");
        assert_eq!(
            registry.vocabulary_size("Make").await.expect("schema column"),
            3
        );
    }

    #[tokio::test]
    async fn test_predict_inference_failure_propagates() {
        // A model trained on a different width rejects every vector.
        let pipeline = PredictionPipeline::new(
            example_registry(),
            Arc::new(LinearModel::new(vec![1.0, 2.0], 0.0)),
        );
        let err = pipeline
            .predict(&example_record())
            .await
            .expect_err("width mismatch surfaces");
        assert_eq!(err.kind(), "inference");
    }

    #[test]
    fn test_round2_halves_away_from_zero() {
        assert_eq!(round2(0.005), 0.01);
        assert_eq!(round2(-0.005), -0.01);
        assert_eq!(round2(186.90500000000003), 186.91);
        assert_eq!(round2(42.0), 42.0);
    }
}
