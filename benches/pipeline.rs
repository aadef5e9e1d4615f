//! Serving-path benchmarks.
//!
//! Measures the per-request overhead of the prediction path in isolation:
//! payload parsing, label encoding through the read-lock fast path, and a
//! full predict against the linear model.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use tokio::runtime::Runtime;

use emissions_predictor::encoder::{CategoricalEncoder, EncoderRegistry};
use emissions_predictor::model::{LinearModel, RegressionModel};
use emissions_predictor::pipeline::PredictionPipeline;
use emissions_predictor::{FeatureRecord, CATEGORICAL_COLUMNS};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Registry with 64 trained labels per column, so encode() always hits the
/// read-lock fast path.
fn bench_registry() -> EncoderRegistry {
    let encoders = CATEGORICAL_COLUMNS
        .iter()
        .map(|column| {
            let labels = (0..64).map(|i| format!("L{i}")).collect();
            CategoricalEncoder::new(*column, labels)
        })
        .collect();
    EncoderRegistry::new(encoders).expect("registry")
}

fn bench_record() -> FeatureRecord {
    FeatureRecord {
        make: "L7".to_string(),
        model: "L13".to_string(),
        vehicle_class: "L2".to_string(),
        transmission: "L5".to_string(),
        fuel_type: "L1".to_string(),
        engine_size: 2.4,
        cylinders: 6,
    }
}

// ---------------------------------------------------------------------------
// Bench: payload parsing — JSON object to FeatureRecord
// ---------------------------------------------------------------------------

fn bench_record_from_json(c: &mut Criterion) {
    let payload = serde_json::json!({
        "Make": "L7",
        "Model": "L13",
        "Vehicle Class": "L2",
        "Transmission": "L5",
        "Fuel Type": "L1",
        "Engine Size(L)": 2.4,
        "Cylinders": 6
    });

    c.bench_function("feature_record_from_json", |b| {
        b.iter(|| black_box(FeatureRecord::from_json(black_box(&payload)).expect("parse")))
    });
}

// ---------------------------------------------------------------------------
// Bench: encode a known label — read-lock fast path
// ---------------------------------------------------------------------------

fn bench_encode_known(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let registry = Arc::new(bench_registry());

    c.bench_function("encode_known_label", |b| {
        b.to_async(&rt).iter(|| {
            let registry = Arc::clone(&registry);
            async move {
                black_box(
                    registry
                        .encode("Make", black_box("L7"))
                        .await
                        .expect("encode"),
                )
            }
        })
    });
}

// ---------------------------------------------------------------------------
// Bench: full predict — encode all columns plus model scoring
// ---------------------------------------------------------------------------

fn bench_predict(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let model: Arc<dyn RegressionModel> = Arc::new(LinearModel::new(
        vec![0.4, 0.003, 1.2, -0.3, -6.4, 31.8, 7.9],
        68.3,
    ));
    let pipeline = PredictionPipeline::new(Arc::new(bench_registry()), model);
    let record = bench_record();

    c.bench_function("pipeline_predict", |b| {
        b.to_async(&rt).iter(|| {
            let pipeline = pipeline.clone();
            let record = record.clone();
            async move { black_box(pipeline.predict(&record).await.expect("predict")) }
        })
    });
}

criterion_group!(
    pipeline_benches,
    bench_record_from_json,
    bench_encode_known,
    bench_predict,
);
criterion_main!(pipeline_benches);
