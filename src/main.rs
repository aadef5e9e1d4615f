//! Service binary for emissions-predictor.
//!
//! Loads the model and encoder artifacts, then serves the prediction API.
//!
//! ## Usage
//!
//! ```text
//! emissions-predictor [--config <path>]
//! ```
//!
//! ## Environment Variables
//!
//! - `LOG_FORMAT=json` — structured JSON output (production)
//! - `RUST_LOG=info` — log level filter (default: info)
//! - `PORT=8080` — overrides `server.port` from the config file

use std::path::{Path, PathBuf};
use std::sync::Arc;

use emissions_predictor::config::{loader, ServiceConfig};
use emissions_predictor::model::RegressionModel;
use emissions_predictor::pipeline::PredictionPipeline;
use emissions_predictor::{artifact, init_tracing, metrics, web_api, CATEGORICAL_COLUMNS};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured tracing (JSON or pretty, based on LOG_FORMAT env)
    let _ = init_tracing();

    // Initialize Prometheus metrics registry before the server starts.
    metrics::init_metrics()?;

    let mut config = match config_path()? {
        Some(path) => {
            info!(
                target: "emissions::startup",
                path = %path.display(),
                "loading configuration file"
            );
            loader::load_from_file(&path)?
        }
        None => ServiceConfig::default(),
    };
    loader::apply_env_overrides(&mut config)?;

    info!(
        target: "emissions::startup",
        service = %config.service.name,
        version = %config.service.version,
        "starting emissions predictor"
    );

    let model = artifact::load_model(Path::new(&config.artifacts.model_path)).map_err(|e| {
        error!(target: "emissions::startup", error = %e, "model artifact rejected");
        e
    })?;
    info!(
        target: "emissions::startup",
        path = %config.artifacts.model_path,
        features = model.feature_count(),
        intercept = model.intercept(),
        "model loaded"
    );

    let registry = artifact::load_encoders(Path::new(&config.artifacts.encoders_path)).map_err(
        |e| {
            error!(target: "emissions::startup", error = %e, "encoders artifact rejected");
            e
        },
    )?;
    let registry = Arc::new(registry);

    // Seed the vocabulary gauges so /metrics reflects the trained sizes
    // before the first request arrives.
    for column in CATEGORICAL_COLUMNS {
        let size = registry.vocabulary_size(column).await?;
        metrics::set_vocabulary_size(column, size as i64);
        info!(
            target: "emissions::startup",
            column,
            vocabulary = size,
            "encoder loaded"
        );
    }

    let pipeline = PredictionPipeline::new(registry, Arc::new(model));

    web_api::start_server(config.server, pipeline).await?;

    Ok(())
}

/// Parse the optional `--config <path>` argument.
///
/// No arguments means "run with built-in defaults"; anything other than the
/// single recognized flag aborts with a usage message.
fn config_path() -> Result<Option<PathBuf>, String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [] => Ok(None),
        [flag, path] if flag.as_str() == "--config" => Ok(Some(PathBuf::from(path))),
        _ => Err("usage: emissions-predictor [--config <path>]".to_string()),
    }
}
