//! Startup artifacts: the trained model and the encoder vocabularies.
//!
//! Both load exactly once, before the listener binds. A missing or
//! malformed artifact aborts startup; nothing here is re-read at serving
//! time, so a running process can never observe a half-loaded model.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::encoder::{CategoricalEncoder, EncoderRegistry};
use crate::model::LinearModel;
use crate::{CATEGORICAL_COLUMNS, CYLINDERS_FIELD, ENGINE_SIZE_FIELD};

// ── Errors ─────────────────────────────────────────────────────────────

/// Artifact loading failures. All of them are fatal at startup.
#[derive(Error, Debug)]
pub enum ArtifactError {
    /// Could not read the artifact file.
    #[error("failed to read artifact {file}: {source}")]
    Io {
        /// Path of the artifact.
        file: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON for the expected schema.
    #[error("failed to parse artifact {file}: {source}")]
    Parse {
        /// Path of the artifact.
        file: String,
        /// Underlying deserialization error.
        #[source]
        source: serde_json::Error,
    },

    /// The file parsed but its contents are unusable.
    #[error("invalid artifact {file}: {reason}")]
    Invalid {
        /// Path of the artifact.
        file: String,
        /// What is wrong with it.
        reason: String,
    },
}

// ── Schemas ────────────────────────────────────────────────────────────

/// Serialized regression model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelArtifact {
    /// Feature names in training order.
    pub feature_names: Vec<String>,
    /// One coefficient per feature.
    pub weights: Vec<f64>,
    /// Regression intercept.
    pub intercept: f64,
}

/// Serialized encoder vocabularies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EncodersArtifact {
    /// Per-column vocabularies. File order is irrelevant; the registry
    /// arranges columns in schema order.
    pub columns: Vec<ColumnVocabulary>,
}

/// One column's training-time vocabulary, labels in code order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnVocabulary {
    /// Column name; must be one of the fixed schema columns.
    pub column: String,
    /// Labels; a label's position is its code.
    pub labels: Vec<String>,
}

// ── Loaders ────────────────────────────────────────────────────────────

/// Load and validate the regression model from a JSON artifact.
///
/// The artifact's `feature_names` must list the schema columns in training
/// order (the five categorical columns, then engine size, then cylinders),
/// with one weight per feature and finite coefficients throughout.
///
/// # Errors
///
/// [`ArtifactError::Io`] when the file cannot be read,
/// [`ArtifactError::Parse`] when it is not the expected JSON shape,
/// [`ArtifactError::Invalid`] when its contents fail validation.
pub fn load_model(path: &Path) -> Result<LinearModel, ArtifactError> {
    let artifact: ModelArtifact = read_json(path)?;

    let expected = expected_feature_names();
    if artifact.feature_names != expected {
        return Err(invalid(
            path,
            format!(
                "feature_names must be {expected:?} in training order, got {:?}",
                artifact.feature_names
            ),
        ));
    }
    if artifact.weights.len() != artifact.feature_names.len() {
        return Err(invalid(
            path,
            format!(
                "{} weights supplied for {} features",
                artifact.weights.len(),
                artifact.feature_names.len()
            ),
        ));
    }
    if artifact.weights.iter().any(|w| !w.is_finite()) || !artifact.intercept.is_finite() {
        return Err(invalid(path, "coefficients must be finite".to_string()));
    }

    Ok(LinearModel::new(artifact.weights, artifact.intercept))
}

/// Load and validate the encoder vocabularies into a registry.
///
/// # Errors
///
/// [`ArtifactError::Io`] / [`ArtifactError::Parse`] as for [`load_model`];
/// [`ArtifactError::Invalid`] when a column repeats a label, a schema column
/// is missing, or an unknown column appears.
pub fn load_encoders(path: &Path) -> Result<EncoderRegistry, ArtifactError> {
    let artifact: EncodersArtifact = read_json(path)?;

    for column in &artifact.columns {
        let mut seen = std::collections::HashSet::new();
        for label in &column.labels {
            if !seen.insert(label.as_str()) {
                return Err(invalid(
                    path,
                    format!("column '{}' lists label '{label}' twice", column.column),
                ));
            }
        }
    }

    let encoders = artifact
        .columns
        .into_iter()
        .map(|column| CategoricalEncoder::new(column.column, column.labels))
        .collect();
    EncoderRegistry::new(encoders).map_err(|err| invalid(path, err.to_string()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let content = std::fs::read_to_string(path).map_err(|source| ArtifactError::Io {
        file: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ArtifactError::Parse {
        file: path.display().to_string(),
        source,
    })
}

fn invalid(path: &Path, reason: String) -> ArtifactError {
    ArtifactError::Invalid {
        file: path.display().to_string(),
        reason,
    }
}

/// The feature names the pipeline produces, in vector order.
fn expected_feature_names() -> Vec<String> {
    CATEGORICAL_COLUMNS
        .iter()
        .map(|column| column.to_string())
        .chain([ENGINE_SIZE_FIELD.to_string(), CYLINDERS_FIELD.to_string()])
        .collect()
}
