//! Model capability seam and the regression implementations behind it.
//!
//! The serving pipeline only sees [`RegressionModel`]; everything trained
//! lives behind it. Implementations are read-only at serving time: `predict`
//! borrows `&self` and carries no interior mutability, so one instance is
//! shared across request tasks without synchronization.

use async_trait::async_trait;

use crate::{FeatureVector, PredictionError, FEATURE_COUNT};

// ===== Capability trait =====

/// A loaded regression model.
#[async_trait]
pub trait RegressionModel: Send + Sync {
    /// Score one feature vector.
    ///
    /// Deterministic: identical vectors yield identical scores.
    ///
    /// # Errors
    ///
    /// [`PredictionError::Inference`] when the vector does not match the
    /// trained shape or the score is not a finite number.
    async fn predict(&self, features: &FeatureVector) -> Result<f64, PredictionError>;

    /// Width of the feature vector this model expects.
    fn feature_count(&self) -> usize;
}

// ===== Linear regression =====

/// Multiple linear regression: `weights · features + intercept`.
///
/// Loaded from the model artifact at startup, see
/// [`crate::artifact::load_model`].
#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    weights: Vec<f64>,
    intercept: f64,
}

impl LinearModel {
    /// Build from trained coefficients.
    pub fn new(weights: Vec<f64>, intercept: f64) -> Self {
        Self { weights, intercept }
    }

    /// Trained coefficients, one per feature.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Trained intercept.
    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

#[async_trait]
impl RegressionModel for LinearModel {
    async fn predict(&self, features: &FeatureVector) -> Result<f64, PredictionError> {
        if features.len() != self.weights.len() {
            return Err(PredictionError::Inference(format!(
                "feature vector has {} values, model was trained on {}",
                features.len(),
                self.weights.len()
            )));
        }

        let score = self
            .weights
            .iter()
            .zip(features.as_slice())
            .map(|(weight, value)| weight * value)
            .sum::<f64>()
            + self.intercept;

        if score.is_finite() {
            Ok(score)
        } else {
            Err(PredictionError::Inference(
                "model produced a non-finite score".to_string(),
            ))
        }
    }

    fn feature_count(&self) -> usize {
        self.weights.len()
    }
}

// ===== Fixed-output model =====

/// Model returning a fixed score regardless of input.
///
/// Used by tests that need an exact known prediction and by smoke
/// deployments without a trained artifact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantModel {
    value: f64,
}

impl ConstantModel {
    /// Model that always scores `value`.
    pub fn new(value: f64) -> Self {
        Self { value }
    }
}

impl Default for ConstantModel {
    fn default() -> Self {
        Self::new(0.0)
    }
}

#[async_trait]
impl RegressionModel for ConstantModel {
    async fn predict(&self, _features: &FeatureVector) -> Result<f64, PredictionError> {
        Ok(self.value)
    }

    fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }
}
