//! Fitted artifact loading
//!
//! The classifier and scaler are pre-fitted by an external training process
//! that exports its parameters to JSON files. Both are loaded once at
//! startup, validated for shape, and held immutable behind trait objects
//! for the life of the process.
//!
//! The traits are the seam the prediction pipeline depends on: production
//! code loads fitted parameters from disk, tests substitute deterministic
//! fakes.

use crate::features::FEATURE_ORDER;
use habitus_shared::{HabitusError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Stateless, deterministic transform applied to a feature vector before
/// classification. Fitted parameters are opaque to callers.
pub trait FeatureScaler: Send + Sync {
    /// Transforms an ordered feature vector into the scaled vector the
    /// classifier was fitted against.
    fn transform(&self, features: &[f64]) -> Result<Vec<f64>>;
}

/// Pre-fitted classifier producing a behavior-class label for one scaled
/// feature vector.
pub trait BehaviorClassifier: Send + Sync {
    /// Predicts the class label for one scaled feature vector.
    fn predict(&self, features: &[f64]) -> Result<i64>;
}

/// Fitted parameters of a standard scaler: per-feature mean and scale
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScalerParams {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Standard scaler applying `(x - mean) / scale` per feature
#[derive(Debug, Clone)]
pub struct StandardScaler {
    params: StandardScalerParams,
}

impl StandardScaler {
    /// Builds a scaler from fitted parameters, validating their shape
    /// against the declared feature order.
    pub fn from_params(params: StandardScalerParams) -> Result<Self> {
        let expected = FEATURE_ORDER.len();

        if params.mean.len() != expected || params.scale.len() != expected {
            return Err(HabitusError::artifact_unavailable(format!(
                "scaler parameters must cover {} features, got mean={} scale={}",
                expected,
                params.mean.len(),
                params.scale.len()
            )));
        }

        if params.scale.iter().any(|s| *s == 0.0 || !s.is_finite()) {
            return Err(HabitusError::artifact_unavailable(
                "scaler contains a zero or non-finite scale factor",
            ));
        }

        Ok(Self { params })
    }
}

impl FeatureScaler for StandardScaler {
    fn transform(&self, features: &[f64]) -> Result<Vec<f64>> {
        if features.len() != self.params.mean.len() {
            return Err(HabitusError::internal(
                format!(
                    "scaler fitted for {} features, got {}",
                    self.params.mean.len(),
                    features.len()
                ),
                None,
            ));
        }

        Ok(features
            .iter()
            .zip(self.params.mean.iter().zip(self.params.scale.iter()))
            .map(|(x, (mean, scale))| (x - mean) / scale)
            .collect())
    }
}

/// Fitted parameters of a linear classifier: one decision row per class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearClassifierParams {
    /// Class labels, aligned with `coefficients` and `intercepts` rows
    pub classes: Vec<i64>,
    /// Per-class coefficient rows, one weight per feature
    pub coefficients: Vec<Vec<f64>>,
    /// Per-class intercepts
    pub intercepts: Vec<f64>,
}

/// Linear classifier scoring each class and returning the argmax label
#[derive(Debug, Clone)]
pub struct LinearClassifier {
    params: LinearClassifierParams,
}

impl LinearClassifier {
    /// Builds a classifier from fitted parameters, validating their shape.
    pub fn from_params(params: LinearClassifierParams) -> Result<Self> {
        if params.classes.is_empty() {
            return Err(HabitusError::artifact_unavailable(
                "classifier has no classes",
            ));
        }

        if params.coefficients.len() != params.classes.len()
            || params.intercepts.len() != params.classes.len()
        {
            return Err(HabitusError::artifact_unavailable(format!(
                "classifier shape mismatch: {} classes, {} coefficient rows, {} intercepts",
                params.classes.len(),
                params.coefficients.len(),
                params.intercepts.len()
            )));
        }

        let expected = FEATURE_ORDER.len();
        if let Some(row) = params.coefficients.iter().find(|r| r.len() != expected) {
            return Err(HabitusError::artifact_unavailable(format!(
                "classifier coefficient row has {} weights, expected {}",
                row.len(),
                expected
            )));
        }

        Ok(Self { params })
    }
}

impl BehaviorClassifier for LinearClassifier {
    fn predict(&self, features: &[f64]) -> Result<i64> {
        if features.len() != FEATURE_ORDER.len() {
            return Err(HabitusError::internal(
                format!(
                    "classifier fitted for {} features, got {}",
                    FEATURE_ORDER.len(),
                    features.len()
                ),
                None,
            ));
        }

        let mut best_index = 0;
        let mut best_score = f64::NEG_INFINITY;

        for (index, (row, intercept)) in self
            .params
            .coefficients
            .iter()
            .zip(self.params.intercepts.iter())
            .enumerate()
        {
            let score: f64 = row
                .iter()
                .zip(features.iter())
                .map(|(w, x)| w * x)
                .sum::<f64>()
                + intercept;

            // Ties resolve to the first (lowest-index) class
            if score > best_score {
                best_score = score;
                best_index = index;
            }
        }

        Ok(self.params.classes[best_index])
    }
}

/// The pair of fitted artifacts the prediction pipeline runs against,
/// loaded once at startup and shared read-only by all requests.
pub struct Artifacts {
    pub scaler: Box<dyn FeatureScaler>,
    pub classifier: Box<dyn BehaviorClassifier>,
}

impl Artifacts {
    /// Loads both artifact files, validating parameter shapes.
    ///
    /// Any failure (missing file, malformed JSON, wrong shape) is reported
    /// as an artifact-unavailable error; the caller decides whether to
    /// abort or start in degraded mode.
    pub fn load(model_path: &Path, scaler_path: &Path) -> Result<Self> {
        let scaler_params: StandardScalerParams = read_params(scaler_path)?;
        let scaler = StandardScaler::from_params(scaler_params)?;

        let classifier_params: LinearClassifierParams = read_params(model_path)?;
        let classifier = LinearClassifier::from_params(classifier_params)?;

        info!(
            model_path = ?model_path,
            scaler_path = ?scaler_path,
            "Fitted artifacts loaded"
        );

        Ok(Self {
            scaler: Box::new(scaler),
            classifier: Box::new(classifier),
        })
    }

    /// Builds an artifact set from already-constructed implementations.
    ///
    /// Used by tests to inject deterministic fakes.
    pub fn from_parts(
        scaler: Box<dyn FeatureScaler>,
        classifier: Box<dyn BehaviorClassifier>,
    ) -> Self {
        Self { scaler, classifier }
    }
}

impl std::fmt::Debug for Artifacts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Artifacts").finish_non_exhaustive()
    }
}

fn read_params<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = std::fs::read(path).map_err(|e| {
        HabitusError::artifact_unavailable(format!("failed to read {}: {}", path.display(), e))
    })?;

    serde_json::from_slice(&bytes).map_err(|e| {
        HabitusError::artifact_unavailable(format!("failed to parse {}: {}", path.display(), e))
    })
}
