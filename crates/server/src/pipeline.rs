//! Prediction pipeline
//!
//! The single request/response transformation at the core of the service:
//! readiness check → parse → validate/encode → scale → predict. Each call
//! runs synchronously to completion; artifacts are shared read-only so no
//! locking is required.

use crate::artifacts::Artifacts;
use crate::features;
use habitus_shared::{HabitusError, Result};
use std::sync::Arc;
use tracing::debug;

/// Transforms one request body into one predicted behavior-class label.
///
/// Holds the artifact set loaded at startup. A server that failed to load
/// its artifacts constructs the pipeline with `None` and runs in degraded
/// mode: every prediction fails with an artifact-unavailable error until
/// the process is restarted with valid artifact files.
#[derive(Clone)]
pub struct PredictionPipeline {
    artifacts: Option<Arc<Artifacts>>,
}

impl PredictionPipeline {
    /// Creates a pipeline over the given artifact set, or a degraded
    /// pipeline when loading failed.
    pub fn new(artifacts: Option<Arc<Artifacts>>) -> Self {
        Self { artifacts }
    }

    /// Whether the fitted artifacts are loaded and predictions can succeed
    pub fn ready(&self) -> bool {
        self.artifacts.is_some()
    }

    /// Runs the full prediction pipeline on a raw request body.
    ///
    /// # Errors
    ///
    /// - `ArtifactUnavailable` when the artifacts failed to load at startup
    /// - `RequestValidation` for unparsable bodies, missing features, or an
    ///   invalid categorical value
    /// - `Internal` for any unexpected failure in scaling or prediction
    pub fn predict(&self, body: &[u8]) -> Result<i64> {
        let artifacts = self.artifacts.as_ref().ok_or_else(|| {
            HabitusError::artifact_unavailable("artifacts were not loaded at startup")
        })?;

        let record = features::parse_body(body)?;
        let vector = features::encode_record(&record)?;

        let scaled = artifacts.scaler.transform(&vector)?;
        let label = artifacts.classifier.predict(&scaled)?;

        debug!(label = label, "Prediction completed");
        Ok(label)
    }
}

impl std::fmt::Debug for PredictionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionPipeline")
            .field("ready", &self.ready())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{BehaviorClassifier, FeatureScaler};

    struct IdentityScaler;

    impl FeatureScaler for IdentityScaler {
        fn transform(&self, features: &[f64]) -> Result<Vec<f64>> {
            Ok(features.to_vec())
        }
    }

    struct ConstantClassifier(i64);

    impl BehaviorClassifier for ConstantClassifier {
        fn predict(&self, _features: &[f64]) -> Result<i64> {
            Ok(self.0)
        }
    }

    fn ready_pipeline(label: i64) -> PredictionPipeline {
        PredictionPipeline::new(Some(Arc::new(Artifacts::from_parts(
            Box::new(IdentityScaler),
            Box::new(ConstantClassifier(label)),
        ))))
    }

    #[test]
    fn test_predict_with_fake_artifacts() {
        let pipeline = ready_pipeline(4);
        let body = br#"{"appUsageTime":250,"screenOnTime":5.2,"batteryDrain":1500,"appsInstalled":50,"dataUsage":800,"age":28,"gender":"Male"}"#;

        assert_eq!(pipeline.predict(body).unwrap(), 4);
    }

    #[test]
    fn test_degraded_pipeline_rejects_everything() {
        let pipeline = PredictionPipeline::new(None);
        assert!(!pipeline.ready());

        let body = br#"{"appUsageTime":250,"screenOnTime":5.2,"batteryDrain":1500,"appsInstalled":50,"dataUsage":800,"age":28,"gender":"Male"}"#;
        let err = pipeline.predict(body).unwrap_err();
        assert!(matches!(err, HabitusError::ArtifactUnavailable { .. }));
    }

    #[test]
    fn test_validation_errors_pass_through() {
        let pipeline = ready_pipeline(1);

        let err = pipeline.predict(b"not json").unwrap_err();
        assert!(matches!(err, HabitusError::RequestValidation { .. }));

        let err = pipeline.predict(br#"{"gender":"Male"}"#).unwrap_err();
        assert_eq!(err.client_message(), "Missing feature: appUsageTime");
    }
}
