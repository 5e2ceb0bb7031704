//! Risk classifiers behind one interface: "probability of the risk-present class".
//!
//! Two model families are supported: ONNX graphs exported from the training pipeline
//! ([`OnnxClassifier`]) and plain linear/logistic coefficient files
//! ([`LinearClassifier`]). Models are loaded once at startup and shared read-only.

mod adapter;
mod linear;
mod loader;
mod onnx;

pub use adapter::{predict_positive_class_probability, ProbabilityConvention, RiskPredictor};
pub use linear::{LinearClassifier, LinearParams, StandardScaler};
pub use loader::{file_sha256, load_model, load_predictor, ModelFormat};
pub use onnx::OnnxClassifier;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model `{model}` expects {expected} features, got {actual}")]
    FeatureMismatch {
        model: String,
        expected: usize,
        actual: usize,
    },
    #[error("model `{model}` was trained on features {actual:?}, layout requires {expected:?}")]
    FeatureOrder {
        model: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },
    #[error("failed to load model from {path}: {reason}")]
    Load { path: String, reason: String },
    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    Checksum {
        path: String,
        expected: String,
        actual: String,
    },
    #[error("inference failed in model `{model}`: {reason}")]
    Inference { model: String, reason: String },
    #[error("model `{model}` returned invalid class probabilities: {reason}")]
    InvalidOutput { model: String, reason: String },
}

/// A pre-trained classifier. Implementations must be safe to call from many requests
/// at once and must not change observable state between calls.
pub trait RiskModel: Send + Sync {
    fn name(&self) -> &str;

    fn expected_feature_count(&self) -> usize;

    /// Per-class probabilities for one row of features, in class-index order.
    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>, ModelError>;
}
