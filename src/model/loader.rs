//! Startup model loading: format detection, checksum pinning, layout checks.

use super::{LinearClassifier, ModelError, OnnxClassifier, RiskModel, RiskPredictor};
use crate::config::ModelConfig;
use crate::features::FeatureSpec;
use serde::{Deserialize, Serialize};
use ring::digest::{digest, SHA256};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFormat {
    Onnx,
    Linear,
}

impl ModelFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "onnx" => Some(ModelFormat::Onnx),
            "json" => Some(ModelFormat::Linear),
            _ => None,
        }
    }
}

/// Lowercase hex SHA-256 of a model file.
pub fn file_sha256(path: &Path) -> Result<String, ModelError> {
    let bytes = std::fs::read(path).map_err(|e| ModelError::Load {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(digest(&SHA256, &bytes)
        .as_ref()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect())
}

/// Load the model described by `config` for the layout `spec`. A missing file is an
/// error: the service never scores without both models.
pub fn load_model(name: &str, config: &ModelConfig, spec: &FeatureSpec) -> Result<Arc<dyn RiskModel>, ModelError> {
    let path = config.path.as_path();
    let digest = file_sha256(path)?;
    if let Some(expected) = &config.sha256 {
        if !expected.eq_ignore_ascii_case(&digest) {
            return Err(ModelError::Checksum {
                path: path.display().to_string(),
                expected: expected.clone(),
                actual: digest,
            });
        }
    }

    let format = config
        .format
        .or_else(|| ModelFormat::from_path(path))
        .ok_or_else(|| ModelError::Load {
            path: path.display().to_string(),
            reason: "cannot infer model format; set `format`".into(),
        })?;
    info!(model = name, path = %path.display(), sha256 = %digest, ?format, "loading risk model");

    let model: Arc<dyn RiskModel> = match format {
        ModelFormat::Onnx => Arc::new(OnnxClassifier::load(name, path, spec.len(), config.output.as_deref())?),
        ModelFormat::Linear => {
            let model = LinearClassifier::from_file(name, path)?;
            if !model.feature_names().iter().map(String::as_str).eq(spec.field_names()) {
                return Err(ModelError::FeatureOrder {
                    model: name.to_string(),
                    expected: spec.field_names().map(String::from).collect(),
                    actual: model.feature_names().to_vec(),
                });
            }
            Arc::new(model)
        }
    };
    Ok(model)
}

pub fn load_predictor(name: &str, config: &ModelConfig, spec: FeatureSpec) -> Result<RiskPredictor, ModelError> {
    let model = load_model(name, config, &spec)?;
    RiskPredictor::new(spec, model, config.convention)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProbabilityConvention;
    use std::io::Write;

    fn linear_file(dir: &Path, names: &[&str]) -> std::path::PathBuf {
        let path = dir.join("model.json");
        let body = serde_json::json!({
            "feature_names": names,
            "coefficients": [vec![0.0; names.len()]],
            "intercepts": [0.0],
        });
        let mut f = std::fs::File::create(&path).unwrap();
        write!(f, "{}", body).unwrap();
        path
    }

    fn config(path: std::path::PathBuf) -> ModelConfig {
        ModelConfig {
            path,
            format: None,
            convention: ProbabilityConvention::default(),
            sha256: None,
            output: None,
        }
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(ModelFormat::from_path(Path::new("m.ONNX")), Some(ModelFormat::Onnx));
        assert_eq!(ModelFormat::from_path(Path::new("m.json")), Some(ModelFormat::Linear));
        assert_eq!(ModelFormat::from_path(Path::new("m.pkl")), None);
    }

    #[test]
    fn loads_linear_model_matching_layout() {
        let dir = tempfile::tempdir().unwrap();
        let spec = FeatureSpec::numeric("t", &["a", "b"]);
        let cfg = config(linear_file(dir.path(), &["a", "b"]));
        let predictor = load_predictor("t", &cfg, spec).unwrap();
        assert_eq!(predictor.name(), "t");
    }

    #[test]
    fn rejects_reordered_features() {
        let dir = tempfile::tempdir().unwrap();
        let spec = FeatureSpec::numeric("t", &["a", "b"]);
        let cfg = config(linear_file(dir.path(), &["b", "a"]));
        assert!(matches!(load_model("t", &cfg, &spec), Err(ModelError::FeatureOrder { .. })));
    }

    #[test]
    fn fingerprint_is_lowercase_hex_sha256() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.bin");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(
            file_sha256(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn checksum_pin_is_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let spec = FeatureSpec::numeric("t", &["a"]);
        let path = linear_file(dir.path(), &["a"]);
        let digest = file_sha256(&path).unwrap();
        assert_eq!(digest.len(), 64);

        let mut cfg = config(path);
        cfg.sha256 = Some(digest.to_uppercase());
        assert!(load_model("t", &cfg, &spec).is_ok());

        cfg.sha256 = Some("00".repeat(32));
        assert!(matches!(load_model("t", &cfg, &spec), Err(ModelError::Checksum { .. })));
    }

    #[test]
    fn missing_model_file_fails() {
        let spec = FeatureSpec::numeric("t", &["a"]);
        let cfg = config("does/not/exist.json".into());
        assert!(matches!(load_model("t", &cfg, &spec), Err(ModelError::Load { .. })));
    }
}
