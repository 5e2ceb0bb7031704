//! ONNX Runtime classifier. Input: `[1, feature_count]` f32. Output: the class
//! probability tensor `[1, n_classes]`.
//!
//! Exporters typically emit a `label` and a `probabilities` output; the probabilities
//! output must be a plain tensor (export without ZipMap).

use super::{ModelError, RiskModel};
use ndarray::Array2;
use ort::session::Session;
use ort::value::Tensor;
use parking_lot::Mutex;
use std::path::Path;

const PROBABILITIES_OUTPUT: &str = "probabilities";

pub struct OnnxClassifier {
    name: String,
    // `Session::run` takes `&mut self`; the lock serializes calls, the weights never change.
    session: Mutex<Session>,
    output_name: String,
    feature_count: usize,
}

impl OnnxClassifier {
    /// Load from `path`. `output` names the probability output; by default the one
    /// named `probabilities`, else the last output.
    pub fn load(
        name: impl Into<String>,
        path: &Path,
        feature_count: usize,
        output: Option<&str>,
    ) -> Result<Self, ModelError> {
        let load_err = |reason: String| ModelError::Load {
            path: path.display().to_string(),
            reason,
        };

        if !path.exists() {
            return Err(load_err("file not found".into()));
        }

        let session = Session::builder()
            .map_err(|e| load_err(e.to_string()))?
            .commit_from_file(path)
            .map_err(|e| load_err(e.to_string()))?;

        let outputs: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        let output_name = match output {
            Some(wanted) if outputs.iter().any(|o| o == wanted) => wanted.to_string(),
            Some(wanted) => return Err(load_err(format!("no output named `{}` in {:?}", wanted, outputs))),
            None => outputs
                .iter()
                .find(|o| o.as_str() == PROBABILITIES_OUTPUT)
                .or_else(|| outputs.last())
                .cloned()
                .ok_or_else(|| load_err("model has no outputs".into()))?,
        };

        Ok(Self {
            name: name.into(),
            session: Mutex::new(session),
            output_name,
            feature_count,
        })
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }
}

impl RiskModel for OnnxClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn expected_feature_count(&self) -> usize {
        self.feature_count
    }

    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
        let fail = |reason: String| ModelError::Inference {
            model: self.name.clone(),
            reason,
        };

        let row: Vec<f32> = features.iter().map(|v| *v as f32).collect();
        let input = Array2::from_shape_vec((1, row.len()), row).map_err(|e| fail(e.to_string()))?;
        let tensor = Tensor::from_array(input).map_err(|e| fail(e.to_string()))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| fail(e.to_string()))?;
        let output = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| fail(format!("missing output `{}`", self.output_name)))?;
        let (_, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| fail(e.to_string()))?;
        let probs = data.iter().map(|p| *p as f64).collect();
        Ok(probs)
    }
}
