//! Linear classifiers stored as JSON coefficients (logistic regression, binary or
//! multinomial), with an optional standard scaler applied first.

use super::{ModelError, RiskModel};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// On-disk layout. One coefficient row means a binary model (sigmoid, classes
/// `[negative, positive]`); k rows mean k classes (softmax).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearParams {
    pub feature_names: Vec<String>,
    pub coefficients: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaler: Option<StandardScaler>,
}

#[derive(Debug, Clone)]
pub struct LinearClassifier {
    name: String,
    params: LinearParams,
}

impl LinearClassifier {
    pub fn new(name: impl Into<String>, params: LinearParams) -> Result<Self, ModelError> {
        let name = name.into();
        let bad = |reason: String| ModelError::Load {
            path: name.clone(),
            reason,
        };
        let width = params.feature_names.len();
        if width == 0 || params.coefficients.is_empty() {
            return Err(bad("empty coefficient table".into()));
        }
        if params.coefficients.iter().any(|row| row.len() != width) {
            return Err(bad(format!("every coefficient row must have {} entries", width)));
        }
        if params.intercepts.len() != params.coefficients.len() {
            return Err(bad(format!(
                "{} intercepts for {} coefficient rows",
                params.intercepts.len(),
                params.coefficients.len()
            )));
        }
        if let Some(s) = &params.scaler {
            if s.mean.len() != width || s.scale.len() != width {
                return Err(bad("scaler width does not match feature count".into()));
            }
            if s.scale.iter().any(|v| *v == 0.0 || !v.is_finite()) {
                return Err(bad("scaler has a zero or non-finite scale".into()));
            }
        }
        Ok(Self { name, params })
    }

    pub fn from_json_str(name: impl Into<String>, data: &str) -> Result<Self, ModelError> {
        let name = name.into();
        let params: LinearParams = serde_json::from_str(data).map_err(|e| ModelError::Load {
            path: name.clone(),
            reason: e.to_string(),
        })?;
        Self::new(name, params)
    }

    pub fn from_file(name: impl Into<String>, path: &Path) -> Result<Self, ModelError> {
        let data = std::fs::read_to_string(path).map_err(|e| ModelError::Load {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json_str(name, &data)
    }

    pub fn feature_names(&self) -> &[String] {
        &self.params.feature_names
    }

    fn logits(&self, x: &[f64]) -> Vec<f64> {
        let scaled: Vec<f64> = match &self.params.scaler {
            Some(s) => x
                .iter()
                .zip(s.mean.iter().zip(&s.scale))
                .map(|(v, (m, sc))| (v - m) / sc)
                .collect(),
            None => x.to_vec(),
        };
        self.params
            .coefficients
            .iter()
            .zip(&self.params.intercepts)
            .map(|(row, b)| row.iter().zip(&scaled).map(|(w, v)| w * v).sum::<f64>() + b)
            .collect()
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn softmax(z: &[f64]) -> Vec<f64> {
    let max = z.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = z.iter().map(|v| (v - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

impl RiskModel for LinearClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn expected_feature_count(&self) -> usize {
        self.params.feature_names.len()
    }

    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
        if features.len() != self.expected_feature_count() {
            return Err(ModelError::FeatureMismatch {
                model: self.name.clone(),
                expected: self.expected_feature_count(),
                actual: features.len(),
            });
        }
        let z = self.logits(features);
        Ok(match z.as_slice() {
            [single] => {
                let p = sigmoid(*single);
                vec![1.0 - p, p]
            }
            many => softmax(many),
        })
    }
}
