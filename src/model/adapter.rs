//! Reduces a model's class distribution to a single risk probability.

use super::{ModelError, RiskModel};
use crate::features::{FeatureSpec, FeatureVector};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Tolerance for probabilities that drift just outside [0, 1] (float export noise).
const PROB_TOLERANCE: f64 = 1e-6;

/// How a class distribution becomes "the" risk probability.
///
/// `MaxClass` is the probability of whichever class the model is most sure about,
/// which is not a risk probability in the binary sense: a confident "no diabetes"
/// prediction yields a high value. The diabetes model is scored this way and its
/// output is not comparable in magnitude with a `PositiveClass` probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbabilityConvention {
    PositiveClass {
        #[serde(default = "default_positive_index")]
        index: usize,
    },
    MaxClass,
}

fn default_positive_index() -> usize {
    1
}

impl Default for ProbabilityConvention {
    fn default() -> Self {
        ProbabilityConvention::PositiveClass {
            index: default_positive_index(),
        }
    }
}

pub fn predict_positive_class_probability(
    model: &dyn RiskModel,
    convention: ProbabilityConvention,
    features: &FeatureVector,
) -> Result<f64, ModelError> {
    let expected = model.expected_feature_count();
    if features.len() != expected {
        return Err(ModelError::FeatureMismatch {
            model: model.name().to_string(),
            expected,
            actual: features.len(),
        });
    }

    let probs = model.predict_proba(features.values())?;
    let invalid = |reason: String| ModelError::InvalidOutput {
        model: model.name().to_string(),
        reason,
    };
    if probs.is_empty() {
        return Err(invalid("no classes".into()));
    }
    if let Some(p) = probs
        .iter()
        .find(|p| !p.is_finite() || **p < -PROB_TOLERANCE || **p > 1.0 + PROB_TOLERANCE)
    {
        return Err(invalid(format!("{} is not a probability", p)));
    }

    let p = match convention {
        ProbabilityConvention::PositiveClass { index } => *probs
            .get(index)
            .ok_or_else(|| invalid(format!("no class {} among {} classes", index, probs.len())))?,
        ProbabilityConvention::MaxClass => probs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    };
    Ok(p.clamp(0.0, 1.0))
}

/// A model together with the feature layout it was trained on and the convention
/// used to read its output.
#[derive(Clone)]
pub struct RiskPredictor {
    spec: FeatureSpec,
    model: Arc<dyn RiskModel>,
    convention: ProbabilityConvention,
}

impl RiskPredictor {
    /// Fails when the layout width and the model's input width disagree.
    pub fn new(
        spec: FeatureSpec,
        model: Arc<dyn RiskModel>,
        convention: ProbabilityConvention,
    ) -> Result<Self, ModelError> {
        if spec.len() != model.expected_feature_count() {
            return Err(ModelError::FeatureMismatch {
                model: model.name().to_string(),
                expected: model.expected_feature_count(),
                actual: spec.len(),
            });
        }
        Ok(Self {
            spec,
            model,
            convention,
        })
    }

    pub fn name(&self) -> &str {
        self.model.name()
    }

    pub fn spec(&self) -> &FeatureSpec {
        &self.spec
    }

    pub fn convention(&self) -> ProbabilityConvention {
        self.convention
    }

    pub fn predict(&self, features: &FeatureVector) -> Result<f64, ModelError> {
        predict_positive_class_probability(self.model.as_ref(), self.convention, features)
    }
}

impl std::fmt::Debug for RiskPredictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskPredictor")
            .field("model", &self.model.name())
            .field("spec", &self.spec.name())
            .field("convention", &self.convention)
            .finish()
    }
}
