//! Fuses the heart-failure and diabetes risk probabilities into one stability score.
//!
//! Equal weights, no calibration: both inputs count the same even though the
//! diabetes probability uses the max-class convention (see
//! [`crate::model::ProbabilityConvention`]).

use serde::{Deserialize, Serialize};

/// `(1 - mean(p1, p2)) * 100`, in [0, 100] for probabilities in [0, 1]. Unrounded.
pub fn fuse(heart_failure: f64, diabetes: f64) -> f64 {
    let avg_risk = (heart_failure + diabetes) / 2.0;
    ((1.0 - avg_risk) * 100.0).clamp(0.0, 100.0)
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Per-request result as reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// 0–100, two decimals.
    pub stability_score: f64,
    /// 0–1, four decimals.
    pub heart_failure_risk_prob: f64,
    /// 0–1, four decimals.
    pub diabetes_risk_prob: f64,
}

impl PredictionResult {
    /// Fuses the unrounded probabilities; rounding applies to the reported values only.
    pub fn from_probabilities(heart_failure: f64, diabetes: f64) -> Self {
        Self {
            stability_score: round_to(fuse(heart_failure, diabetes), 2),
            heart_failure_risk_prob: round_to(heart_failure, 4),
            diabetes_risk_prob: round_to(diabetes, 4),
        }
    }
}
