//! Inbound request payload and its validation.

use crate::error::ScoreError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MISSING_INPUT: &str = "Missing user_id or bmi";
pub const INVALID_BMI: &str = "bmi must be a finite number";

/// `{ "user_id": "...", "bmi": 27.5 }`; `userId` is accepted as well. Fields stay loose
/// here so that validation, not deserialization, decides what is a bad request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreRequest {
    #[serde(default, alias = "userId")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub bmi: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidRequest {
    pub user_id: String,
    pub bmi: f64,
}

impl ScoreRequest {
    pub fn new(user_id: impl Into<String>, bmi: f64) -> Self {
        Self {
            user_id: Some(user_id.into()),
            // NaN and infinities have no JSON number form; as text they fail as INVALID_BMI.
            bmi: Some(
                serde_json::Number::from_f64(bmi)
                    .map(Value::Number)
                    .unwrap_or_else(|| Value::String(bmi.to_string())),
            ),
        }
    }

    /// Requires a user id that is not blank and a numeric BMI (a JSON number or
    /// numeric text). The id is passed to the store exactly as given.
    pub fn validate(&self) -> Result<ValidRequest, ScoreError> {
        let user_id = self
            .user_id
            .as_deref()
            .filter(|s| !s.trim().is_empty());
        let bmi = self.bmi.as_ref().filter(|v| !v.is_null());
        let (Some(user_id), Some(bmi)) = (user_id, bmi) else {
            return Err(ScoreError::BadRequest(MISSING_INPUT.to_string()));
        };

        let bmi = match bmi {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|v| v.is_finite())
        .ok_or_else(|| ScoreError::BadRequest(INVALID_BMI.to_string()))?;

        Ok(ValidRequest {
            user_id: user_id.to_string(),
            bmi,
        })
    }
}
