//! Field catalogue and the per-model feature layouts.
//!
//! A [`FeatureSpec`] is both the list of fields to aggregate and the input order the
//! corresponding model was trained with. The aggregator cannot verify the latter; the
//! model loader checks it where the model file carries feature names.

use std::collections::BTreeMap;

pub const SYSTOLIC_BP: &str = "systolic_bp_mmHg";
pub const DIASTOLIC_BP: &str = "diastolic_bp_mmHg";
pub const HEART_RATE: &str = "heart_rate_bpm";
pub const GLUCOSE: &str = "glucose_mg_dL";
pub const SODIUM: &str = "sodium_mg_per_day";
pub const PHYSICAL_ACTIVITY: &str = "physical_activity_min_per_week";
pub const SLEEP_QUALITY: &str = "sleep_quality_score_1_10";
pub const STRESS_LEVEL: &str = "stress_level_1_10";
pub const AGE: &str = "age_years";
pub const SMOKING: &str = "smoking_cigs_per_week";
pub const ALCOHOL: &str = "alcohol_ml_per_week";
pub const PREVIOUS_HYPERTENSIVE_EPISODES: &str = "previous_hypertensive_episodes";
pub const COMORBIDITY_COUNT: &str = "comorbidity_count";
/// Supplied by the caller per request, never read from the record store.
pub const BMI: &str = "bmi";
pub const GENDER: &str = "gender";

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Coerced to a number, imputed with the field mean, averaged across records.
    Numeric,
    /// Taken from the first record verbatim, then mapped through `encoding`
    /// (keys are lowercase). Numeric values pass through unmapped.
    Categorical { encoding: BTreeMap<String, f64> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn numeric(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Numeric,
        }
    }

    pub fn categorical(name: &str, encoding: &[(&str, f64)]) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Categorical {
                encoding: encoding
                    .iter()
                    .map(|(k, v)| (k.to_lowercase(), *v))
                    .collect(),
            },
        }
    }

    /// The conventional gender encoding used by the training data.
    pub fn gender() -> Self {
        Self::categorical(GENDER, &[("female", 0.0), ("f", 0.0), ("male", 1.0), ("m", 1.0)])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSpec {
    name: String,
    fields: Vec<FieldSpec>,
}

impl FeatureSpec {
    pub fn new(name: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    pub fn numeric(name: impl Into<String>, fields: &[&str]) -> Self {
        Self::new(name, fields.iter().map(|f| FieldSpec::numeric(f)).collect())
    }

    pub fn heart_failure() -> Self {
        Self::numeric(
            "heart_failure",
            &[
                SYSTOLIC_BP,
                DIASTOLIC_BP,
                HEART_RATE,
                AGE,
                BMI,
                COMORBIDITY_COUNT,
                PREVIOUS_HYPERTENSIVE_EPISODES,
                SLEEP_QUALITY,
                PHYSICAL_ACTIVITY,
                STRESS_LEVEL,
                SMOKING,
                ALCOHOL,
            ],
        )
    }

    pub fn diabetes() -> Self {
        Self::numeric(
            "diabetes",
            &[
                BMI,
                SYSTOLIC_BP,
                DIASTOLIC_BP,
                GLUCOSE,
                PHYSICAL_ACTIVITY,
                AGE,
                ALCOHOL,
                PREVIOUS_HYPERTENSIVE_EPISODES,
                COMORBIDITY_COUNT,
            ],
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn position(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == field)
    }
}

/// Union of the fields the given specs read from the record store, in first-seen
/// order, excluding fields the caller supplies itself.
pub fn stored_fields(specs: &[&FeatureSpec], supplied: &[&str]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in specs.iter().flat_map(|s| s.field_names()) {
        if supplied.contains(&name) || out.iter().any(|f| f == name) {
            continue;
        }
        out.push(name.to_string());
    }
    out
}
