//! Feature aggregation: a user's raw log records → one fixed-order numeric vector per model.

mod aggregate;
mod coerce;
pub mod spec;
mod window;

pub use aggregate::{aggregate, AggregationError, Extras};
pub use coerce::coerce_numeric;
pub use spec::{stored_fields, FeatureSpec, FieldKind, FieldSpec};
pub use window::RecordWindow;

use serde::{Deserialize, Serialize};

/// Aggregated model input. Width and order come from the [`FeatureSpec`] it was built
/// from; every entry is finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub spec: String,
    values: Vec<f64>,
    #[serde(skip)]
    names: Vec<String>,
}

impl FeatureVector {
    pub fn new(spec: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            spec: spec.into(),
            values,
            names: Vec::new(),
        }
    }

    /// Attach field names so entries can be looked up with [`FeatureVector::get`].
    pub fn with_names(mut self, names: Vec<String>) -> Self {
        self.names = names;
        self
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<f64> {
        let i = self.names.iter().position(|n| n == field)?;
        self.values.get(i).copied()
    }

    pub fn as_f32(&self) -> Vec<f32> {
        self.values.iter().map(|v| *v as f32).collect()
    }
}
