//! Records → one fixed-order feature vector: coerce, impute with the field mean, average.

use super::coerce::coerce_numeric;
use super::spec::{FeatureSpec, FieldKind, FieldSpec};
use super::FeatureVector;
use crate::records::LogRecord;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Fields computed outside the record store, keyed by field name. An extra value
/// stands in for the field in every record.
pub type Extras = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregationError {
    #[error("no log records to aggregate")]
    EmptyInput,
    #[error("field `{field}` has no observed value in any record")]
    InsufficientData { field: String },
}

/// Aggregate `records` into a vector laid out exactly as `spec`.
///
/// Fails fast when any field cannot produce a value: the vector width is fixed, so a
/// field is never skipped.
pub fn aggregate(
    records: &[LogRecord],
    extras: &Extras,
    spec: &FeatureSpec,
) -> Result<FeatureVector, AggregationError> {
    if records.is_empty() {
        return Err(AggregationError::EmptyInput);
    }

    let mut values = Vec::with_capacity(spec.len());
    for field in spec.fields() {
        let value = match extras.get(&field.name) {
            Some(v) if v.is_finite() => *v,
            Some(_) => return Err(insufficient(field)),
            None => match &field.kind {
                FieldKind::Numeric => {
                    let column = column(records, &field.name);
                    let imputed = impute_mean(&column).ok_or_else(|| insufficient(field))?;
                    mean(&imputed)
                }
                FieldKind::Categorical { encoding } => {
                    first_categorical(records, &field.name, encoding).ok_or_else(|| insufficient(field))?
                }
            },
        };
        values.push(value);
    }
    let names = spec.field_names().map(String::from).collect();
    Ok(FeatureVector::new(spec.name(), values).with_names(names))
}

fn insufficient(field: &FieldSpec) -> AggregationError {
    AggregationError::InsufficientData {
        field: field.name.clone(),
    }
}

/// Coerced values of one field across all records; absent keys are missing.
pub(crate) fn column(records: &[LogRecord], field: &str) -> Vec<Option<f64>> {
    records
        .iter()
        .map(|r| r.get(field).and_then(coerce_numeric))
        .collect()
}

/// Replace every missing entry with the mean of the observed entries.
/// `None` when nothing was observed.
pub(crate) fn impute_mean(column: &[Option<f64>]) -> Option<Vec<f64>> {
    let observed: Vec<f64> = column.iter().flatten().copied().collect();
    if observed.is_empty() {
        return None;
    }
    let fill = mean(&observed);
    Some(column.iter().map(|v| v.unwrap_or(fill)).collect())
}

/// Running mean. Stays within the range of its inputs, so it never overflows for
/// finite values the way a plain sum can.
fn mean(values: &[f64]) -> f64 {
    values.iter().enumerate().fold(0.0, |m, (i, x)| {
        let n = (i + 1) as f64;
        m - m / n + x / n
    })
}

/// First record wins; later records are not consulted even if they disagree.
fn first_categorical(records: &[LogRecord], field: &str, encoding: &BTreeMap<String, f64>) -> Option<f64> {
    match records.first()?.get(field)? {
        Value::String(s) => {
            let key = s.trim().to_lowercase();
            encoding.get(&key).copied().or_else(|| key.parse::<f64>().ok().filter(|v| v.is_finite()))
        }
        other => coerce_numeric(other),
    }
}
