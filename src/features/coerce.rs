//! Lenient numeric coercion of raw record values. Anything that does not read as a
//! finite number is "missing", never an error.

use serde_json::Value;

pub fn coerce_numeric(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    };
    n.filter(|x| x.is_finite())
}
