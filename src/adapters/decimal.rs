//! Recursive normalization of driver-returned numerics into JSON-safe values.
//!
//! Grounded in the original monitor's `_convert_decimal_to_float`: every
//! decimal/bignum value coming back from a driver is walked and converted to
//! an `f64` where representable; non-finite values become `null`; anything
//! that cannot be represented losslessly falls back to its string form. This
//! runs once, on the `serde_json::Value` tree, so every adapter benefits
//! uniformly instead of re-implementing the conversion per driver.

use serde_json::Value;

#[must_use]
pub fn normalize(value: Value) -> Value {
    match value {
        Value::Number(n) => normalize_number(&n),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        Value::Object(map) => {
            Value::Object(map.into_iter().map(|(k, v)| (k, normalize(v))).collect())
        }
        other => other,
    }
}

fn normalize_number(n: &serde_json::Number) -> Value {
    if let Some(f) = n.as_f64() {
        if f.is_finite() {
            return serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number);
        }
        return Value::Null;
    }
    // Not representable as f64 (shouldn't normally happen for serde_json::Number,
    // but keep the fallback named in the spec for parity with arbitrary-precision
    // decimal types surfaced by some drivers before they reach this tree).
    Value::String(n.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn finite_numbers_pass_through() {
        let v = normalize(json!({"a": 1.5, "b": [1, 2, 3]}));
        assert_eq!(v, json!({"a": 1.5, "b": [1, 2, 3]}));
    }

    #[test]
    fn nested_structures_are_walked() {
        let v = normalize(json!({"outer": {"inner": [1.0, 2.0]}}));
        assert_eq!(v, json!({"outer": {"inner": [1.0, 2.0]}}));
    }

    #[test]
    fn non_numeric_values_are_untouched() {
        let v = normalize(json!({"name": "x", "flag": true, "nothing": null}));
        assert_eq!(v, json!({"name": "x", "flag": true, "nothing": null}));
    }
}
