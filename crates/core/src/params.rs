//! Lenient typed lookups into a `serde_json::Value` parameter object.
//!
//! Component configs (`IntegratorConfig`, `LicConfig`, `ParticleConfig`) are
//! built from a JSON object with these helpers: a missing key or a value of
//! the wrong JSON type yields the supplied default. Range checking happens
//! afterwards in each config's `validate()`.

use serde_json::Value;

/// Extracts an `f64` from `params[name]`, returning `default` if missing or wrong type.
///
/// Integers are accepted and widened.
pub fn param_f64(params: &Value, name: &str, default: f64) -> f64 {
    params.get(name).and_then(Value::as_f64).unwrap_or(default)
}

/// Extracts a `usize` from `params[name]`, returning `default` if missing or wrong type.
///
/// Floats and negative integers are rejected in favour of the default.
pub fn param_usize(params: &Value, name: &str, default: usize) -> usize {
    params
        .get(name)
        .and_then(Value::as_u64)
        .and_then(|v| usize::try_from(v).ok())
        .unwrap_or(default)
}

/// Extracts a `u64` from `params[name]`, returning `default` if missing or wrong type.
pub fn param_u64(params: &Value, name: &str, default: u64) -> u64 {
    params.get(name).and_then(Value::as_u64).unwrap_or(default)
}

/// Extracts a `String` from `params[name]`, returning `default` if missing or wrong type.
pub fn param_string(params: &Value, name: &str, default: &str) -> String {
    params
        .get(name)
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| default.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // -- param_f64 --

    #[test]
    fn param_f64_extracts_existing_float() {
        let params = json!({"step_size": 0.005});
        assert!((param_f64(&params, "step_size", 0.01) - 0.005).abs() < f64::EPSILON);
    }

    #[test]
    fn param_f64_extracts_integer_as_float() {
        let params = json!({"speed": 2});
        assert!((param_f64(&params, "speed", 0.1) - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn param_f64_returns_default_when_key_missing() {
        let params = json!({"other": 1.0});
        assert!((param_f64(&params, "tolerance", 1e-4) - 1e-4).abs() < f64::EPSILON);
    }

    #[test]
    fn param_f64_returns_default_when_wrong_type() {
        let params = json!({"speed": "fast"});
        assert!((param_f64(&params, "speed", 0.1) - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn param_f64_returns_default_for_non_object() {
        let params = json!([1, 2, 3]);
        assert!((param_f64(&params, "speed", 7.0) - 7.0).abs() < f64::EPSILON);
    }

    // -- param_usize --

    #[test]
    fn param_usize_extracts_existing_integer() {
        let params = json!({"max_steps": 2000});
        assert_eq!(param_usize(&params, "max_steps", 1000), 2000);
    }

    #[test]
    fn param_usize_returns_default_for_float_value() {
        let params = json!({"max_steps": 2.5});
        assert_eq!(param_usize(&params, "max_steps", 1000), 1000);
    }

    #[test]
    fn param_usize_returns_default_for_negative_integer() {
        let params = json!({"count": -1});
        assert_eq!(param_usize(&params, "count", 100), 100);
    }

    // -- param_u64 --

    #[test]
    fn param_u64_extracts_large_seed() {
        let params = json!({"seed": u64::MAX});
        assert_eq!(param_u64(&params, "seed", 1), u64::MAX);
    }

    #[test]
    fn param_u64_returns_default_for_string_value() {
        let params = json!({"seed": "42"});
        assert_eq!(param_u64(&params, "seed", 7), 7);
    }

    // -- param_string --

    #[test]
    fn param_string_extracts_existing_string() {
        let params = json!({"sampling": "nearest"});
        assert_eq!(param_string(&params, "sampling", "linear"), "nearest");
    }

    #[test]
    fn param_string_returns_default_for_wrong_type() {
        let params = json!({"sampling": 1});
        assert_eq!(param_string(&params, "sampling", "linear"), "linear");
    }
}
