//! Numeric conversion helpers centralizing safe casts from JSON numbers.

use num_traits::cast::cast;
use serde_json::Number;

/// Largest integer a double represents exactly (2^53 - 1).
pub const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

/// Integral value of a finite double, or `None` when it carries a fraction.
#[must_use]
pub fn integral_f64_to_i64(value: f64) -> Option<i64> {
    if !value.is_finite() || value.fract() != 0.0 {
        return None;
    }
    cast::<f64, i64>(value)
}

/// Interpret a JSON number as an exact signed integer (`3` and `3.0` both qualify).
#[must_use]
pub fn number_to_i64(number: &Number) -> Option<i64> {
    if let Some(value) = number.as_i64() {
        return Some(value);
    }
    if number.is_u64() {
        return None;
    }
    number.as_f64().and_then(integral_f64_to_i64)
}

/// Interpret a JSON number as an exact `u32`.
#[must_use]
pub fn number_to_u32(number: &Number) -> Option<u32> {
    number_to_i64(number).and_then(|value| u32::try_from(value).ok())
}

/// Render a JSON number the way a browser stringifies it (`2.0` prints as `2`).
#[must_use]
pub fn number_label(number: &Number) -> String {
    if number.is_f64()
        && let Some(value) = number.as_f64().and_then(integral_f64_to_i64)
    {
        return value.to_string();
    }
    number.to_string()
}

/// Whole seconds of a millisecond span, rounding partial seconds up.
#[must_use]
pub fn millis_to_secs_ceil(millis: i64) -> u64 {
    cast::<i64, u64>(millis).map_or(0, |millis| millis.div_ceil(1000))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn num(value: serde_json::Value) -> Number {
        match value {
            serde_json::Value::Number(n) => n,
            other => panic!("expected number, got {other}"),
        }
    }

    #[test]
    fn integral_doubles_convert() {
        assert_eq!(integral_f64_to_i64(3.0), Some(3));
        assert_eq!(integral_f64_to_i64(-2.0), Some(-2));
        assert_eq!(integral_f64_to_i64(2.5), None);
        assert_eq!(integral_f64_to_i64(f64::NAN), None);
        assert_eq!(integral_f64_to_i64(f64::INFINITY), None);
    }

    #[test]
    fn json_numbers_convert_exactly() {
        assert_eq!(number_to_u32(&num(json!(18))), Some(18));
        assert_eq!(number_to_u32(&num(json!(18.0))), Some(18));
        assert_eq!(number_to_u32(&num(json!(-1))), None);
        assert_eq!(number_to_u32(&num(json!(1.5))), None);
        assert_eq!(number_to_i64(&num(json!(u64::MAX))), None);
        assert_eq!(number_to_i64(&num(json!(-42))), Some(-42));
    }

    #[test]
    fn labels_drop_trailing_zero_fraction() {
        assert_eq!(number_label(&num(json!(2.0))), "2");
        assert_eq!(number_label(&num(json!(2.5))), "2.5");
        assert_eq!(number_label(&num(json!(7))), "7");
    }

    #[test]
    fn millis_round_up_to_seconds() {
        assert_eq!(millis_to_secs_ceil(0), 0);
        assert_eq!(millis_to_secs_ceil(-10), 0);
        assert_eq!(millis_to_secs_ceil(1), 1);
        assert_eq!(millis_to_secs_ceil(60_000), 60);
        assert_eq!(millis_to_secs_ceil(60_001), 61);
        assert_eq!(millis_to_secs_ceil(i64::MAX), 9_223_372_036_854_776);
    }
}
