//! Basic functions runtime.
//!
//! Integer inputs stay integers where the operation allows it; everything else
//! goes through `f64`. Non-numeric inputs yield `None`.

use crate::data::SoyValue;

/// Combines two maps; keys in `second` win.
pub fn augment_map(first: &SoyValue, second: &SoyValue) -> Option<SoyValue> {
    match (first, second) {
        (SoyValue::Map(a), SoyValue::Map(b)) => {
            let mut merged = a.clone();
            merged.extend(b.iter().map(|(k, v)| (k.clone(), v.clone())));
            Some(SoyValue::Map(merged))
        }
        _ => None,
    }
}

pub fn ceil(arg: &SoyValue) -> Option<i64> {
    match arg {
        SoyValue::Integer(i) => Some(*i),
        SoyValue::Float(f) => Some(f.ceil() as i64),
        _ => None,
    }
}

pub fn floor(arg: &SoyValue) -> Option<i64> {
    match arg {
        SoyValue::Integer(i) => Some(*i),
        SoyValue::Float(f) => Some(f.floor() as i64),
        _ => None,
    }
}

pub fn keys(map: &SoyValue) -> Option<Vec<SoyValue>> {
    match map {
        SoyValue::Map(entries) => Some(entries.keys().cloned().map(SoyValue::String).collect()),
        _ => None,
    }
}

pub fn max(a: &SoyValue, b: &SoyValue) -> Option<SoyValue> {
    match (a, b) {
        (SoyValue::Integer(x), SoyValue::Integer(y)) => Some(SoyValue::Integer(*x.max(y))),
        _ => Some(SoyValue::Float(a.number_value()?.max(b.number_value()?))),
    }
}

pub fn min(a: &SoyValue, b: &SoyValue) -> Option<SoyValue> {
    match (a, b) {
        (SoyValue::Integer(x), SoyValue::Integer(y)) => Some(SoyValue::Integer(*x.min(y))),
        _ => Some(SoyValue::Float(a.number_value()?.min(b.number_value()?))),
    }
}

/// `None` for unparsable input and for NaN. Surrounding whitespace is not
/// accepted.
pub fn parse_float(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|f| !f.is_nan())
}

pub fn parse_int(s: &str) -> Option<i64> {
    s.parse::<i64>().ok()
}

/// Rounds to `digits_after_point` decimal places. Zero and negative digit
/// counts produce an integer. Positive ones always produce a float, even for
/// integer input.
pub fn round(value: &SoyValue, digits_after_point: i32) -> Option<SoyValue> {
    if digits_after_point == 0 {
        if let SoyValue::Integer(i) = value {
            return Some(SoyValue::Integer(*i));
        }
    }
    let v = value.number_value()?;
    if digits_after_point == 0 {
        Some(SoyValue::Integer(round_half_up(v) as i64))
    } else if digits_after_point > 0 {
        let shift = 10f64.powi(digits_after_point);
        Some(SoyValue::Float(round_half_up(v * shift) / shift))
    } else {
        let shift = 10f64.powi(digits_after_point.checked_neg()?);
        Some(SoyValue::Integer((round_half_up(v / shift) * shift) as i64))
    }
}

// Rounds .5 towards positive infinity.
fn round_half_up(v: f64) -> f64 {
    (v + 0.5).floor()
}
