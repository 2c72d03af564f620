//! Coercion of loosely typed generator output into canonical frame fields.
//!
//! Every function here is total: malformed input degrades to the neutral
//! value of the field instead of producing an error.

use super::constants::{AXIS_COUNT, BUTTON_COUNT};
use serde_json::Value;

pub(crate) fn buttons(raw: Option<&Value>) -> [bool; BUTTON_COUNT] {
    let mut out = [false; BUTTON_COUNT];
    if let Some(Value::Array(entries)) = raw {
        for (slot, entry) in out.iter_mut().zip(entries) {
            *slot = truthy(entry);
        }
    }
    out
}

pub(crate) fn axes(raw: Option<&Value>) -> [f32; AXIS_COUNT] {
    let mut out = [0.0; AXIS_COUNT];
    if let Some(Value::Array(entries)) = raw {
        for (slot, entry) in out.iter_mut().zip(entries) {
            *slot = clamp_axis(to_float(entry));
        }
    }
    out
}

pub(crate) fn dpad(raw: Option<&Value>) -> (i8, i8) {
    let Some(Value::Array(entries)) = raw else {
        return (0, 0);
    };
    if entries.len() < 2 {
        return (0, 0);
    }
    match (to_int(&entries[0]), to_int(&entries[1])) {
        (Some(hx), Some(hy)) => (clamp_hat(hx), clamp_hat(hy)),
        _ => (0, 0),
    }
}

/// Clamps into [-1, 1]; NaN collapses to the resting position.
///
/// Intentionally not a plain min/max clamp, which would pin NaN to full
/// deflection at 1.0.
pub(crate) fn clamp_axis(value: f64) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-1.0, 1.0) as f32
    }
}

pub(crate) fn clamp_hat(value: i64) -> i8 {
    value.clamp(-1, 1) as i8
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn to_float(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.unwrap_or(0.0)
}

// Floats truncate toward zero, strings must hold an integer literal
fn to_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite())
                .map(|f| f.trunc() as i64)
        }),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}
