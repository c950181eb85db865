//! Built-in transforms and comparators registered by
//! [`Registry::standard()`](crate::Registry::standard).

use std::cmp::Ordering;

use chrono::Datelike;

use crate::{EvalError, Value};

// ---------------------------------------------------------------------------
// Transforms
// ---------------------------------------------------------------------------

pub(crate) fn lower(v: &Value) -> Result<Value, EvalError> {
    map_str("lower", v, str::to_lowercase)
}

pub(crate) fn upper(v: &Value) -> Result<Value, EvalError> {
    map_str("upper", v, str::to_uppercase)
}

pub(crate) fn strip(v: &Value) -> Result<Value, EvalError> {
    map_str("strip", v, |s| s.trim().to_owned())
}

pub(crate) fn abs(v: &Value) -> Result<Value, EvalError> {
    match v {
        Value::Int(i) => Ok(Value::Int(i.saturating_abs())),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => Err(EvalError::unary_mismatch("abs", other)),
    }
}

pub(crate) fn year(v: &Value) -> Result<Value, EvalError> {
    map_date("year", v, |d| i64::from(d.year()))
}

pub(crate) fn month(v: &Value) -> Result<Value, EvalError> {
    map_date("month", v, |d| i64::from(d.month()))
}

pub(crate) fn day(v: &Value) -> Result<Value, EvalError> {
    map_date("day", v, |d| i64::from(d.day()))
}

/// Monday is 0.
pub(crate) fn weekday(v: &Value) -> Result<Value, EvalError> {
    map_date("weekday", v, |d| i64::from(d.weekday().num_days_from_monday()))
}

fn map_str(op: &str, v: &Value, f: impl Fn(&str) -> String) -> Result<Value, EvalError> {
    match v {
        Value::String(s) => Ok(Value::String(f(s))),
        other => Err(EvalError::unary_mismatch(op, other)),
    }
}

fn map_date(
    op: &str,
    v: &Value,
    f: impl Fn(&chrono::NaiveDate) -> i64,
) -> Result<Value, EvalError> {
    match v {
        Value::Date(d) => Ok(Value::Int(f(d))),
        other => Err(EvalError::unary_mismatch(op, other)),
    }
}

// ---------------------------------------------------------------------------
// Comparators
// ---------------------------------------------------------------------------

pub(crate) fn eq(lhs: &Value, rhs: &Value) -> Result<bool, EvalError> {
    lhs.loose_eq(rhs).ok_or_else(|| EvalError::mismatch("eq", lhs, rhs))
}

pub(crate) fn ne(lhs: &Value, rhs: &Value) -> Result<bool, EvalError> {
    lhs.loose_eq(rhs)
        .map(|equal| !equal)
        .ok_or_else(|| EvalError::mismatch("ne", lhs, rhs))
}

pub(crate) fn gt(lhs: &Value, rhs: &Value) -> Result<bool, EvalError> {
    order("gt", lhs, rhs, |o| o == Ordering::Greater)
}

pub(crate) fn ge(lhs: &Value, rhs: &Value) -> Result<bool, EvalError> {
    order("ge", lhs, rhs, |o| o != Ordering::Less)
}

pub(crate) fn lt(lhs: &Value, rhs: &Value) -> Result<bool, EvalError> {
    order("lt", lhs, rhs, |o| o == Ordering::Less)
}

pub(crate) fn le(lhs: &Value, rhs: &Value) -> Result<bool, EvalError> {
    order("le", lhs, rhs, |o| o != Ordering::Greater)
}

/// Substring for strings; element membership for lists. A list on the right
/// of a list means "contains any of".
pub(crate) fn contains(lhs: &Value, rhs: &Value) -> Result<bool, EvalError> {
    match (lhs, rhs) {
        (Value::String(hay), Value::String(needle)) => Ok(hay.contains(needle.as_str())),
        (Value::List(items), Value::List(wanted)) => {
            Ok(wanted.iter().any(|w| list_has(items, w)))
        }
        (Value::List(items), needle) => Ok(list_has(items, needle)),
        _ => Err(EvalError::mismatch("contains", lhs, rhs)),
    }
}

pub(crate) fn startswith(lhs: &Value, rhs: &Value) -> Result<bool, EvalError> {
    match (lhs, rhs) {
        (Value::String(s), Value::String(prefix)) => Ok(s.starts_with(prefix.as_str())),
        _ => Err(EvalError::mismatch("startswith", lhs, rhs)),
    }
}

pub(crate) fn endswith(lhs: &Value, rhs: &Value) -> Result<bool, EvalError> {
    match (lhs, rhs) {
        (Value::String(s), Value::String(suffix)) => Ok(s.ends_with(suffix.as_str())),
        _ => Err(EvalError::mismatch("endswith", lhs, rhs)),
    }
}

/// Set membership: `lhs` is one of the values in the `rhs` list. A list on
/// the left matches if the two lists overlap.
pub(crate) fn is_in(lhs: &Value, rhs: &Value) -> Result<bool, EvalError> {
    let Value::List(set) = rhs else {
        return Err(EvalError::mismatch("in", lhs, rhs));
    };
    match lhs {
        Value::List(items) => Ok(items.iter().any(|item| list_has(set, item))),
        single => Ok(list_has(set, single)),
    }
}

pub(crate) fn not_in(lhs: &Value, rhs: &Value) -> Result<bool, EvalError> {
    is_in(lhs, rhs)
        .map(|found| !found)
        .map_err(|_| EvalError::mismatch("not_in", lhs, rhs))
}

fn list_has(items: &[Value], needle: &Value) -> bool {
    items.iter().any(|item| item.loose_eq(needle) == Some(true))
}

fn order(
    op: &str,
    lhs: &Value,
    rhs: &Value,
    accept: impl Fn(Ordering) -> bool,
) -> Result<bool, EvalError> {
    match lhs.partial_cmp_value(rhs) {
        Some(ordering) => Ok(accept(ordering)),
        // NaN has no order but is still a number
        None if is_number(lhs) && is_number(rhs) => Ok(false),
        None => Err(EvalError::mismatch(op, lhs, rhs)),
    }
}

fn is_number(v: &Value) -> bool {
    matches!(v, Value::Int(_) | Value::Float(_))
}
