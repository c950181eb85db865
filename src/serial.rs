//! JSON (de)serialization of rules.
//!
//! A rule is stored as its disjunctive normal form: an array with one object
//! per alternative. Each object merges the alternative's conditions by key:
//!
//! ```text
//! [
//!   { "amount.abs": { "gt": 100 }, "payee": { "eq": ["ACME", "ACME GMBH"] } },
//!   { "custom": "is_internal_transfer" }
//! ]
//! ```
//!
//! A comparator entry holding one non-list literal is written as a scalar;
//! anything else is an array with one element per condition, so a list
//! literal appears nested (`{"in": [[1, 2]]}`). Dates are written as
//! `{"date": "YYYY-MM-DD"}`. Object keys come out sorted, which makes the
//! output canonical.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde_json::{Map, Number, Value as Json};

use crate::parse::parse_key;
use crate::types::CUSTOM_KEY;
use crate::{Condition, Rule, RuleError, Value};

const DATE_KEY: &str = "date";
const DATE_FORMAT: &str = "%Y-%m-%d";

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MergedConjunction {
    conditions: BTreeMap<String, BTreeMap<String, Vec<Json>>>,
    custom: Vec<String>,
}

pub(crate) fn rule_to_json(rule: &Rule) -> Result<Json, RuleError> {
    rule.normal_form()?
        .iter()
        .map(|alternative| conjunction_to_json(alternative.as_slice()))
        .collect::<Result<Vec<_>, _>>()
        .map(Json::Array)
}

fn conjunction_to_json(leaves: &[Rule]) -> Result<Json, RuleError> {
    let mut merged = MergedConjunction::default();
    for leaf in leaves {
        match leaf {
            Rule::Condition(c) => merged
                .conditions
                .entry(c.key())
                .or_default()
                .entry(c.comparator.clone())
                .or_default()
                .push(value_to_json(&c.value)?),
            Rule::Custom(key) => merged.custom.push(key.clone()),
            other => {
                return Err(RuleError::malformed(format!(
                    "{} inside a normalised alternative",
                    other.kind_name()
                )))
            }
        }
    }

    let mut object = Map::new();
    for (key, comparators) in merged.conditions {
        let entry: Map<String, Json> = comparators
            .into_iter()
            .map(|(comparator, values)| (comparator, collapse(values)))
            .collect();
        object.insert(key, Json::Object(entry));
    }
    if !merged.custom.is_empty() {
        let custom = merged.custom.into_iter().map(Json::String).collect();
        object.insert(CUSTOM_KEY.to_owned(), collapse(custom));
    }
    Ok(Json::Object(object))
}

/// One non-list element is written bare; everything else stays an array.
fn collapse(mut values: Vec<Json>) -> Json {
    if values.len() == 1 && !values[0].is_array() {
        values.remove(0)
    } else {
        Json::Array(values)
    }
}

pub(crate) fn value_to_json(value: &Value) -> Result<Json, RuleError> {
    Ok(match value {
        Value::Null => Json::Null,
        Value::Int(i) => Json::Number((*i).into()),
        Value::Float(f) => Number::from_f64(*f)
            .map(Json::Number)
            .ok_or_else(|| RuleError::malformed(format!("float literal {f} has no JSON form")))?,
        Value::Bool(b) => Json::Bool(*b),
        Value::String(s) => Json::String(s.clone()),
        Value::Date(d) => {
            let mut object = Map::new();
            object.insert(
                DATE_KEY.to_owned(),
                Json::String(d.format(DATE_FORMAT).to_string()),
            );
            Json::Object(object)
        }
        Value::List(items) => Json::Array(
            items
                .iter()
                .map(value_to_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
    })
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

pub(crate) fn rule_from_json(json: &Json) -> Result<Rule, RuleError> {
    let Json::Array(alternatives) = json else {
        return Err(RuleError::malformed("rule json must be an array"));
    };
    if alternatives.is_empty() {
        return Err(RuleError::malformed("rule json has no alternatives"));
    }
    let alternatives = alternatives
        .iter()
        .map(conjunction_from_json)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Rule::Disjunction(alternatives))
}

fn conjunction_from_json(json: &Json) -> Result<Rule, RuleError> {
    let Json::Object(object) = json else {
        return Err(RuleError::malformed(format!(
            "alternative must be an object, found {json}"
        )));
    };
    if object.is_empty() {
        return Err(RuleError::malformed("alternative has no conditions"));
    }

    let mut leaves = Vec::new();
    for (key, entry) in object {
        if key == CUSTOM_KEY {
            leaves.extend(custom_from_json(entry)?);
            continue;
        }
        let parsed = parse_key(key)?;
        let Json::Object(comparators) = entry else {
            return Err(RuleError::malformed(format!(
                "conditions for '{key}' must be an object"
            )));
        };
        if comparators.is_empty() {
            return Err(RuleError::malformed(format!("no comparator for '{key}'")));
        }
        for (comparator, literal) in comparators {
            for value in literals(key, literal)? {
                let condition = Condition::new(parsed.field, parsed.transform, comparator, value)?;
                leaves.push(Rule::Condition(condition));
            }
        }
    }
    Ok(Rule::Conjunction(leaves))
}

fn custom_from_json(entry: &Json) -> Result<Vec<Rule>, RuleError> {
    let keys: Vec<&Json> = match entry {
        Json::Array(items) if !items.is_empty() => items.iter().collect(),
        Json::String(_) => vec![entry],
        _ => {
            return Err(RuleError::malformed(
                "'custom' must be a string or a non-empty array of strings",
            ))
        }
    };
    keys.into_iter()
        .map(|k| match k {
            Json::String(s) if !s.is_empty() => Ok(Rule::Custom(s.clone())),
            other => Err(RuleError::malformed(format!(
                "invalid custom rule key {other}"
            ))),
        })
        .collect()
}

fn literals(key: &str, literal: &Json) -> Result<Vec<Value>, RuleError> {
    match literal {
        Json::Array(items) if items.is_empty() => Err(RuleError::malformed(format!(
            "empty value list for '{key}'"
        ))),
        Json::Array(items) => items.iter().map(value_from_json).collect(),
        scalar => Ok(vec![value_from_json(scalar)?]),
    }
}

pub(crate) fn value_from_json(json: &Json) -> Result<Value, RuleError> {
    Ok(match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(
                n.as_f64()
                    .ok_or_else(|| RuleError::malformed(format!("unrepresentable number {n}")))?,
            ),
        },
        Json::String(s) => Value::String(s.clone()),
        Json::Array(items) => Value::List(
            items
                .iter()
                .map(value_from_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Json::Object(object) => match (object.len(), object.get(DATE_KEY)) {
            (1, Some(Json::String(s))) => {
                let date = NaiveDate::parse_from_str(s, DATE_FORMAT)
                    .map_err(|e| RuleError::malformed(format!("invalid date '{s}': {e}")))?;
                Value::Date(date)
            }
            _ => {
                return Err(RuleError::malformed(format!(
                    "unsupported literal object {json}"
                )))
            }
        },
    })
}
