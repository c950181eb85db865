//! Row-wise evaluation of rule trees.
//!
//! A rule is first resolved against the registry into a [`PreparedRule`]:
//! operator keys are looked up and regex literals compiled once. The
//! prepared tree is then evaluated against as many records as needed.

use crate::types::{CustomRuleFn, Evaluation, Observation, Predicate, TransformFn};
use crate::{EvalError, Record, Registry, Rule};

pub(crate) enum PreparedRule<'r> {
    Condition {
        field: &'r str,
        transform: Option<TransformFn>,
        predicate: Predicate<'r>,
    },
    Custom(&'r CustomRuleFn),
    Conjunction(Vec<PreparedRule<'r>>),
    Disjunction(Vec<PreparedRule<'r>>),
}

impl<'r> PreparedRule<'r> {
    /// Resolve every key in `rule`.
    pub(crate) fn new(rule: &'r Rule, registry: &'r Registry) -> Result<Self, EvalError> {
        let prepare_all = |children: &'r [Rule]| {
            children
                .iter()
                .map(|child| PreparedRule::new(child, registry))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(match rule {
            Rule::Condition(c) => PreparedRule::Condition {
                field: c.field(),
                transform: c
                    .transform()
                    .map(|key| registry.resolve_transform(key))
                    .transpose()?,
                predicate: registry.prepare(c)?,
            },
            Rule::Custom(key) => PreparedRule::Custom(registry.resolve_custom_rule(key)?),
            Rule::Conjunction(children) => PreparedRule::Conjunction(prepare_all(children)?),
            Rule::Disjunction(children) => PreparedRule::Disjunction(prepare_all(children)?),
        })
    }

    /// Composites evaluate every child, so an error in any child surfaces
    /// even when the result is already decided.
    pub(crate) fn evaluate(&self, record: &Record) -> Result<bool, EvalError> {
        match self {
            PreparedRule::Condition {
                field,
                transform,
                predicate,
            } => test_condition(field, *transform, predicate, record),
            PreparedRule::Custom(f) => f(record),
            PreparedRule::Conjunction(children) => {
                let mut all = true;
                for child in children {
                    all &= child.evaluate(record)?;
                }
                Ok(all)
            }
            PreparedRule::Disjunction(children) => {
                let mut any = false;
                for child in children {
                    any |= child.evaluate(record)?;
                }
                Ok(any)
            }
        }
    }

    pub(crate) fn evaluate_observed(&self, record: &Record) -> Result<Evaluation, EvalError> {
        let mut observations = Vec::new();
        let mut path = Vec::new();
        let outcome = self.observe(record, &mut path, &mut observations)?;
        Ok(Evaluation::new(outcome, observations))
    }

    fn observe(
        &self,
        record: &Record,
        path: &mut Vec<usize>,
        out: &mut Vec<Observation>,
    ) -> Result<bool, EvalError> {
        let outcome = match self {
            PreparedRule::Condition { .. } | PreparedRule::Custom(_) => self.evaluate(record)?,
            PreparedRule::Conjunction(children) | PreparedRule::Disjunction(children) => {
                let is_and = matches!(self, PreparedRule::Conjunction(_));
                let mut acc = is_and;
                for (i, child) in children.iter().enumerate() {
                    path.push(i);
                    let result = child.observe(record, path, out);
                    path.pop();
                    if is_and {
                        acc &= result?;
                    } else {
                        acc |= result?;
                    }
                }
                acc
            }
        };
        out.push(Observation {
            path: path.clone(),
            outcome,
        });
        Ok(outcome)
    }
}

fn test_condition(
    field: &str,
    transform: Option<TransformFn>,
    predicate: &Predicate<'_>,
    record: &Record,
) -> Result<bool, EvalError> {
    let value = record.get(field);
    match transform {
        Some(f) if !value.is_null() => predicate.test(&f(value)?),
        _ => predicate.test(value),
    }
}

pub(crate) fn evaluate(
    rule: &Rule,
    record: &Record,
    registry: &Registry,
) -> Result<bool, EvalError> {
    PreparedRule::new(rule, registry)?.evaluate(record)
}

pub(crate) fn evaluate_observed(
    rule: &Rule,
    record: &Record,
    registry: &Registry,
) -> Result<Evaluation, EvalError> {
    PreparedRule::new(rule, registry)?.evaluate_observed(record)
}
