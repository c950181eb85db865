//! Column-wise execution of an [`ExecutionPlan`].
//!
//! Each node is evaluated once over the whole record set. Outputs are keyed
//! by alias and written only after the batch that produced them completes,
//! so nodes of one batch share nothing mutable and may run in parallel.

use std::collections::HashMap;
use std::time::Instant;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{debug, trace};

use crate::plan::{Alias, ExecutionPlan, NodeKind, NodeOp, PlanNode};
use crate::types::{NodeMatch, PlanReport};
use crate::{Condition, EvalError, PlanError, RecordSet, Registry, TaggingError, Value, TAGS_FIELD};

enum Column {
    Mask(Vec<bool>),
    Values(Vec<Value>),
}

/// Read-only view handed to every node of one batch.
struct BatchInput<'a> {
    records: &'a RecordSet,
    registry: &'a Registry,
    outputs: &'a HashMap<Alias, Column>,
    live_tags: Option<&'a [Value]>,
}

impl BatchInput<'_> {
    fn mask(&self, alias: Alias) -> Result<&[bool], PlanError> {
        match self.outputs.get(&alias) {
            Some(Column::Mask(mask)) => Ok(mask),
            _ => Err(missing(alias)),
        }
    }

    fn values(&self, alias: Alias) -> Result<&[Value], PlanError> {
        match self.outputs.get(&alias) {
            Some(Column::Values(values)) => Ok(values),
            _ => Err(missing(alias)),
        }
    }
}

fn missing(alias: Alias) -> PlanError {
    PlanError::MissingInput {
        alias: alias.to_string(),
    }
}

/// Run `plan` over `records`, starting from `tag_lists` (one per record).
/// Returns the final tag lists in row order.
pub(crate) fn execute(
    plan: &ExecutionPlan,
    records: &RecordSet,
    registry: &Registry,
    mut tag_lists: Vec<Vec<String>>,
) -> Result<(Vec<Vec<String>>, PlanReport), TaggingError> {
    let start = Instant::now();
    let mut outputs: HashMap<Alias, Column> = HashMap::with_capacity(plan.node_count());
    let mut stats = Vec::with_capacity(plan.node_count());

    for node in plan.transforms() {
        let NodeOp::Transform { field, transform } = node.op() else {
            continue;
        };
        let column = records
            .iter()
            .map(|r| registry.apply_transform(Some(transform), r.get(field)))
            .collect::<Result<Vec<_>, _>>()?;
        trace!(
            alias = %node.alias(),
            field = %field,
            transform = %transform,
            "computed transform column"
        );
        outputs.insert(node.alias(), Column::Values(column));
    }

    for batch in plan.batches() {
        let reads_tags = batch
            .nodes()
            .iter()
            .any(|n| n.kind() == NodeKind::TagReference);
        let live = reads_tags.then(|| tag_column(&tag_lists));
        let masks = {
            let input = BatchInput {
                records,
                registry,
                outputs: &outputs,
                live_tags: live.as_deref(),
            };
            evaluate_batch(batch.nodes(), &input)?
        };
        debug!(priority = %batch.priority(), nodes = batch.nodes().len(), "executed batch");

        for (node, mask) in batch.nodes().iter().zip(masks) {
            let matches = mask.iter().filter(|&&m| m).count();
            trace!(alias = %node.alias(), tag = node.tag(), matches, "evaluated node");
            if let NodeOp::Apply { tag, .. } = node.op() {
                for (list, _) in tag_lists.iter_mut().zip(&mask).filter(|(_, m)| **m) {
                    if !list.contains(tag) {
                        list.push(tag.clone());
                    }
                }
            }
            stats.push(NodeMatch {
                alias: node.alias(),
                tag: node.tag().to_owned(),
                kind: node.kind(),
                matches,
            });
            outputs.insert(node.alias(), Column::Mask(mask));
        }
    }

    let report = PlanReport::new(stats, plan.batches().len(), records.len(), start.elapsed());
    Ok((tag_lists, report))
}

fn tag_column(tag_lists: &[Vec<String>]) -> Vec<Value> {
    tag_lists
        .iter()
        .map(|tags| Value::List(tags.iter().cloned().map(Value::String).collect()))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn evaluate_batch(
    nodes: &[PlanNode],
    input: &BatchInput<'_>,
) -> Result<Vec<Vec<bool>>, TaggingError> {
    nodes.iter().map(|node| evaluate_node(node, input)).collect()
}

#[cfg(feature = "parallel")]
fn evaluate_batch(
    nodes: &[PlanNode],
    input: &BatchInput<'_>,
) -> Result<Vec<Vec<bool>>, TaggingError> {
    nodes.par_iter().map(|node| evaluate_node(node, input)).collect()
}

fn evaluate_node(node: &PlanNode, input: &BatchInput<'_>) -> Result<Vec<bool>, TaggingError> {
    match node.op() {
        NodeOp::Condition { condition, input: column } => {
            evaluate_condition(condition, *column, input)
        }
        NodeOp::Custom(key) => {
            let f = input
                .registry
                .custom_rule(key)
                .ok_or_else(|| EvalError::UnknownRuleKey { key: key.clone() })?;
            Ok(input.records.iter().map(|r| f(r)).collect::<Result<_, _>>()?)
        }
        NodeOp::Conjunction(children) => Ok(combine(children, input, true)?),
        NodeOp::Disjunction(children) => Ok(combine(children, input, false)?),
        NodeOp::Apply { input: from, .. } => Ok(input.mask(*from)?.to_vec()),
        // Transform nodes run in the pre-pass and never appear in a batch.
        NodeOp::Transform { .. } => Err(missing(node.alias()).into()),
    }
}

fn evaluate_condition(
    condition: &Condition,
    column: Option<Alias>,
    input: &BatchInput<'_>,
) -> Result<Vec<bool>, TaggingError> {
    let predicate = input.registry.prepare(condition)?;
    let registry = input.registry;
    let mask = if let Some(alias) = column {
        input
            .values(alias)?
            .iter()
            .map(|v| predicate.test(v))
            .collect::<Result<Vec<_>, _>>()?
    } else if condition.is_tag_reference() {
        let live = input.live_tags.ok_or_else(|| PlanError::MissingInput {
            alias: TAGS_FIELD.to_owned(),
        })?;
        live.iter()
            .map(|tags| predicate.test(&registry.apply_transform(condition.transform(), tags)?))
            .collect::<Result<Vec<_>, _>>()?
    } else {
        input
            .records
            .iter()
            .map(|r| {
                let value = r.get(condition.field());
                let lhs = registry.apply_transform(condition.transform(), value)?;
                predicate.test(&lhs)
            })
            .collect::<Result<Vec<_>, _>>()?
    };
    Ok(mask)
}

fn combine(children: &[Alias], input: &BatchInput<'_>, all: bool) -> Result<Vec<bool>, PlanError> {
    let mut acc = vec![all; input.records.len()];
    for &child in children {
        let mask = input.mask(child)?;
        for (a, &m) in acc.iter_mut().zip(mask) {
            if all {
                *a &= m;
            } else {
                *a |= m;
            }
        }
    }
    Ok(acc)
}
