//! Execution planner.
//!
//! Every tag's canonical rule tree is flattened into one cross-tag list of
//! nodes. Each node produces a column aliased `nN`; composites and
//! applications read their inputs by alias. A node's priority is its tag's
//! hierarchy level plus a fixed weight for its kind:
//!
//! | kind          | weight |
//! |---------------|--------|
//! | condition     | 0      |
//! | custom        | 0      |
//! | tag reference | 1      |
//! | conjunction   | 2      |
//! | disjunction   | 4      |
//! | application   | 8      |
//!
//! so inside a level leaves run before conjunctions, before disjunctions,
//! before the application, and every application of level `n` runs before
//! any tag reference of level `n + 1`. Nodes sharing a priority form a batch
//! and never read each other's outputs.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use tracing::debug;

use crate::graph::{DependencyGraph, RemovedEdge};
use crate::{Condition, PlanError, PlannerOptions, Rule, TagSet};

/// Name of a node's output column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Alias(usize);

impl Alias {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Hierarchy level plus kind weight, compared level first. Rendered as
/// `level.weight`, e.g. `1.8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority {
    pub level: u32,
    pub weight: u8,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.level, self.weight)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A precomputed `(field, transform)` column.
    Transform,
    Condition,
    TagReference,
    Custom,
    Conjunction,
    Disjunction,
    /// Writes the tag name into every matching record's tag list.
    Application,
}

impl NodeKind {
    #[must_use]
    pub fn weight(self) -> u8 {
        match self {
            NodeKind::Transform | NodeKind::Condition | NodeKind::Custom => 0,
            NodeKind::TagReference => 1,
            NodeKind::Conjunction => 2,
            NodeKind::Disjunction => 4,
            NodeKind::Application => 8,
        }
    }

    fn label(self) -> &'static str {
        match self {
            NodeKind::Transform => "transform",
            NodeKind::Condition => "condition",
            NodeKind::TagReference => "tag-ref",
            NodeKind::Custom => "custom",
            NodeKind::Conjunction => "and",
            NodeKind::Disjunction => "or",
            NodeKind::Application => "apply",
        }
    }
}

/// What a node computes. Structural equality is the deduplication key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeOp {
    Transform { field: String, transform: String },
    /// `input` names a precomputed transform column to compare instead of
    /// transforming the field again.
    Condition {
        condition: Condition,
        input: Option<Alias>,
    },
    Custom(String),
    Conjunction(Vec<Alias>),
    Disjunction(Vec<Alias>),
    Apply { tag: String, input: Alias },
}

impl NodeOp {
    /// Aliases this node reads.
    #[must_use]
    pub fn inputs(&self) -> Vec<Alias> {
        match self {
            NodeOp::Transform { .. } | NodeOp::Custom(_) => Vec::new(),
            NodeOp::Condition { input, .. } => input.iter().copied().collect(),
            NodeOp::Conjunction(children) | NodeOp::Disjunction(children) => children.clone(),
            NodeOp::Apply { input, .. } => vec![*input],
        }
    }

    fn single_child(&self) -> Option<Alias> {
        match self {
            NodeOp::Conjunction(children) | NodeOp::Disjunction(children)
                if children.len() == 1 =>
            {
                Some(children[0])
            }
            _ => None,
        }
    }

    fn rewrite_inputs(&mut self, redirect: &HashMap<Alias, Alias>) {
        let lookup = |a: &mut Alias| {
            if let Some(&to) = redirect.get(a) {
                *a = to;
            }
        };
        match self {
            NodeOp::Transform { .. } | NodeOp::Custom(_) => {}
            NodeOp::Condition { input, .. } => {
                if let Some(a) = input {
                    lookup(a);
                }
            }
            NodeOp::Conjunction(children) | NodeOp::Disjunction(children) => {
                children.iter_mut().for_each(lookup);
            }
            NodeOp::Apply { input, .. } => lookup(input),
        }
    }
}

/// One node of an [`ExecutionPlan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanNode {
    tag: String,
    op: NodeOp,
    kind: NodeKind,
    alias: Alias,
    priority: Priority,
}

impl PlanNode {
    /// The tag this node was first created for.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    #[must_use]
    pub fn op(&self) -> &NodeOp {
        &self.op
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    #[must_use]
    pub fn alias(&self) -> Alias {
        self.alias
    }

    #[must_use]
    pub fn priority(&self) -> Priority {
        self.priority
    }
}

impl fmt::Display for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.kind.label();
        match &self.op {
            NodeOp::Transform { field, transform } => {
                write!(f, "{} {label} {} = {field}.{transform}", self.priority, self.alias)
            }
            NodeOp::Condition { condition, input } => {
                write!(f, "{} {label} {} = {condition}", self.priority, self.alias)?;
                if let Some(input) = input {
                    write!(f, " <- {input}")?;
                }
                Ok(())
            }
            NodeOp::Custom(key) => write!(f, "{} {label} {} = {key}", self.priority, self.alias),
            NodeOp::Conjunction(children) | NodeOp::Disjunction(children) => {
                write!(f, "{} {label} {} <- ", self.priority, self.alias)?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{child}")?;
                }
                Ok(())
            }
            NodeOp::Apply { tag, input } => write!(f, "{} {label} {tag} <- {input}", self.priority),
        }
    }
}

/// Nodes sharing one priority; independent of each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    priority: Priority,
    nodes: Vec<PlanNode>,
}

impl Batch {
    #[must_use]
    pub fn priority(&self) -> Priority {
        self.priority
    }

    #[must_use]
    pub fn nodes(&self) -> &[PlanNode] {
        &self.nodes
    }
}

/// The batched evaluation plan for one tag-set snapshot.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    transforms: Vec<PlanNode>,
    batches: Vec<Batch>,
    tags: Vec<String>,
    removed_edges: Vec<RemovedEdge>,
}

impl ExecutionPlan {
    /// Plan `tags` with the passes selected in `options`.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::CyclicDependency`] if the tags form a cycle and
    /// `options.remove_cycles` is off, or [`PlanError::UnsupportedRuleKind`]
    /// if a rule is not in canonical form.
    pub fn build(tags: &TagSet, options: &PlannerOptions) -> Result<Self, PlanError> {
        let mut graph = DependencyGraph::build(tags);
        let removed_edges = if options.remove_cycles {
            graph.remove_cycles()
        } else {
            Vec::new()
        };
        let levels = graph.level_vec()?;

        let mut builder = PlanBuilder::default();
        if options.precompute_transforms {
            builder.precompute(tags);
        }
        for (tag, &level) in tags.iter().zip(&levels) {
            builder.flatten(tag.name(), tag.rule(), level)?;
        }

        let flattened = builder.nodes.len();
        let nodes = optimize(builder.nodes, options);
        let batches = into_batches(nodes);
        let plan = ExecutionPlan {
            transforms: builder.transforms,
            batches,
            tags: tags.names().into_iter().map(str::to_owned).collect(),
            removed_edges,
        };
        debug!(
            tags = tags.len(),
            flattened,
            kept = plan.node_count() - plan.transforms.len(),
            transforms = plan.transforms.len(),
            batches = plan.batches.len(),
            "built execution plan"
        );
        Ok(plan)
    }

    /// Precomputed transform columns, evaluated before the first batch.
    #[must_use]
    pub fn transforms(&self) -> &[PlanNode] {
        &self.transforms
    }

    /// Batches in ascending priority order.
    #[must_use]
    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    /// Transform nodes plus batch nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.transforms.len() + self.batches.iter().map(|b| b.nodes.len()).sum::<usize>()
    }

    /// Names of the tags this plan applies, in declaration order.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Dependency edges dropped to break cycles.
    #[must_use]
    pub fn removed_edges(&self) -> &[RemovedEdge] {
        &self.removed_edges
    }

    pub fn nodes(&self) -> impl Iterator<Item = &PlanNode> {
        self.transforms
            .iter()
            .chain(self.batches.iter().flat_map(|b| b.nodes.iter()))
    }
}

impl fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in self.nodes() {
            writeln!(f, "{node}")?;
        }
        Ok(())
    }
}

#[derive(Default)]
struct PlanBuilder {
    next: usize,
    nodes: Vec<PlanNode>,
    transforms: Vec<PlanNode>,
    transform_aliases: HashMap<(String, String), Alias>,
}

impl PlanBuilder {
    fn alias(&mut self) -> Alias {
        let alias = Alias(self.next);
        self.next += 1;
        alias
    }

    fn push(&mut self, tag: &str, op: NodeOp, kind: NodeKind, level: u32) -> Alias {
        let alias = self.alias();
        self.nodes.push(PlanNode {
            tag: tag.to_owned(),
            op,
            kind,
            alias,
            priority: Priority {
                level,
                weight: kind.weight(),
            },
        });
        alias
    }

    /// One transform node per distinct `(field, transform)` pair. Tag
    /// references are skipped: they read the live tag column.
    fn precompute(&mut self, tags: &TagSet) {
        for tag in tags {
            for rule in tag.rule().subrules() {
                let Rule::Condition(c) = rule else { continue };
                let Some(transform) = &c.transform else { continue };
                if c.is_tag_reference() {
                    continue;
                }
                let key = (c.field.clone(), transform.clone());
                if self.transform_aliases.contains_key(&key) {
                    continue;
                }
                let alias = self.alias();
                self.transforms.push(PlanNode {
                    tag: tag.name().to_owned(),
                    op: NodeOp::Transform {
                        field: key.0.clone(),
                        transform: key.1.clone(),
                    },
                    kind: NodeKind::Transform,
                    alias,
                    priority: Priority { level: 0, weight: 0 },
                });
                self.transform_aliases.insert(key, alias);
            }
        }
    }

    /// Post-order: leaves, then their conjunction, then the disjunction,
    /// then the application.
    fn flatten(&mut self, tag: &str, rule: &Rule, level: u32) -> Result<(), PlanError> {
        let Rule::Disjunction(alternatives) = rule else {
            return Err(unsupported(tag, rule.kind_name()));
        };
        let mut conjunctions = Vec::with_capacity(alternatives.len());
        for alternative in alternatives {
            let Rule::Conjunction(leaves) = alternative else {
                return Err(unsupported(
                    tag,
                    &format!("{} under disjunction", alternative.kind_name()),
                ));
            };
            let mut aliases = Vec::with_capacity(leaves.len());
            for leaf in leaves {
                aliases.push(self.leaf(tag, leaf, level)?);
            }
            conjunctions.push(self.push(
                tag,
                NodeOp::Conjunction(aliases),
                NodeKind::Conjunction,
                level,
            ));
        }
        let input = self.push(
            tag,
            NodeOp::Disjunction(conjunctions),
            NodeKind::Disjunction,
            level,
        );
        self.push(
            tag,
            NodeOp::Apply {
                tag: tag.to_owned(),
                input,
            },
            NodeKind::Application,
            level,
        );
        Ok(())
    }

    fn leaf(&mut self, tag: &str, rule: &Rule, level: u32) -> Result<Alias, PlanError> {
        match rule {
            Rule::Condition(c) => {
                let kind = if c.is_tag_reference() {
                    NodeKind::TagReference
                } else {
                    NodeKind::Condition
                };
                let input = self.transform_input(c, kind);
                let op = NodeOp::Condition {
                    condition: c.clone(),
                    input,
                };
                Ok(self.push(tag, op, kind, level))
            }
            Rule::Custom(key) => {
                Ok(self.push(tag, NodeOp::Custom(key.clone()), NodeKind::Custom, level))
            }
            other => Err(unsupported(
                tag,
                &format!("{} under conjunction", other.kind_name()),
            )),
        }
    }

    fn transform_input(&self, c: &Condition, kind: NodeKind) -> Option<Alias> {
        if kind != NodeKind::Condition {
            return None;
        }
        let transform = c.transform.as_ref()?;
        self.transform_aliases
            .get(&(c.field.clone(), transform.clone()))
            .copied()
    }
}

fn unsupported(tag: &str, kind: &str) -> PlanError {
    PlanError::UnsupportedRuleKind {
        tag: tag.to_owned(),
        kind: kind.to_owned(),
    }
}

/// Single in-order pass over the post-order node list. Inputs are rewritten
/// through `redirect` before a node is inspected, so every redirect target
/// is already final.
///
/// Tag references only merge within one level: a reference whose edge was
/// dropped by cycle removal reads the tag column before its target is
/// applied, and must not stand in for one that reads it after.
fn optimize(nodes: Vec<PlanNode>, options: &PlannerOptions) -> Vec<PlanNode> {
    if !options.collapse_single_child && !options.deduplicate {
        return nodes;
    }
    let before = nodes.len();
    let mut redirect: HashMap<Alias, Alias> = HashMap::new();
    let mut seen: HashMap<(NodeOp, Option<u32>), usize> = HashMap::new();
    let mut kept: Vec<PlanNode> = Vec::with_capacity(nodes.len());
    let (mut collapsed, mut merged) = (0_usize, 0_usize);

    for mut node in nodes {
        node.op.rewrite_inputs(&redirect);
        if options.collapse_single_child {
            if let Some(child) = node.op.single_child() {
                redirect.insert(node.alias, child);
                collapsed += 1;
                continue;
            }
        }
        if options.deduplicate && node.kind != NodeKind::Application {
            let level = (node.kind == NodeKind::TagReference).then_some(node.priority.level);
            let key = (node.op.clone(), level);
            if let Some(&k) = seen.get(&key) {
                let canonical = &mut kept[k];
                canonical.priority = canonical.priority.min(node.priority);
                redirect.insert(node.alias, canonical.alias);
                merged += 1;
                continue;
            }
            seen.insert(key, kept.len());
        }
        kept.push(node);
    }

    debug!(before, after = kept.len(), collapsed, merged, "optimized plan");
    kept
}

fn into_batches(nodes: Vec<PlanNode>) -> Vec<Batch> {
    let mut grouped: BTreeMap<Priority, Vec<PlanNode>> = BTreeMap::new();
    for node in nodes {
        grouped.entry(node.priority).or_default().push(node);
    }
    grouped
        .into_iter()
        .map(|(priority, nodes)| Batch { priority, nodes })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{custom, field, tagged, TagSetBuilder};

    fn priorities(plan: &ExecutionPlan) -> Vec<String> {
        plan.batches().iter().map(|b| b.priority().to_string()).collect()
    }

    fn a_and_b() -> TagSet {
        TagSetBuilder::new()
            .tag("A", field("field1").gt(1_i64))
            .tag("B", tagged("A"))
            .build()
            .unwrap()
    }

    #[test]
    fn plain_plan_orders_by_level_then_kind() {
        let plan = ExecutionPlan::build(&a_and_b(), &PlannerOptions::default()).unwrap();
        assert_eq!(
            priorities(&plan),
            vec!["0.0", "0.2", "0.4", "0.8", "1.1", "1.2", "1.4", "1.8"]
        );
        assert_eq!(plan.node_count(), 8);
        assert!(plan.transforms().is_empty());
        assert!(plan.to_string().contains("1.8 apply B <- n6"));
    }

    #[test]
    fn every_input_comes_from_an_earlier_batch() {
        let tags = TagSetBuilder::new()
            .tag("A", field("x").gt(1_i64).or(field("y").eq("z")))
            .tag("B", tagged("A").and(field("x").gt(1_i64)))
            .tag("C", tagged("B").or(field("y").eq("z")))
            .build()
            .unwrap();
        for options in [PlannerOptions::default(), PlannerOptions::optimized()] {
            let plan = ExecutionPlan::build(&tags, &options).unwrap();
            let mut produced: HashMap<Alias, Priority> = plan
                .transforms()
                .iter()
                .map(|n| (n.alias(), Priority { level: 0, weight: 0 }))
                .collect();
            let transform_aliases: Vec<Alias> = produced.keys().copied().collect();
            for batch in plan.batches() {
                for node in batch.nodes() {
                    for input in node.op().inputs() {
                        let at = produced.get(&input).copied();
                        assert!(at.is_some(), "{input} read before produced");
                        if !transform_aliases.contains(&input) {
                            assert!(at < Some(batch.priority()));
                        }
                    }
                }
                for node in batch.nodes() {
                    produced.insert(node.alias(), batch.priority());
                }
            }
        }
    }

    #[test]
    fn collapse_removes_single_child_composites() {
        let tags = TagSetBuilder::new()
            .tag("A", field("x").gt(1_i64))
            .build()
            .unwrap();
        let options = PlannerOptions {
            collapse_single_child: true,
            ..PlannerOptions::default()
        };
        let plan = ExecutionPlan::build(&tags, &options).unwrap();
        let kinds: Vec<NodeKind> = plan.nodes().map(PlanNode::kind).collect();
        assert_eq!(kinds, vec![NodeKind::Condition, NodeKind::Application]);
        let apply = plan.nodes().last().unwrap();
        assert_eq!(apply.op().inputs(), vec![Alias(0)]);
    }

    #[test]
    fn multi_child_composites_survive_collapse() {
        let tags = TagSetBuilder::new()
            .tag("A", field("x").gt(1_i64).and(field("y").lt(0_i64)).or(custom("k")))
            .build()
            .unwrap();
        let options = PlannerOptions {
            collapse_single_child: true,
            ..PlannerOptions::default()
        };
        let plan = ExecutionPlan::build(&tags, &options).unwrap();
        let kinds: Vec<NodeKind> = plan.nodes().map(PlanNode::kind).collect();
        assert!(kinds.contains(&NodeKind::Conjunction));
        assert!(kinds.contains(&NodeKind::Disjunction));
        // the custom alternative's conjunction is gone
        assert_eq!(kinds.iter().filter(|k| **k == NodeKind::Conjunction).count(), 1);
    }

    #[test]
    fn dedup_merges_shared_conditions_across_tags() {
        let tags = TagSetBuilder::new()
            .tag("A", field("x").gt(1_i64).and(field("y").eq("z")))
            .tag("B", field("x").gt(1_i64).and(field("y").eq("z")))
            .build()
            .unwrap();
        let options = PlannerOptions {
            deduplicate: true,
            ..PlannerOptions::default()
        };
        let plan = ExecutionPlan::build(&tags, &options).unwrap();
        // two leaves, one conjunction, one disjunction, two applications
        assert_eq!(plan.node_count(), 6);
        let applies: Vec<&PlanNode> = plan
            .nodes()
            .filter(|n| n.kind() == NodeKind::Application)
            .collect();
        assert_eq!(applies.len(), 2);
        assert_eq!(applies[0].op().inputs(), applies[1].op().inputs());
    }

    #[test]
    fn dedup_keeps_minimum_priority() {
        // B is declared first but sits one level above A.
        let tags = TagSetBuilder::new()
            .tag("B", tagged("A").and(field("x").gt(1_i64)))
            .tag("A", field("x").gt(1_i64).and(field("q").eq(1_i64)))
            .build()
            .unwrap();
        let options = PlannerOptions {
            deduplicate: true,
            ..PlannerOptions::default()
        };
        let plan = ExecutionPlan::build(&tags, &options).unwrap();
        let shared = plan
            .nodes()
            .find(|n| {
                matches!(n.op(), NodeOp::Condition { condition, .. } if condition.field() == "x")
            })
            .unwrap();
        assert_eq!(shared.priority(), Priority { level: 0, weight: 0 });
        assert_eq!(shared.tag(), "B");
    }

    #[test]
    fn tag_references_merge_only_within_a_level() {
        // X's reference to P is dropped by cycle removal, so X reads P at
        // level 0 while Q reads it at level 2.
        let tags = TagSetBuilder::new()
            .tag("X", tagged("P").or(field("x").gt(1_i64)))
            .tag("P", tagged("X"))
            .tag("Q", tagged("P"))
            .build()
            .unwrap();
        let plan = ExecutionPlan::build(&tags, &PlannerOptions::optimized()).unwrap();
        let refs_to_p: Vec<u32> = plan
            .nodes()
            .filter(|n| n.kind() == NodeKind::TagReference)
            .filter(|n| match n.op() {
                NodeOp::Condition { condition, .. } => condition.referenced_tags() == ["P"],
                _ => false,
            })
            .map(|n| n.priority().level)
            .collect();
        assert_eq!(refs_to_p, vec![0, 2]);
    }

    #[test]
    fn applications_are_never_merged() {
        let tags = TagSetBuilder::new()
            .tag("A", field("x").gt(1_i64))
            .tag("B", field("x").gt(1_i64))
            .build()
            .unwrap();
        let plan = ExecutionPlan::build(&tags, &PlannerOptions::optimized()).unwrap();
        let applied: Vec<&str> = plan
            .nodes()
            .filter_map(|n| match n.op() {
                NodeOp::Apply { tag, .. } => Some(tag.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(applied, vec!["A", "B"]);
        assert_eq!(plan.node_count(), 3);
    }

    #[test]
    fn transforms_are_precomputed_once() {
        let tags = TagSetBuilder::new()
            .tag("A", field("payee").transform("lower").contains("acme"))
            .tag("B", field("payee").transform("lower").eq("globex"))
            .tag("C", field("amount").transform("abs").gt(10_i64).and(tagged("A")))
            .build()
            .unwrap();
        let options = PlannerOptions {
            precompute_transforms: true,
            ..PlannerOptions::default()
        };
        let plan = ExecutionPlan::build(&tags, &options).unwrap();
        let pairs: Vec<(&str, &str)> = plan
            .transforms()
            .iter()
            .filter_map(|n| match n.op() {
                NodeOp::Transform { field, transform } => {
                    Some((field.as_str(), transform.as_str()))
                }
                _ => None,
            })
            .collect();
        assert_eq!(pairs, vec![("payee", "lower"), ("amount", "abs")]);
        let inputs: Vec<Option<Alias>> = plan
            .nodes()
            .filter_map(|n| match n.op() {
                NodeOp::Condition { input, .. } => Some(*input),
                _ => None,
            })
            .collect();
        // payee.lower twice, amount.abs, then the tag reference without input
        assert_eq!(
            inputs,
            vec![Some(Alias(0)), Some(Alias(0)), Some(Alias(1)), None]
        );
    }

    #[test]
    fn unresolved_cycle_is_an_error() {
        let tags = TagSetBuilder::new()
            .tag("A", tagged("B"))
            .tag("B", tagged("A"))
            .build()
            .unwrap();
        let options = PlannerOptions {
            remove_cycles: false,
            ..PlannerOptions::default()
        };
        assert!(matches!(
            ExecutionPlan::build(&tags, &options),
            Err(PlanError::CyclicDependency { .. })
        ));
        let plan = ExecutionPlan::build(&tags, &PlannerOptions::default()).unwrap();
        assert_eq!(plan.removed_edges().len(), 1);
    }

    #[test]
    fn non_canonical_rules_are_rejected() {
        let mut builder = PlanBuilder::default();
        let err = builder.flatten("t", &field("x").eq(1_i64), 0).unwrap_err();
        assert!(matches!(
            err,
            PlanError::UnsupportedRuleKind { ref kind, .. } if kind == "condition"
        ));

        let nested = Rule::Disjunction(vec![Rule::Conjunction(vec![
            field("x").eq(1_i64).or(field("y").eq(2_i64)),
        ])]);
        assert!(matches!(
            builder.flatten("t", &nested, 0),
            Err(PlanError::UnsupportedRuleKind { .. })
        ));
    }
}
