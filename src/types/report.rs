use std::fmt;
use std::time::Duration;

use crate::plan::{Alias, NodeKind};

/// Match count of one executed plan node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMatch {
    pub alias: Alias,
    pub tag: String,
    pub kind: NodeKind,
    pub matches: usize,
}

/// Detailed run report returned by
/// [`PlannedTagging::tag_detailed()`](crate::PlannedTagging::tag_detailed).
///
/// Contains how many records each node matched, in execution order, the
/// number of batches executed and the wall-clock duration of the run.
#[derive(Debug, Clone)]
#[must_use]
pub struct PlanReport {
    nodes: Vec<NodeMatch>,
    batches: usize,
    records: usize,
    duration: Duration,
}

impl PlanReport {
    pub(crate) fn new(
        nodes: Vec<NodeMatch>,
        batches: usize,
        records: usize,
        duration: Duration,
    ) -> Self {
        Self {
            nodes,
            batches,
            records,
            duration,
        }
    }

    /// Per-node match counts in execution order.
    #[must_use]
    pub fn nodes(&self) -> &[NodeMatch] {
        &self.nodes
    }

    #[must_use]
    pub fn matches(&self, alias: Alias) -> Option<usize> {
        self.nodes
            .iter()
            .find(|n| n.alias == alias)
            .map(|n| n.matches)
    }

    /// Records matched by `tag`'s rule.
    #[must_use]
    pub fn applied(&self, tag: &str) -> usize {
        self.nodes
            .iter()
            .find(|n| n.kind == NodeKind::Application && n.tag == tag)
            .map_or(0, |n| n.matches)
    }

    /// Nodes that matched no record.
    pub fn never_matched(&self) -> impl Iterator<Item = &NodeMatch> {
        self.nodes.iter().filter(|n| n.matches == 0)
    }

    #[must_use]
    pub fn batches(&self) -> usize {
        self.batches
    }

    #[must_use]
    pub fn records(&self) -> usize {
        self.records
    }

    /// Wall-clock duration of the run.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl fmt::Display for PlanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records, {} batches, {} nodes",
            self.records,
            self.batches,
            self.nodes.len()
        )?;
        write!(f, ", duration: {:?}", self.duration)
    }
}
