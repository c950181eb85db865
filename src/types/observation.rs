use std::collections::HashMap;
use std::fmt;

use super::rule::Rule;

/// Outcome of one rule node during a single-record evaluation.
///
/// `path` addresses the node by child indices from the evaluated root
/// (empty for the root itself).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub path: Vec<usize>,
    pub outcome: bool,
}

/// Result of [`Rule::evaluate_observed`]: the root outcome plus one
/// observation per evaluated node, in post-order.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct Evaluation {
    outcome: bool,
    observations: Vec<Observation>,
}

impl Evaluation {
    pub(crate) fn new(outcome: bool, observations: Vec<Observation>) -> Self {
        Self {
            outcome,
            observations,
        }
    }

    #[must_use]
    pub fn outcome(&self) -> bool {
        self.outcome
    }

    #[must_use]
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }
}

/// Per-node match counts folded from many [`Evaluation`]s of the same rule.
///
/// Used to answer "which parts of this tag never matched anything".
#[derive(Debug, Clone, Default)]
pub struct MatchReport {
    evaluations: usize,
    matches: HashMap<Vec<usize>, usize>,
}

impl MatchReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one evaluation into the counts.
    pub fn record(&mut self, evaluation: &Evaluation) {
        self.evaluations += 1;
        for obs in &evaluation.observations {
            let count = self.matches.entry(obs.path.clone()).or_insert(0);
            if obs.outcome {
                *count += 1;
            }
        }
    }

    /// Number of evaluations folded in.
    #[must_use]
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    /// How many evaluations the node at `path` matched in.
    #[must_use]
    pub fn matches(&self, path: &[usize]) -> usize {
        self.matches.get(path).copied().unwrap_or(0)
    }

    /// Subrules of `rule` that were evaluated but never matched, in pre-order.
    #[must_use]
    pub fn never_matched<'r>(&self, rule: &'r Rule) -> Vec<&'r Rule> {
        let mut paths: Vec<&Vec<usize>> = self
            .matches
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(path, _)| path)
            .collect();
        paths.sort();
        paths
            .into_iter()
            .filter_map(|path| rule.at_path(path))
            .collect()
    }
}

impl fmt::Display for MatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} evaluations, {} nodes, root matched {}",
            self.evaluations,
            self.matches.len(),
            self.matches(&[]),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field;

    #[test]
    fn report_folds_counts() {
        let mut report = MatchReport::new();
        report.record(&Evaluation::new(
            true,
            vec![
                Observation { path: vec![0], outcome: true },
                Observation { path: vec![], outcome: true },
            ],
        ));
        report.record(&Evaluation::new(
            false,
            vec![
                Observation { path: vec![0], outcome: false },
                Observation { path: vec![], outcome: false },
            ],
        ));
        assert_eq!(report.evaluations(), 2);
        assert_eq!(report.matches(&[]), 1);
        assert_eq!(report.matches(&[0]), 1);
        assert_eq!(report.matches(&[7]), 0);
    }

    #[test]
    fn never_matched_resolves_paths() {
        let rule = field("a").eq(1_i64).or(field("b").eq(2_i64));
        let mut report = MatchReport::new();
        report.record(&Evaluation::new(
            true,
            vec![
                Observation { path: vec![0], outcome: true },
                Observation { path: vec![1], outcome: false },
                Observation { path: vec![], outcome: true },
            ],
        ));
        assert_eq!(report.never_matched(&rule), vec![&field("b").eq(2_i64)]);
    }
}
