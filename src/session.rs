//! Tagging entry points: the row-wise reference implementation, the planned
//! implementation and the record-level helpers exposed to callers.

use std::sync::Arc;

use crate::evaluate::PreparedRule;
use crate::execute::execute;
use crate::graph::DependencyGraph;
use crate::plan::ExecutionPlan;
use crate::types::{MatchReport, PlanReport};
use crate::{
    PlannerOptions, RecordSet, Registry, Rule, Tag, TagSet, TaggingError, TaggingOptions,
};

/// Computes the final tag lists of a record set for a fixed tag-set snapshot.
pub trait Tagging {
    /// Return a copy of `records` with every record's tag list updated.
    ///
    /// # Errors
    ///
    /// Returns [`TaggingError`] if a rule fails to evaluate.
    fn tag_records(&self, records: &RecordSet) -> Result<RecordSet, TaggingError>;
}

/// Starting tag lists: the input lists, minus the managed tags when
/// `remove_old_tags` is on.
fn initial_tag_lists<S: AsRef<str>>(
    records: &RecordSet,
    managed: &[S],
    remove_old_tags: bool,
) -> Vec<Vec<String>> {
    let mut lists = records.tag_lists();
    if remove_old_tags {
        for list in &mut lists {
            list.retain(|t| !managed.iter().any(|m| m.as_ref() == t));
        }
    }
    lists
}

fn add_tag(list: &mut Vec<String>, tag: &str) {
    if !list.iter().any(|t| t == tag) {
        list.push(tag.to_owned());
    }
}

/// Reference implementation: evaluates every tag's full rule tree against
/// every record, row by row.
///
/// Tags are processed one hierarchy level at a time. All tags of a level see
/// the tag lists as they stood after the previous level, which is the same
/// visibility the planner's batches give. Cycles are removed the same way
/// the planner removes them.
#[derive(Debug, Clone)]
pub struct LinearTagging {
    tags: TagSet,
    registry: Arc<Registry>,
    options: TaggingOptions,
    levels: Vec<Vec<usize>>,
}

impl LinearTagging {
    /// # Errors
    ///
    /// Returns [`TaggingError::Rule`] if a tag references an unregistered key.
    pub fn new(tags: TagSet, registry: Arc<Registry>) -> Result<Self, TaggingError> {
        tags.validate(&registry)?;
        let mut graph = DependencyGraph::build(&tags);
        graph.remove_cycles();
        let mut levels: Vec<Vec<usize>> = Vec::new();
        for (i, level) in graph.level_order()? {
            let level = level as usize;
            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(i);
        }
        Ok(Self {
            tags,
            registry,
            options: TaggingOptions::default(),
            levels,
        })
    }

    #[must_use]
    pub fn with_options(mut self, options: TaggingOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    /// Tag `records` and fold every evaluation into one [`MatchReport`] per
    /// tag, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`TaggingError`] if a rule fails to evaluate.
    pub fn match_reports(
        &self,
        records: &RecordSet,
    ) -> Result<(RecordSet, Vec<(String, MatchReport)>), TaggingError> {
        let mut reports: Vec<MatchReport> = vec![MatchReport::new(); self.tags.len()];
        let tagged = self.run(records, Some(&mut reports))?;
        let named = self
            .tags
            .iter()
            .map(|t| t.name().to_owned())
            .zip(reports)
            .collect();
        Ok((tagged, named))
    }

    fn run(
        &self,
        records: &RecordSet,
        mut reports: Option<&mut Vec<MatchReport>>,
    ) -> Result<RecordSet, TaggingError> {
        let tags: Vec<&Tag> = self.tags.iter().collect();
        let prepared = tags
            .iter()
            .map(|tag| PreparedRule::new(tag.rule(), &self.registry))
            .collect::<Result<Vec<_>, _>>()?;
        let names = self.tags.names();
        let mut lists = initial_tag_lists(records, &names, self.options.remove_old_tags);

        for level in &self.levels {
            let working = records.with_tag_lists(lists.clone());
            let mut matched: Vec<(usize, &str)> = Vec::new();
            for &t in level {
                let (tag, rule) = (tags[t], &prepared[t]);
                for (row, record) in working.iter().enumerate() {
                    let outcome = match reports.as_deref_mut() {
                        Some(reports) => {
                            let evaluation = rule.evaluate_observed(record)?;
                            reports[t].record(&evaluation);
                            evaluation.outcome()
                        }
                        None => rule.evaluate(record)?,
                    };
                    if outcome {
                        matched.push((row, tag.name()));
                    }
                }
            }
            for (row, name) in matched {
                add_tag(&mut lists[row], name);
            }
        }
        Ok(records.with_tag_lists(lists))
    }
}

impl Tagging for LinearTagging {
    fn tag_records(&self, records: &RecordSet) -> Result<RecordSet, TaggingError> {
        self.run(records, None)
    }
}

/// Tagging through a prebuilt [`ExecutionPlan`].
///
/// The plan is built once at construction and reused for every run; the
/// value is immutable and can be shared across threads.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use tagplan::{
///     PlannedTagging, PlannerOptions, Record, RecordSet, Registry, TagSetBuilder, Tagging,
///     field, tagged,
/// };
///
/// let tags = TagSetBuilder::new()
///     .tag("A", field("field1").gt(1_i64))
///     .tag("B", tagged("A"))
///     .build()
///     .unwrap();
/// let tagging =
///     PlannedTagging::new(tags, Arc::new(Registry::standard()), PlannerOptions::optimized())
///         .unwrap();
///
/// let records = RecordSet::new(vec![
///     Record::new().set("field1", 2_i64),
///     Record::new().set("field1", 0_i64),
/// ]);
/// let tagged = tagging.tag_records(&records).unwrap();
/// assert_eq!(tagged.records()[0].tags(), vec!["A", "B"]);
/// assert!(tagged.records()[1].tags().is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct PlannedTagging {
    plan: ExecutionPlan,
    registry: Arc<Registry>,
    options: TaggingOptions,
}

impl PlannedTagging {
    /// Validate `tags` against `registry` and build the plan.
    ///
    /// # Errors
    ///
    /// Returns [`TaggingError::Rule`] for an unregistered key or
    /// [`TaggingError::Plan`] if planning fails.
    pub fn new(
        tags: TagSet,
        registry: Arc<Registry>,
        planner: PlannerOptions,
    ) -> Result<Self, TaggingError> {
        tags.validate(&registry)?;
        let plan = ExecutionPlan::build(&tags, &planner)?;
        Ok(Self {
            plan,
            registry,
            options: TaggingOptions::default(),
        })
    }

    #[must_use]
    pub fn with_options(mut self, options: TaggingOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    /// Tag `records` and report per-node match counts.
    ///
    /// # Errors
    ///
    /// Returns [`TaggingError`] if a node fails to evaluate.
    pub fn tag_detailed(
        &self,
        records: &RecordSet,
    ) -> Result<(RecordSet, PlanReport), TaggingError> {
        let start = initial_tag_lists(records, self.plan.tags(), self.options.remove_old_tags);
        let (lists, report) = execute(&self.plan, records, &self.registry, start)?;
        Ok((records.with_tag_lists(lists), report))
    }
}

impl Tagging for PlannedTagging {
    fn tag_records(&self, records: &RecordSet) -> Result<RecordSet, TaggingError> {
        self.tag_detailed(records).map(|(tagged, _)| tagged)
    }
}

/// One boolean per record: whether `rule` matches it.
///
/// # Errors
///
/// Returns [`TaggingError::Rule`] for an unregistered key and
/// [`TaggingError::Eval`] if evaluation fails on any record.
pub fn get_index_for_rule(
    records: &RecordSet,
    rule: &Rule,
    registry: &Registry,
) -> Result<Vec<bool>, TaggingError> {
    registry.validate(rule)?;
    let prepared = PreparedRule::new(rule, registry)?;
    Ok(records
        .iter()
        .map(|r| prepared.evaluate(r))
        .collect::<Result<Vec<_>, _>>()?)
}

/// The records matching `rule`.
///
/// # Errors
///
/// Same as [`get_index_for_rule`].
pub fn filter(
    records: &RecordSet,
    rule: &Rule,
    registry: &Registry,
) -> Result<RecordSet, TaggingError> {
    let mask = get_index_for_rule(records, rule, registry)?;
    Ok(records.select(&mask))
}

/// The records not matching `rule`.
///
/// # Errors
///
/// Same as [`get_index_for_rule`].
pub fn filter_negated(
    records: &RecordSet,
    rule: &Rule,
    registry: &Registry,
) -> Result<RecordSet, TaggingError> {
    let mask: Vec<bool> = get_index_for_rule(records, rule, registry)?
        .into_iter()
        .map(|m| !m)
        .collect();
    Ok(records.select(&mask))
}

/// Apply one tag. With `remove_old_tags` the tag is first stripped from
/// every record, so records that no longer match lose it.
///
/// # Errors
///
/// Same as [`get_index_for_rule`].
pub fn tag(
    records: &RecordSet,
    tag: &Tag,
    registry: &Registry,
    remove_old_tags: bool,
) -> Result<RecordSet, TaggingError> {
    let mut lists = initial_tag_lists(records, &[tag.name()], remove_old_tags);
    let working = records.with_tag_lists(lists.clone());
    let mask = get_index_for_rule(&working, tag.rule(), registry)?;
    for (list, matched) in lists.iter_mut().zip(mask) {
        if matched {
            add_tag(list, tag.name());
        }
    }
    Ok(records.with_tag_lists(lists))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{custom, field, tagged, Record, TagSetBuilder};

    fn registry() -> Arc<Registry> {
        Arc::new(Registry::standard())
    }

    fn records() -> RecordSet {
        RecordSet::new(vec![
            Record::new().set("field1", 2_i64),
            Record::new().set("field1", 0_i64),
        ])
    }

    fn a_and_b() -> TagSet {
        TagSetBuilder::new()
            .tag("A", field("field1").gt(1_i64))
            .tag("B", tagged("A"))
            .build()
            .unwrap()
    }

    #[test]
    fn linear_and_planned_agree_on_dependent_tags() {
        let linear = LinearTagging::new(a_and_b(), registry()).unwrap();
        let planned =
            PlannedTagging::new(a_and_b(), registry(), PlannerOptions::optimized()).unwrap();
        let expected = linear.tag_records(&records()).unwrap();
        assert_eq!(planned.tag_records(&records()).unwrap(), expected);
        assert_eq!(expected.records()[0].tags(), vec!["A", "B"]);
        assert!(expected.records()[1].tags().is_empty());
    }

    #[test]
    fn same_level_tags_do_not_see_each_other() {
        // After cycle removal A keeps no dependency and B depends on A, so
        // A's reference to B never sees B in either implementation.
        let tags = TagSetBuilder::new()
            .tag("A", tagged("B").or(field("field1").gt(1_i64)))
            .tag("B", tagged("A"))
            .build()
            .unwrap();
        let linear = LinearTagging::new(tags.clone(), registry()).unwrap();
        let planned = PlannedTagging::new(tags, registry(), PlannerOptions::default()).unwrap();
        assert_eq!(
            linear.tag_records(&records()).unwrap(),
            planned.tag_records(&records()).unwrap()
        );
    }

    #[test]
    fn old_tags_are_replaced_foreign_tags_kept() {
        let tags = TagSetBuilder::new()
            .tag("A", field("field1").gt(1_i64))
            .build()
            .unwrap();
        let input = RecordSet::new(vec![
            Record::new().set("field1", 0_i64).with_tags(["A", "manual"]),
        ]);
        let planned =
            PlannedTagging::new(tags.clone(), registry(), PlannerOptions::default()).unwrap();
        assert_eq!(planned.tag_records(&input).unwrap().records()[0].tags(), vec!["manual"]);

        let keep = TaggingOptions {
            remove_old_tags: false,
        };
        let planned = planned.with_options(keep);
        assert_eq!(
            planned.tag_records(&input).unwrap().records()[0].tags(),
            vec!["A", "manual"]
        );
        let linear = LinearTagging::new(tags, registry()).unwrap().with_options(keep);
        assert_eq!(
            linear.tag_records(&input).unwrap().records()[0].tags(),
            vec!["A", "manual"]
        );
    }

    #[test]
    fn unknown_keys_fail_at_construction() {
        let tags = TagSetBuilder::new()
            .tag("A", custom("is_payday"))
            .build()
            .unwrap();
        assert!(matches!(
            PlannedTagging::new(tags.clone(), registry(), PlannerOptions::default()),
            Err(TaggingError::Rule(_))
        ));
        assert!(LinearTagging::new(tags, registry()).is_err());
    }

    #[test]
    fn match_reports_count_per_tag() {
        let linear = LinearTagging::new(a_and_b(), registry()).unwrap();
        let (tagged, reports) = linear.match_reports(&records()).unwrap();
        assert_eq!(tagged, linear.tag_records(&records()).unwrap());
        assert_eq!(reports[0].0, "A");
        assert_eq!(reports[0].1.evaluations(), 2);
        assert_eq!(reports[0].1.matches(&[]), 1);
        assert_eq!(reports[1].1.matches(&[]), 1);
    }

    #[test]
    fn index_and_filters() {
        let reg = Registry::standard();
        let rule = field("field1").gt(1_i64);
        assert_eq!(get_index_for_rule(&records(), &rule, &reg).unwrap(), vec![true, false]);
        assert_eq!(filter(&records(), &rule, &reg).unwrap().len(), 1);
        let rest = filter_negated(&records(), &rule, &reg).unwrap();
        assert_eq!(rest.records()[0].get("field1"), &crate::Value::Int(0));
        let unknown = field("field1").cmp("approx", 1_i64);
        assert!(get_index_for_rule(&records(), &unknown, &reg).is_err());
    }

    #[test]
    fn regex_index_over_many_records() {
        let reg = Registry::standard();
        let payees = ["ACME GmbH", "acme", "Globex", "Initech"];
        let many: RecordSet = (0..5000)
            .map(|i| Record::new().set("payee", payees[i % payees.len()]))
            .collect();
        let mask = get_index_for_rule(&many, &field("payee").matches("(?i)^acme"), &reg).unwrap();
        assert_eq!(mask.len(), 5000);
        assert_eq!(mask.iter().filter(|&&m| m).count(), 2500);
        assert!(mask[0] && mask[1] && !mask[2] && !mask[3]);
    }

    #[test]
    fn single_tag_application_is_idempotent() {
        let reg = Registry::standard();
        let tag = Tag::new("A", field("field1").gt(1_i64)).unwrap();
        let once = super::tag(&records(), &tag, &reg, true).unwrap();
        let twice = super::tag(&once, &tag, &reg, true).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.records()[0].tags(), vec!["A"]);
    }

    #[test]
    fn single_tag_removes_stale_application() {
        let reg = Registry::standard();
        let tag = Tag::new("A", field("field1").gt(1_i64)).unwrap();
        let stale = RecordSet::new(vec![Record::new().set("field1", 0_i64).with_tags(["A"])]);
        assert!(super::tag(&stale, &tag, &reg, true).unwrap().records()[0].tags().is_empty());
        assert_eq!(super::tag(&stale, &tag, &reg, false).unwrap().records()[0].tags(), vec!["A"]);
    }

    #[test]
    fn planned_report_tracks_batches() {
        let planned =
            PlannedTagging::new(a_and_b(), registry(), PlannerOptions::default()).unwrap();
        let (_, report) = planned.tag_detailed(&records()).unwrap();
        assert_eq!(report.batches(), 8);
        assert_eq!(report.applied("B"), 1);
        assert_eq!(report.records(), 2);
    }
}
