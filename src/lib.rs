//! Rule-based tagging of transaction records.
//!
//! A [`TagSet`] names tags and the [`Rule`] each one applies. Rules compare
//! record fields through registered transforms and comparators, call
//! registered custom predicates, or reference other tags. [`PlannedTagging`]
//! compiles a tag set into an [`ExecutionPlan`] of prioritized batches and
//! evaluates each node once per record set; [`LinearTagging`] evaluates every
//! rule tree row by row and produces the same result.

mod error;
mod evaluate;
mod execute;
mod graph;
mod operators;
mod parse;
mod plan;
mod serial;
mod session;
mod types;

pub use error::TaggingError;
pub use graph::{DependencyGraph, DependencyInfo, RemovedEdge};
pub use plan::{Alias, Batch, ExecutionPlan, NodeKind, NodeOp, PlanNode, Priority};
pub use session::{
    LinearTagging, PlannedTagging, Tagging, filter, filter_negated, get_index_for_rule, tag,
};
pub use types::{
    CUSTOM_KEY, Comparator, CompareFn, Condition, CustomRuleFn, EvalError, Evaluation, FieldExpr,
    MAX_ALTERNATIVES, MatchReport, NodeMatch, Observation, OperatorKind, PlanError, PlanReport,
    PlannerOptions, Record, RecordSet, Registry, RegistryBuilder, Rule, RuleError, TAGS_FIELD, Tag,
    TagSet, TagSetBuilder, TaggingOptions, TransformFn, Value, custom, field, tagged, tagged_any,
};
