mod error;
mod observation;
mod options;
mod record;
mod registry;
mod report;
mod rule;
mod tag;
mod value;

pub use error::{EvalError, OperatorKind, PlanError, RuleError};
pub use observation::{Evaluation, MatchReport, Observation};
pub use options::{PlannerOptions, TaggingOptions};
pub use record::{Record, RecordSet, TAGS_FIELD};
pub use registry::{Comparator, CompareFn, CustomRuleFn, Registry, RegistryBuilder, TransformFn};
pub(crate) use registry::Predicate;
pub use report::{NodeMatch, PlanReport};
pub use rule::{
    CUSTOM_KEY, Condition, FieldExpr, MAX_ALTERNATIVES, Rule, custom, field, tagged, tagged_any,
};
pub use tag::{Tag, TagSet, TagSetBuilder};
pub use value::Value;
