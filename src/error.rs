use thiserror::Error;

use crate::{EvalError, PlanError, RuleError};

/// Unified error type for the tagging entry points.
///
/// Returned by [`Tagging::tag_records`](crate::Tagging::tag_records) and the
/// record-level functions such as [`tag()`](crate::tag), which can fail at
/// any stage.
#[derive(Debug, Error)]
pub enum TaggingError {
    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Plan(#[from] PlanError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_stage_errors_transparently() {
        let err: TaggingError = PlanError::CyclicDependency {
            path: vec!["a".into(), "a".into()],
        }
        .into();
        assert_eq!(err.to_string(), "cyclic dependency detected: a -> a");
        assert!(matches!(err, TaggingError::Plan(_)));

        let err: TaggingError = RuleError::DuplicateTag { name: "rent".into() }.into();
        assert_eq!(err.to_string(), "duplicate tag name 'rent'");
    }
}
