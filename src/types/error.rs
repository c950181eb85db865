use std::fmt;

use thiserror::Error;

/// The registry table an operator key is looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    Transform,
    Comparator,
    CustomRule,
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorKind::Transform => write!(f, "transform"),
            OperatorKind::Comparator => write!(f, "comparator"),
            OperatorKind::CustomRule => write!(f, "custom rule"),
        }
    }
}

/// Errors raised while constructing, validating or (de)serializing rules and tags.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("malformed rule: {reason}")]
    MalformedRule { reason: String },

    #[error("unknown {kind} '{key}'")]
    UnknownOperator { kind: OperatorKind, key: String },

    #[error("unknown custom rule '{key}'")]
    UnknownRuleKey { key: String },

    #[error("duplicate {kind} '{key}'")]
    DuplicateOperator { kind: OperatorKind, key: String },

    #[error("rule expands to {count} alternatives, over the limit of {limit}")]
    TooManyAlternatives { count: usize, limit: usize },

    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("duplicate tag name '{name}'")]
    DuplicateTag { name: String },

    #[error("invalid condition key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("invalid rule json: {0}")]
    Json(#[from] serde_json::Error),
}

impl RuleError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        RuleError::MalformedRule {
            reason: reason.into(),
        }
    }
}

/// Errors raised while evaluating a rule against records.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("type mismatch in '{operator}': unsupported operand types ({operands})")]
    TypeMismatch { operator: String, operands: String },

    #[error("unknown {kind} '{key}'")]
    UnknownOperator { kind: OperatorKind, key: String },

    #[error("unknown custom rule '{key}'")]
    UnknownRuleKey { key: String },

    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

impl EvalError {
    pub(crate) fn mismatch(operator: &str, left: &crate::Value, right: &crate::Value) -> Self {
        EvalError::TypeMismatch {
            operator: operator.to_owned(),
            operands: format!("{}, {}", left.type_name(), right.type_name()),
        }
    }

    pub(crate) fn unary_mismatch(operator: &str, operand: &crate::Value) -> Self {
        EvalError::TypeMismatch {
            operator: operator.to_owned(),
            operands: operand.type_name().to_owned(),
        }
    }
}

/// Errors raised by the dependency graph and the execution planner.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("cyclic dependency detected: {}", path.join(" -> "))]
    CyclicDependency { path: Vec<String> },

    #[error("unsupported rule kind '{kind}' in tag '{tag}'")]
    UnsupportedRuleKind { tag: String, kind: String },

    #[error("plan node reads output '{alias}' before it was produced")]
    MissingInput { alias: String },
}
