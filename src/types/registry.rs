use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use regex::Regex;

use super::error::{EvalError, OperatorKind, RuleError};
use super::record::Record;
use super::rule::{Condition, Rule};
use super::value::Value;
use crate::operators;

/// A unary value transformation, e.g. `lower` or `month`.
pub type TransformFn = fn(&Value) -> Result<Value, EvalError>;

/// A binary predicate `comparator(field_value, literal)`.
pub type CompareFn = fn(&Value, &Value) -> Result<bool, EvalError>;

/// A domain-specific predicate over a whole record.
pub type CustomRuleFn = Arc<dyn Fn(&Record) -> Result<bool, EvalError> + Send + Sync>;

/// How a comparator key is evaluated.
#[derive(Clone, Copy)]
pub enum Comparator {
    /// A plain function of both operands.
    Binary(CompareFn),
    /// The literal is a regular expression, compiled once per prepared rule.
    Pattern,
}

/// Lookup tables resolving transform, comparator and custom rule keys.
///
/// Built once at startup through [`RegistryBuilder`], which rejects duplicate
/// keys. Immutable and thread-safe afterwards.
#[derive(Clone, Default)]
pub struct Registry {
    transforms: HashMap<String, TransformFn>,
    comparators: HashMap<String, Comparator>,
    custom_rules: HashMap<String, CustomRuleFn>,
}

/// Builder for [`Registry`].
#[derive(Default)]
pub struct RegistryBuilder {
    registry: Registry,
}

impl RegistryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every built-in transform and comparator.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::DuplicateOperator`] if a built-in key was
    /// registered earlier on this builder.
    pub fn with_standard_operators(self) -> Result<Self, RuleError> {
        let builder = STANDARD_TRANSFORMS
            .iter()
            .try_fold(self, |b, &(key, f)| b.transform(key, f))?;
        STANDARD_COMPARATORS
            .iter()
            .try_fold(builder, |b, &(key, c)| b.insert_comparator(key, c))
    }

    /// Register a transform.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::DuplicateOperator`] if `key` is taken.
    pub fn transform(mut self, key: &str, f: TransformFn) -> Result<Self, RuleError> {
        check_key(key)?;
        if self.registry.transforms.contains_key(key) {
            return Err(RuleError::DuplicateOperator {
                kind: OperatorKind::Transform,
                key: key.to_owned(),
            });
        }
        self.registry.transforms.insert(key.to_owned(), f);
        Ok(self)
    }

    /// Register a binary comparator.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::DuplicateOperator`] if `key` is taken.
    pub fn comparator(self, key: &str, f: CompareFn) -> Result<Self, RuleError> {
        self.insert_comparator(key, Comparator::Binary(f))
    }

    fn insert_comparator(mut self, key: &str, c: Comparator) -> Result<Self, RuleError> {
        check_key(key)?;
        if self.registry.comparators.contains_key(key) {
            return Err(RuleError::DuplicateOperator {
                kind: OperatorKind::Comparator,
                key: key.to_owned(),
            });
        }
        self.registry.comparators.insert(key.to_owned(), c);
        Ok(self)
    }

    /// Register a custom rule predicate.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::DuplicateOperator`] if `key` is already registered.
    pub fn custom_rule<F>(mut self, key: &str, f: F) -> Result<Self, RuleError>
    where
        F: Fn(&Record) -> Result<bool, EvalError> + Send + Sync + 'static,
    {
        check_key(key)?;
        if self.registry.custom_rules.contains_key(key) {
            return Err(RuleError::DuplicateOperator {
                kind: OperatorKind::CustomRule,
                key: key.to_owned(),
            });
        }
        self.registry
            .custom_rules
            .insert(key.to_owned(), Arc::new(f));
        Ok(self)
    }

    #[must_use]
    pub fn build(self) -> Registry {
        self.registry
    }
}

const STANDARD_TRANSFORMS: [(&str, TransformFn); 8] = [
    ("lower", operators::lower),
    ("upper", operators::upper),
    ("strip", operators::strip),
    ("abs", operators::abs),
    ("year", operators::year),
    ("month", operators::month),
    ("day", operators::day),
    ("weekday", operators::weekday),
];

const STANDARD_COMPARATORS: [(&str, Comparator); 12] = [
    ("eq", Comparator::Binary(operators::eq)),
    ("ne", Comparator::Binary(operators::ne)),
    ("gt", Comparator::Binary(operators::gt)),
    ("ge", Comparator::Binary(operators::ge)),
    ("lt", Comparator::Binary(operators::lt)),
    ("le", Comparator::Binary(operators::le)),
    ("contains", Comparator::Binary(operators::contains)),
    ("startswith", Comparator::Binary(operators::startswith)),
    ("endswith", Comparator::Binary(operators::endswith)),
    ("regex", Comparator::Pattern),
    ("in", Comparator::Binary(operators::is_in)),
    ("not_in", Comparator::Binary(operators::not_in)),
];

fn check_key(key: &str) -> Result<(), RuleError> {
    if key.is_empty() || key.contains('.') {
        return Err(RuleError::malformed(format!(
            "operator key '{key}' must be non-empty and contain no '.'"
        )));
    }
    Ok(())
}

impl Registry {
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// The built-in operators and no custom rules.
    #[must_use]
    pub fn standard() -> Self {
        let transforms = STANDARD_TRANSFORMS
            .iter()
            .map(|&(key, f)| (key.to_owned(), f))
            .collect();
        let comparators = STANDARD_COMPARATORS
            .iter()
            .map(|&(key, c)| (key.to_owned(), c))
            .collect();
        Self {
            transforms,
            comparators,
            custom_rules: HashMap::new(),
        }
    }

    #[must_use]
    pub fn transform_fn(&self, key: &str) -> Option<TransformFn> {
        self.transforms.get(key).copied()
    }

    #[must_use]
    pub fn comparator(&self, key: &str) -> Option<Comparator> {
        self.comparators.get(key).copied()
    }

    #[must_use]
    pub fn custom_rule(&self, key: &str) -> Option<&CustomRuleFn> {
        self.custom_rules.get(key)
    }

    /// Check that every key in `rule` resolves and every pattern compiles.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError`] for the first unresolved key or invalid pattern.
    pub fn validate(&self, rule: &Rule) -> Result<(), RuleError> {
        rule.check_shape()?;
        for node in rule.subrules() {
            match node {
                Rule::Condition(c) => self.validate_condition(c)?,
                Rule::Custom(key) => {
                    if !self.custom_rules.contains_key(key) {
                        return Err(RuleError::UnknownRuleKey { key: key.clone() });
                    }
                }
                Rule::Conjunction(_) | Rule::Disjunction(_) => {}
            }
        }
        Ok(())
    }

    fn validate_condition(&self, c: &Condition) -> Result<(), RuleError> {
        if let Some(t) = &c.transform {
            if !self.transforms.contains_key(t) {
                return Err(RuleError::UnknownOperator {
                    kind: OperatorKind::Transform,
                    key: t.clone(),
                });
            }
        }
        if !self.comparators.contains_key(&c.comparator) {
            return Err(RuleError::UnknownOperator {
                kind: OperatorKind::Comparator,
                key: c.comparator.clone(),
            });
        }
        match self.prepare(c) {
            Ok(_) => Ok(()),
            Err(EvalError::InvalidPattern { pattern, reason }) => {
                Err(RuleError::InvalidPattern { pattern, reason })
            }
            Err(e) => Err(RuleError::malformed(e.to_string())),
        }
    }

    /// Parse a JSON rule and validate its keys against this registry.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError`] on a shape error or an unregistered key.
    pub fn parse_rule(&self, json: &serde_json::Value) -> Result<Rule, RuleError> {
        let rule = Rule::from_json(json)?;
        self.validate(&rule)?;
        Ok(rule)
    }

    /// Apply a condition's transform. `Null` passes through untouched.
    pub(crate) fn apply_transform(
        &self,
        key: Option<&str>,
        value: &Value,
    ) -> Result<Value, EvalError> {
        let Some(key) = key else {
            return Ok(value.clone());
        };
        let f = self.resolve_transform(key)?;
        if value.is_null() {
            return Ok(Value::Null);
        }
        f(value)
    }

    pub(crate) fn resolve_transform(&self, key: &str) -> Result<TransformFn, EvalError> {
        self.transform_fn(key).ok_or_else(|| EvalError::UnknownOperator {
            kind: OperatorKind::Transform,
            key: key.to_owned(),
        })
    }

    pub(crate) fn resolve_custom_rule(&self, key: &str) -> Result<&CustomRuleFn, EvalError> {
        self.custom_rule(key)
            .ok_or_else(|| EvalError::UnknownRuleKey { key: key.to_owned() })
    }

    /// Resolve a condition's comparator into a reusable predicate.
    pub(crate) fn prepare<'c>(&self, c: &'c Condition) -> Result<Predicate<'c>, EvalError> {
        let comparator = self.comparator(&c.comparator).ok_or_else(|| {
            EvalError::UnknownOperator {
                kind: OperatorKind::Comparator,
                key: c.comparator.clone(),
            }
        })?;
        match comparator {
            Comparator::Binary(f) => Ok(Predicate::Binary {
                f,
                value: &c.value,
            }),
            Comparator::Pattern => {
                let Value::String(pattern) = &c.value else {
                    return Err(EvalError::InvalidPattern {
                        pattern: c.value.to_string(),
                        reason: "pattern must be a string".to_owned(),
                    });
                };
                let regex = Regex::new(pattern).map_err(|e| EvalError::InvalidPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })?;
                Ok(Predicate::Pattern(regex))
            }
        }
    }
}

impl fmt::Debug for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparator::Binary(_) => write!(f, "Binary"),
            Comparator::Pattern => write!(f, "Pattern"),
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut transforms: Vec<&str> = self.transforms.keys().map(String::as_str).collect();
        let mut comparators: Vec<&str> = self.comparators.keys().map(String::as_str).collect();
        let mut custom: Vec<&str> = self.custom_rules.keys().map(String::as_str).collect();
        transforms.sort_unstable();
        comparators.sort_unstable();
        custom.sort_unstable();
        f.debug_struct("Registry")
            .field("transforms", &transforms)
            .field("comparators", &comparators)
            .field("custom_rules", &custom)
            .finish()
    }
}

/// A comparator bound to its literal, ready to test many left-hand values.
pub(crate) enum Predicate<'c> {
    Binary { f: CompareFn, value: &'c Value },
    Pattern(Regex),
}

impl Predicate<'_> {
    /// A `Null` left operand never matches.
    pub(crate) fn test(&self, lhs: &Value) -> Result<bool, EvalError> {
        if lhs.is_null() {
            return Ok(false);
        }
        match self {
            Predicate::Binary { f, value } => f(lhs, value),
            Predicate::Pattern(regex) => match lhs {
                Value::String(s) => Ok(regex.is_match(s)),
                other => Err(EvalError::unary_mismatch("regex", other)),
            },
        }
    }
}
