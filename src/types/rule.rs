use std::fmt;

use super::error::{EvalError, RuleError};
use super::observation::Evaluation;
use super::record::{Record, TAGS_FIELD};
use super::registry::Registry;
use super::value::Value;

/// Reserved JSON key for [`Rule::Custom`] references.
pub const CUSTOM_KEY: &str = "custom";

/// Most alternatives a rule may expand to in disjunctive normal form.
pub const MAX_ALTERNATIVES: usize = 1024;

/// A leaf predicate: `comparator(transform(record[field]), value)`.
///
/// `transform` and `comparator` are keys into a [`Registry`]; an absent
/// transform is the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Condition {
    pub(crate) field: String,
    pub(crate) transform: Option<String>,
    pub(crate) comparator: String,
    pub(crate) value: Value,
}

impl Condition {
    /// Build a condition, checking the field and operator names.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::MalformedRule`] for empty names or a field name
    /// containing `.` (the JSON key separator).
    pub fn new(
        field: &str,
        transform: Option<&str>,
        comparator: &str,
        value: impl Into<Value>,
    ) -> Result<Self, RuleError> {
        let condition = Condition {
            field: field.to_owned(),
            transform: transform.map(str::to_owned),
            comparator: comparator.to_owned(),
            value: value.into(),
        };
        condition.check()?;
        Ok(condition)
    }

    fn check(&self) -> Result<(), RuleError> {
        if self.field.is_empty() {
            return Err(RuleError::malformed("condition field name is empty"));
        }
        if self.field.contains('.') {
            return Err(RuleError::malformed(format!(
                "field name '{}' must not contain '.'",
                self.field
            )));
        }
        if self.field == CUSTOM_KEY {
            return Err(RuleError::malformed("'custom' is reserved for custom rules"));
        }
        if matches!(&self.transform, Some(t) if t.is_empty() || t.contains('.')) {
            return Err(RuleError::malformed(format!(
                "invalid transform name on field '{}'",
                self.field
            )));
        }
        if self.comparator.is_empty() {
            return Err(RuleError::malformed(format!(
                "condition on '{}' has no comparator",
                self.field
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    #[must_use]
    pub fn transform(&self) -> Option<&str> {
        self.transform.as_deref()
    }

    #[must_use]
    pub fn comparator(&self) -> &str {
        &self.comparator
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Whether this condition tests the record's own tag list.
    #[must_use]
    pub fn is_tag_reference(&self) -> bool {
        self.field == TAGS_FIELD
    }

    /// Tag names named by a tag-reference condition. Empty for other conditions.
    #[must_use]
    pub fn referenced_tags(&self) -> Vec<&str> {
        if !self.is_tag_reference() {
            return Vec::new();
        }
        match &self.value {
            Value::String(name) => vec![name.as_str()],
            Value::List(items) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// The JSON key this condition is grouped under: `field` or `field.transform`.
    #[must_use]
    pub fn key(&self) -> String {
        match &self.transform {
            Some(t) => format!("{}.{t}", self.field),
            None => self.field.clone(),
        }
    }
}

/// Boolean rule AST evaluated against one record.
///
/// Composites must have at least one child; [`Rule::check_shape`] enforces it
/// and is run by every tag constructor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Rule {
    Condition(Condition),
    Conjunction(Vec<Rule>),
    Disjunction(Vec<Rule>),
    Custom(String),
}

impl Rule {
    /// AND of `children`.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::MalformedRule`] if `children` is empty.
    pub fn all(children: Vec<Rule>) -> Result<Rule, RuleError> {
        if children.is_empty() {
            return Err(RuleError::malformed("conjunction has no children"));
        }
        Ok(Rule::Conjunction(children))
    }

    /// OR of `children`.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::MalformedRule`] if `children` is empty.
    pub fn any(children: Vec<Rule>) -> Result<Rule, RuleError> {
        if children.is_empty() {
            return Err(RuleError::malformed("disjunction has no children"));
        }
        Ok(Rule::Disjunction(children))
    }

    #[must_use]
    pub fn and(self, other: Rule) -> Rule {
        match self {
            Rule::Conjunction(mut children) => {
                children.push(other);
                Rule::Conjunction(children)
            }
            leaf => Rule::Conjunction(vec![leaf, other]),
        }
    }

    #[must_use]
    pub fn or(self, other: Rule) -> Rule {
        match self {
            Rule::Disjunction(mut children) => {
                children.push(other);
                Rule::Disjunction(children)
            }
            leaf => Rule::Disjunction(vec![leaf, other]),
        }
    }

    /// Check structural invariants: non-empty composites and well-formed conditions.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::MalformedRule`] describing the first violation.
    pub fn check_shape(&self) -> Result<(), RuleError> {
        match self {
            Rule::Condition(c) => c.check(),
            Rule::Conjunction(children) | Rule::Disjunction(children) => {
                if children.is_empty() {
                    return Err(RuleError::malformed(format!(
                        "{} has no children",
                        self.kind_name()
                    )));
                }
                children.iter().try_for_each(Rule::check_shape)
            }
            Rule::Custom(key) if key.is_empty() => {
                Err(RuleError::malformed("custom rule key is empty"))
            }
            Rule::Custom(_) => Ok(()),
        }
    }

    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Rule::Condition(c) if c.is_tag_reference() => "tag reference",
            Rule::Condition(_) => "condition",
            Rule::Conjunction(_) => "conjunction",
            Rule::Disjunction(_) => "disjunction",
            Rule::Custom(_) => "custom rule",
        }
    }

    #[must_use]
    pub fn children(&self) -> &[Rule] {
        match self {
            Rule::Conjunction(children) | Rule::Disjunction(children) => children,
            Rule::Condition(_) | Rule::Custom(_) => &[],
        }
    }

    /// Every node of the tree in pre-order, starting with `self`.
    #[must_use]
    pub fn subrules(&self) -> Vec<&Rule> {
        let mut out = Vec::new();
        collect_subrules(self, &mut out);
        out
    }

    /// Names of the tags this rule reads through tag-reference conditions,
    /// deduplicated in first-occurrence order.
    #[must_use]
    pub fn tag_references(&self) -> Vec<String> {
        let mut refs: Vec<String> = Vec::new();
        for rule in self.subrules() {
            if let Rule::Condition(c) = rule {
                for name in c.referenced_tags() {
                    if !refs.iter().any(|r| r == name) {
                        refs.push(name.to_owned());
                    }
                }
            }
        }
        refs
    }

    /// Follow a child-index path from this node.
    #[must_use]
    pub fn at_path(&self, path: &[usize]) -> Option<&Rule> {
        match path.split_first() {
            None => Some(self),
            Some((&first, rest)) => self.children().get(first)?.at_path(rest),
        }
    }

    /// Number of alternatives [`to_dnf`](Self::to_dnf) would produce,
    /// computed without expanding the tree. Saturates at `usize::MAX`.
    #[must_use]
    pub fn alternative_count(&self) -> usize {
        match self {
            Rule::Condition(_) | Rule::Custom(_) => 1,
            Rule::Disjunction(children) => children
                .iter()
                .fold(0, |n, child| n.saturating_add(child.alternative_count())),
            Rule::Conjunction(children) => children
                .iter()
                .fold(1, |n, child| n.saturating_mul(child.alternative_count())),
        }
    }

    /// Check the shape and expand to disjunctive normal form, refusing trees
    /// that expand past [`MAX_ALTERNATIVES`].
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::MalformedRule`] for a malformed tree and
    /// [`RuleError::TooManyAlternatives`] when the expansion is too large.
    pub fn normal_form(&self) -> Result<Vec<Vec<Rule>>, RuleError> {
        self.check_shape()?;
        let count = self.alternative_count();
        if count > MAX_ALTERNATIVES {
            return Err(RuleError::TooManyAlternatives {
                count,
                limit: MAX_ALTERNATIVES,
            });
        }
        Ok(self.to_dnf())
    }

    /// Disjunctive normal form: a list of alternatives, each a list of leaves.
    ///
    /// Assumes [`check_shape`](Self::check_shape) holds; an empty composite
    /// yields no alternatives.
    #[must_use]
    pub fn to_dnf(&self) -> Vec<Vec<Rule>> {
        match self {
            Rule::Condition(_) | Rule::Custom(_) => vec![vec![self.clone()]],
            Rule::Disjunction(children) => children.iter().flat_map(Rule::to_dnf).collect(),
            Rule::Conjunction(children) => {
                children.iter().fold(vec![Vec::new()], |acc, child| {
                    let alternatives = child.to_dnf();
                    acc.iter()
                        .flat_map(|prefix| {
                            alternatives.iter().map(move |alt| {
                                let mut joined = prefix.clone();
                                joined.extend(alt.iter().cloned());
                                joined
                            })
                        })
                        .collect()
                })
            }
        }
    }

    /// Serialize to the canonical JSON shape: a list of merged condition maps.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::MalformedRule`] if the tree is malformed or holds
    /// a value JSON cannot represent.
    pub fn to_json(&self) -> Result<serde_json::Value, RuleError> {
        crate::serial::rule_to_json(self)
    }

    /// Parse the canonical JSON shape. Operator keys are not resolved here;
    /// use [`Registry::parse_rule`] to also validate them.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError`] on a shape or key error.
    pub fn from_json(json: &serde_json::Value) -> Result<Rule, RuleError> {
        crate::serial::rule_from_json(json)
    }

    /// Evaluate against one record.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError`] if an operator rejects its operands or a key
    /// does not resolve.
    pub fn evaluate(&self, record: &Record, registry: &Registry) -> Result<bool, EvalError> {
        crate::evaluate::evaluate(self, record, registry)
    }

    /// Evaluate against one record, reporting the outcome of every node.
    ///
    /// # Errors
    ///
    /// Same as [`evaluate`](Self::evaluate).
    pub fn evaluate_observed(
        &self,
        record: &Record,
        registry: &Registry,
    ) -> Result<Evaluation, EvalError> {
        crate::evaluate::evaluate_observed(self, record, registry)
    }
}

fn collect_subrules<'a>(rule: &'a Rule, out: &mut Vec<&'a Rule>) {
    out.push(rule);
    for child in rule.children() {
        collect_subrules(child, out);
    }
}

impl From<Condition> for Rule {
    fn from(c: Condition) -> Self {
        Rule::Condition(c)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.key(), self.comparator, self.value)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Condition(c) => write!(f, "({c})"),
            Rule::Conjunction(children) => write_joined(f, children, " AND "),
            Rule::Disjunction(children) => write_joined(f, children, " OR "),
            Rule::Custom(key) => write!(f, "custom({key})"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, children: &[Rule], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, "{sep}")?;
        }
        write!(f, "{child}")?;
    }
    write!(f, ")")
}

/// Intermediate builder for conditions. Created by [`field()`].
#[derive(Debug, Clone)]
pub struct FieldExpr {
    field: String,
    transform: Option<String>,
}

impl FieldExpr {
    /// Apply a registered transform to the field before comparing.
    #[must_use]
    pub fn transform(mut self, key: &str) -> Self {
        self.transform = Some(key.to_owned());
        self
    }

    /// Compare with an arbitrary registered comparator.
    #[must_use]
    pub fn cmp(self, comparator: &str, value: impl Into<Value>) -> Rule {
        Rule::Condition(Condition {
            field: self.field,
            transform: self.transform,
            comparator: comparator.to_owned(),
            value: value.into(),
        })
    }

    #[must_use]
    pub fn eq(self, value: impl Into<Value>) -> Rule {
        self.cmp("eq", value)
    }

    #[must_use]
    pub fn ne(self, value: impl Into<Value>) -> Rule {
        self.cmp("ne", value)
    }

    #[must_use]
    pub fn gt(self, value: impl Into<Value>) -> Rule {
        self.cmp("gt", value)
    }

    #[must_use]
    pub fn ge(self, value: impl Into<Value>) -> Rule {
        self.cmp("ge", value)
    }

    #[must_use]
    pub fn lt(self, value: impl Into<Value>) -> Rule {
        self.cmp("lt", value)
    }

    #[must_use]
    pub fn le(self, value: impl Into<Value>) -> Rule {
        self.cmp("le", value)
    }

    #[must_use]
    pub fn contains(self, value: impl Into<Value>) -> Rule {
        self.cmp("contains", value)
    }

    #[must_use]
    pub fn matches(self, pattern: &str) -> Rule {
        self.cmp("regex", pattern)
    }

    #[must_use]
    pub fn is_in(self, values: impl Into<Value>) -> Rule {
        self.cmp("in", values)
    }
}

#[must_use]
pub fn field(name: &str) -> FieldExpr {
    FieldExpr {
        field: name.to_owned(),
        transform: None,
    }
}

/// "Record currently carries tag `name`."
#[must_use]
pub fn tagged(name: &str) -> Rule {
    field(TAGS_FIELD).contains(name)
}

/// "Record carries at least one of `names`."
#[must_use]
pub fn tagged_any(names: &[&str]) -> Rule {
    field(TAGS_FIELD).contains(names.to_vec())
}

#[must_use]
pub fn custom(key: &str) -> Rule {
    Rule::Custom(key.to_owned())
}
