use std::collections::HashMap;
use std::fmt;

use super::error::RuleError;
use super::registry::Registry;
use super::rule::Rule;
use super::value::Value;

/// A named classification rule.
///
/// The rule is always stored in canonical form: a `Disjunction` whose children
/// are `Conjunction`s of leaves. Any tree passed to [`Tag::new`] is normalised
/// to that shape (disjunctive normal form), which the dependency extractor and
/// the planner rely on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    name: String,
    rule: Rule,
}

impl Tag {
    /// Create a tag, normalising `rule` into canonical form.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::MalformedRule`] for an empty name or a malformed
    /// rule, and [`RuleError::TooManyAlternatives`] for a rule whose normal
    /// form exceeds [`MAX_ALTERNATIVES`](crate::MAX_ALTERNATIVES).
    pub fn new(name: &str, rule: Rule) -> Result<Self, RuleError> {
        if name.is_empty() {
            return Err(RuleError::malformed("tag name is empty"));
        }
        Ok(Self {
            name: name.to_owned(),
            rule: canonicalize(&rule)?,
        })
    }

    /// Parse a tag from its stored JSON rule, validating every key.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError`] on a shape error or an unregistered key.
    pub fn from_json(
        name: &str,
        json: &serde_json::Value,
        registry: &Registry,
    ) -> Result<Self, RuleError> {
        Self::new(name, registry.parse_rule(json)?)
    }

    /// # Errors
    ///
    /// Returns [`RuleError`] if a literal cannot be represented in JSON.
    pub fn to_json(&self) -> Result<serde_json::Value, RuleError> {
        self.rule.to_json()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The canonical root `Disjunction`.
    #[must_use]
    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    /// The root's `Conjunction` children.
    #[must_use]
    pub fn alternatives(&self) -> &[Rule] {
        self.rule.children()
    }

    /// Tags this tag reads through tag-reference conditions.
    #[must_use]
    pub fn depends_on(&self) -> Vec<String> {
        self.rule.tag_references()
    }

    /// New tag with `rule` added as another alternative.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::MalformedRule`] if `rule` is malformed.
    pub fn with_alternative(&self, rule: Rule) -> Result<Tag, RuleError> {
        let mut alternatives = self.alternatives().to_vec();
        alternatives.push(rule);
        Tag::new(&self.name, Rule::Disjunction(alternatives))
    }

    /// New tag with `rule` ANDed into the alternative at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::MalformedRule`] if `index` is out of range or
    /// `rule` is malformed.
    pub fn with_condition(&self, index: usize, rule: Rule) -> Result<Tag, RuleError> {
        let mut alternatives = self.alternatives().to_vec();
        let slot = alternatives
            .get_mut(index)
            .ok_or_else(|| self.out_of_range(index))?;
        *slot = slot.clone().and(rule);
        Tag::new(&self.name, Rule::Disjunction(alternatives))
    }

    /// New tag with the alternative at `index` replaced by `rule`.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::MalformedRule`] if `index` is out of range or
    /// `rule` is malformed.
    pub fn replace_alternative(&self, index: usize, rule: Rule) -> Result<Tag, RuleError> {
        let mut alternatives = self.alternatives().to_vec();
        let slot = alternatives
            .get_mut(index)
            .ok_or_else(|| self.out_of_range(index))?;
        *slot = rule;
        Tag::new(&self.name, Rule::Disjunction(alternatives))
    }

    /// New tag that additionally matches the records whose `id_field` is one
    /// of `ids`. This is how individually picked transactions are tagged.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::MalformedRule`] if `ids` is empty or `id_field`
    /// is not a valid field name.
    pub fn with_record_ids(&self, id_field: &str, ids: Vec<Value>) -> Result<Tag, RuleError> {
        if ids.is_empty() {
            return Err(RuleError::malformed("no record ids given"));
        }
        self.with_alternative(crate::field(id_field).is_in(Value::List(ids)))
    }

    fn out_of_range(&self, index: usize) -> RuleError {
        RuleError::malformed(format!(
            "tag '{}' has no alternative {index} (it has {})",
            self.name,
            self.alternatives().len()
        ))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} := {}", self.name, self.rule)
    }
}

fn canonicalize(rule: &Rule) -> Result<Rule, RuleError> {
    let alternatives = rule.normal_form()?;
    Ok(Rule::Disjunction(
        alternatives.into_iter().map(Rule::Conjunction).collect(),
    ))
}

/// Immutable, declaration-ordered snapshot of the tags for one tagging run.
#[derive(Debug, Clone, Default)]
pub struct TagSet {
    tags: Vec<Tag>,
    index: HashMap<String, usize>,
}

impl TagSet {
    /// # Errors
    ///
    /// Returns [`RuleError::DuplicateTag`] if two tags share a name.
    pub fn new(tags: Vec<Tag>) -> Result<Self, RuleError> {
        let mut index = HashMap::with_capacity(tags.len());
        for (i, tag) in tags.iter().enumerate() {
            if index.insert(tag.name.clone(), i).is_some() {
                return Err(RuleError::DuplicateTag {
                    name: tag.name.clone(),
                });
            }
        }
        Ok(Self { tags, index })
    }

    /// Build a snapshot from stored `(name, rule json)` pairs, as handed over
    /// by the tag store.
    ///
    /// # Errors
    ///
    /// Returns the first [`RuleError`] encountered; no partial set is built.
    pub fn from_json_entries<'a, I>(entries: I, registry: &Registry) -> Result<Self, RuleError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let tags = entries
            .into_iter()
            .map(|(name, json)| {
                let json: serde_json::Value = serde_json::from_str(json)?;
                Tag::from_json(name, &json, registry)
            })
            .collect::<Result<Vec<_>, RuleError>>()?;
        Self::new(tags)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Tag> {
        self.index.get(name).map(|&i| &self.tags[i])
    }

    /// Declaration position of `name`.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.tags.iter()
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.tags.iter().map(|t| t.name.as_str()).collect()
    }

    /// Check every tag's keys against `registry`.
    ///
    /// # Errors
    ///
    /// Returns the first [`RuleError`] found.
    pub fn validate(&self, registry: &Registry) -> Result<(), RuleError> {
        self.tags
            .iter()
            .try_for_each(|tag| registry.validate(&tag.rule))
    }
}

impl<'a> IntoIterator for &'a TagSet {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}

/// Builder for a [`TagSet`], keeping declaration order.
///
/// # Example
///
/// ```
/// use tagplan::{TagSetBuilder, field, tagged};
///
/// let tags = TagSetBuilder::new()
///     .tag("groceries", field("payee").transform("lower").contains("market"))
///     .tag("weekly_shop", tagged("groceries").and(field("amount").lt(-50_i64)))
///     .build()
///     .unwrap();
/// assert_eq!(tags.len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct TagSetBuilder {
    tags: Vec<(String, Rule)>,
}

impl TagSetBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn tag(mut self, name: &str, rule: Rule) -> Self {
        self.tags.push((name.to_owned(), rule));
        self
    }

    /// # Errors
    ///
    /// Returns [`RuleError`] for a malformed rule or a duplicate name.
    pub fn build(self) -> Result<TagSet, RuleError> {
        let tags = self
            .tags
            .into_iter()
            .map(|(name, rule)| Tag::new(&name, rule))
            .collect::<Result<Vec<_>, RuleError>>()?;
        TagSet::new(tags)
    }
}
