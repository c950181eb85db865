mod grammar;

pub(crate) use grammar::ConditionKey;

use crate::RuleError;

/// Parse a JSON condition key of the form `field` or `field.transform`.
///
/// # Errors
///
/// Returns [`RuleError::InvalidKey`] if either segment is empty or the key
/// has more than one `.`.
pub(crate) fn parse_key(key: &str) -> Result<ConditionKey<'_>, RuleError> {
    use winnow::Parser;
    grammar::condition_key
        .parse(key)
        .map_err(|e| RuleError::InvalidKey {
            key: key.to_owned(),
            reason: e.to_string(),
        })
}
