use std::collections::BTreeMap;

use super::Value;

/// Reserved field holding a record's tag list.
pub const TAGS_FIELD: &str = "tags";

static NULL: Value = Value::Null;

/// One transaction row: a mapping from field name to [`Value`].
///
/// Missing fields read as [`Value::Null`]. The tag list lives in the
/// [`TAGS_FIELD`] column as a list of strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    /// Create an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field value.
    #[must_use]
    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.insert(field, value.into());
        self
    }

    /// Set a field value (mutable reference version).
    pub fn insert(&mut self, field: &str, value: Value) {
        self.fields.insert(field.to_owned(), value);
    }

    /// Look up a field. Absent fields yield [`Value::Null`].
    #[must_use]
    pub fn get(&self, field: &str) -> &Value {
        self.fields.get(field).unwrap_or(&NULL)
    }

    /// Whether the record carries the given field at all.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Tag names currently attached to this record, in insertion order.
    #[must_use]
    pub fn tags(&self) -> Vec<&str> {
        self.get(TAGS_FIELD)
            .as_list()
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Whether the record already carries `tag`.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags().contains(&tag)
    }

    /// Replace the tag list.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_tags(tags.into_iter().map(Into::into).collect());
        self
    }

    pub(crate) fn set_tags(&mut self, tags: Vec<String>) {
        let list = tags.into_iter().map(Value::String).collect();
        self.fields.insert(TAGS_FIELD.to_owned(), Value::List(list));
    }

    /// Iterate over `(field, value)` pairs in field-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// An ordered collection of records. Operations never mutate their input;
/// tagging returns a new `RecordSet`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSet {
    records: Vec<Record>,
}

impl RecordSet {
    #[must_use]
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Borrow one field across every record, in row order.
    #[must_use]
    pub fn column(&self, field: &str) -> Vec<&Value> {
        self.records.iter().map(|r| r.get(field)).collect()
    }

    /// Tag lists of every record as owned strings, in row order.
    #[must_use]
    pub fn tag_lists(&self) -> Vec<Vec<String>> {
        self.records
            .iter()
            .map(|r| r.tags().into_iter().map(str::to_owned).collect())
            .collect()
    }

    /// Keep the records whose mask entry is `true`.
    ///
    /// The mask must have one entry per record; extra entries are ignored.
    #[must_use]
    pub fn select(&self, mask: &[bool]) -> RecordSet {
        let records = self
            .records
            .iter()
            .zip(mask)
            .filter(|(_, keep)| **keep)
            .map(|(r, _)| r.clone())
            .collect();
        RecordSet { records }
    }

    /// Copy of this set with each record's tag list replaced, row by row.
    pub(crate) fn with_tag_lists(&self, tag_lists: Vec<Vec<String>>) -> RecordSet {
        let records = self
            .records
            .iter()
            .zip(tag_lists)
            .map(|(r, tags)| {
                let mut r = r.clone();
                r.set_tags(tags);
                r
            })
            .collect();
        RecordSet { records }
    }
}

impl From<Vec<Record>> for RecordSet {
    fn from(records: Vec<Record>) -> Self {
        Self::new(records)
    }
}

impl FromIterator<Record> for RecordSet {
    fn from_iter<T: IntoIterator<Item = Record>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let r = Record::new().set("payee", "ACME");
        assert_eq!(r.get("payee"), &Value::from("ACME"));
    }

    #[test]
    fn missing_field_is_null() {
        let r = Record::new();
        assert_eq!(r.get("amount"), &Value::Null);
        assert!(!r.contains("amount"));
    }

    #[test]
    fn overwrite_value() {
        let r = Record::new().set("amount", 10_i64).set("amount", 20_i64);
        assert_eq!(r.get("amount"), &Value::Int(20));
    }

    #[test]
    fn tags_roundtrip() {
        let r = Record::new().with_tags(["food", "weekly"]);
        assert_eq!(r.tags(), vec!["food", "weekly"]);
        assert!(r.has_tag("food"));
        assert!(!r.has_tag("rent"));
    }

    #[test]
    fn untagged_record_has_no_tags() {
        assert!(Record::new().tags().is_empty());
        assert!(Record::new().set(TAGS_FIELD, 3_i64).tags().is_empty());
    }

    #[test]
    fn column_reads_nulls_for_missing() {
        let set = RecordSet::new(vec![
            Record::new().set("amount", 1_i64),
            Record::new(),
        ]);
        assert_eq!(set.column("amount"), vec![&Value::Int(1), &Value::Null]);
    }

    #[test]
    fn select_by_mask() {
        let set: RecordSet = (0..4_i64).map(|i| Record::new().set("i", i)).collect();
        let picked = set.select(&[true, false, false, true]);
        assert_eq!(picked.len(), 2);
        assert_eq!(picked.records()[1].get("i"), &Value::Int(3));
    }
}
