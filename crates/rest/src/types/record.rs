//! Decoded records.

use std::collections::BTreeMap;

use super::value::Value;

/// A mapping from field name to typed value.
///
/// Records are plain data: once decoded they are owned by the caller and hold
/// no reference to the endpoint or model they came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Sets a field, returning the previous value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    /// Returns a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Removes a field.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Returns true if the field is present (including explicit nulls).
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Iterates over fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Copies every field of `other` into this record, overwriting.
    pub fn merge(&mut self, other: Record) {
        self.fields.extend(other.fields);
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_overwrites() {
        let mut record = Record::new().with("id", Value::Null).with("title", "Dune");
        record.merge(Record::new().with("id", 7));
        assert_eq!(record.get("id"), Some(&Value::Integer(7)));
        assert_eq!(record.get("title"), Some(&Value::from("Dune")));
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn test_equality_ignores_insertion_order() {
        let a = Record::new().with("a", 1).with("b", 2);
        let b = Record::new().with("b", 2).with("a", 1);
        assert_eq!(a, b);
    }
}
