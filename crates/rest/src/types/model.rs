//! Resource models.
//!
//! A [`ResourceModel`] describes a remote resource collection: its singular
//! name, the plural storage name used in URLs and collection documents, the
//! key field, and the declared fields with their kinds.

use serde::{Deserialize, Serialize};

use super::record::Record;
use super::value::FieldKind;
use crate::error::ModelError;

/// A declared field of a resource model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name as it appears on the wire.
    pub name: String,
    /// Declared kind.
    #[serde(rename = "type")]
    pub kind: FieldKind,
}

impl FieldDef {
    /// Creates a field definition.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Description of a remote resource collection.
///
/// Models are immutable once built and validated. They can be built in code
/// with [`ResourceModel::builder`] or deserialized from JSON:
///
/// ```json
/// {
///   "name": "book",
///   "key": "id",
///   "fields": [
///     { "name": "id", "type": "integer" },
///     { "name": "title", "type": "string" }
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawModel")]
pub struct ResourceModel {
    name: String,
    storage_name: String,
    key: String,
    fields: Vec<FieldDef>,
    #[serde(skip)]
    key_index: usize,
}

#[derive(Deserialize)]
struct RawModel {
    name: String,
    #[serde(default)]
    storage_name: Option<String>,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    fields: Vec<FieldDef>,
}

impl TryFrom<RawModel> for ResourceModel {
    type Error = ModelError;

    fn try_from(raw: RawModel) -> Result<Self, Self::Error> {
        let mut builder = ResourceModel::builder(raw.name);
        if let Some(storage_name) = raw.storage_name {
            builder = builder.storage_name(storage_name);
        }
        if let Some(key) = raw.key {
            builder = builder.key(key);
        }
        for field in raw.fields {
            builder = builder.field(field.name, field.kind);
        }
        builder.build()
    }
}

impl ResourceModel {
    /// Starts building a model with the given singular name.
    pub fn builder(name: impl Into<String>) -> ResourceModelBuilder {
        ResourceModelBuilder {
            name: name.into(),
            storage_name: None,
            key: "id".to_string(),
            fields: Vec::new(),
        }
    }

    /// Returns the singular resource name (e.g., `book`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the plural storage name (e.g., `books`).
    pub fn storage_name(&self) -> &str {
        &self.storage_name
    }

    /// Returns the key field name.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the key field definition.
    pub fn key_field(&self) -> &FieldDef {
        &self.fields[self.key_index]
    }

    /// Returns the declared fields in declaration order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns the kind of a field, if declared.
    pub fn kind_of(&self, name: &str) -> Option<FieldKind> {
        self.field(name).map(|f| f.kind)
    }

    /// Checks that every field of `record` is declared and holds a value of
    /// the declared kind, returning the record with each value converted to
    /// its field's representation (integers become floats or decimals).
    pub fn conform_record(&self, record: &Record) -> Result<Record, String> {
        record
            .iter()
            .map(|(name, value)| {
                let Some(field) = self.field(name) else {
                    return Err(format!("unknown field '{}' for {}", name, self.name));
                };
                let coerced = value.clone().coerce(field.kind).ok_or_else(|| {
                    format!("field '{}' expects {}, got {:?}", name, field.kind, value)
                })?;
                Ok((name.clone(), coerced))
            })
            .collect()
    }
}

/// Builder for [`ResourceModel`].
#[derive(Debug, Clone)]
pub struct ResourceModelBuilder {
    name: String,
    storage_name: Option<String>,
    key: String,
    fields: Vec<FieldDef>,
}

impl ResourceModelBuilder {
    /// Overrides the derived plural storage name.
    pub fn storage_name(mut self, storage_name: impl Into<String>) -> Self {
        self.storage_name = Some(storage_name.into());
        self
    }

    /// Sets the key field (default `id`).
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Declares a field.
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldDef::new(name, kind));
        self
    }

    /// Validates and builds the model.
    pub fn build(self) -> Result<ResourceModel, ModelError> {
        if !is_valid_name(&self.name) {
            return Err(ModelError::InvalidName { name: self.name });
        }

        let storage_name = self
            .storage_name
            .unwrap_or_else(|| pluralize(&self.name));
        if !is_valid_name(&storage_name) {
            return Err(ModelError::InvalidName { name: storage_name });
        }

        for (i, field) in self.fields.iter().enumerate() {
            if !is_valid_name(&field.name) {
                return Err(ModelError::InvalidField {
                    model: self.name,
                    field: field.name.clone(),
                });
            }
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(ModelError::DuplicateField {
                    model: self.name,
                    field: field.name.clone(),
                });
            }
        }

        let Some(key_index) = self.fields.iter().position(|f| f.name == self.key) else {
            return Err(ModelError::MissingKey {
                model: self.name,
                key: self.key,
            });
        };

        Ok(ResourceModel {
            name: self.name,
            storage_name,
            key: self.key,
            fields: self.fields,
            key_index,
        })
    }
}

/// Names double as XML element names and query-string keys.
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// English pluralization for resource names.
pub fn pluralize(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with('s')
        || lower.ends_with('x')
        || lower.ends_with('z')
        || lower.ends_with("ch")
        || lower.ends_with("sh")
    {
        format!("{}es", name)
    } else if let Some(stem) = name.strip_suffix('y') {
        match stem.chars().last() {
            Some(c) if !"aeiou".contains(c.to_ascii_lowercase()) => format!("{}ies", stem),
            _ => format!("{}s", name),
        }
    } else {
        format!("{}s", name)
    }
}
