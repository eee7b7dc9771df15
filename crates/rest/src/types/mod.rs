//! Data model types.
//!
//! - [`ResourceModel`] / [`FieldDef`] - description of a remote collection
//! - [`Value`] / [`FieldKind`] - typed field values
//! - [`Record`] - a decoded record
//! - [`Query`] / [`Condition`] / [`Operator`] - query predicates and bounds

mod model;
mod query;
mod record;
mod value;

pub use model::{FieldDef, ResourceModel, ResourceModelBuilder, pluralize};
pub use query::{Condition, Direction, Operand, Operator, Query, SortOrder};
pub use record::Record;
pub use value::{FieldKind, Value};

/// The decoded body of a successful response.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// No body (e.g., `204 No Content`).
    Empty,
    /// A single-object body.
    One(Record),
    /// A collection body.
    Many(Vec<Record>),
}

impl Payload {
    /// Flattens the payload into a list of records.
    pub fn into_records(self) -> Vec<Record> {
        match self {
            Payload::Empty => Vec::new(),
            Payload::One(record) => vec![record],
            Payload::Many(records) => records,
        }
    }

    /// Returns the single record, if the body held exactly one object.
    pub fn into_one(self) -> Option<Record> {
        match self {
            Payload::One(record) => Some(record),
            _ => None,
        }
    }

    /// Returns true for [`Payload::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, Payload::Empty)
    }
}
