//! Query types.
//!
//! A [`Query`] is an ordered list of [`Condition`]s plus optional ordering
//! and pagination bounds. Queries are built per call and only ever borrowed
//! by the translator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::value::Value;

/// Comparison operators for query conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    /// Equal (default).
    #[default]
    Eq,
    /// Not equal.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Pattern match on strings.
    Like,
    /// Membership in a list of values.
    In,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Eq => write!(f, "eq"),
            Operator::Ne => write!(f, "ne"),
            Operator::Gt => write!(f, "gt"),
            Operator::Gte => write!(f, "gte"),
            Operator::Lt => write!(f, "lt"),
            Operator::Lte => write!(f, "lte"),
            Operator::Like => write!(f, "like"),
            Operator::In => write!(f, "in"),
        }
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "eq" | "=" => Ok(Operator::Eq),
            "ne" | "!=" => Ok(Operator::Ne),
            "gt" | ">" => Ok(Operator::Gt),
            "gte" | "ge" | ">=" => Ok(Operator::Gte),
            "lt" | "<" => Ok(Operator::Lt),
            "lte" | "le" | "<=" => Ok(Operator::Lte),
            "like" => Ok(Operator::Like),
            "in" => Ok(Operator::In),
            _ => Err(format!("unknown operator: {}", s)),
        }
    }
}

impl Operator {
    /// Returns true for ordering comparisons.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte
        )
    }
}

/// The right-hand side of a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A single value.
    Single(Value),
    /// A list of values (for [`Operator::In`]).
    List(Vec<Value>),
}

/// A single field/operator/value predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// The field the predicate applies to.
    pub field: String,
    /// The comparison operator.
    pub operator: Operator,
    /// The operand.
    pub operand: Operand,
}

impl Condition {
    /// Creates a single-value condition.
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            operand: Operand::Single(value.into()),
        }
    }

    /// Creates a membership condition.
    pub fn one_of<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self {
            field: field.into(),
            operator: Operator::In,
            operand: Operand::List(values.into_iter().map(Into::into).collect()),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Ascending (default).
    #[default]
    Asc,
    /// Descending.
    Desc,
}

/// A sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
    /// The field to sort by.
    pub field: String,
    /// Sort direction.
    pub direction: Direction,
}

impl SortOrder {
    /// Parses a sort key in `field` / `-field` form.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        match s.strip_prefix('-') {
            Some(field) => SortOrder {
                field: field.to_string(),
                direction: Direction::Desc,
            },
            None => SortOrder {
                field: s.to_string(),
                direction: Direction::Asc,
            },
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Direction::Asc => write!(f, "{}", self.field),
            Direction::Desc => write!(f, "-{}", self.field),
        }
    }
}

/// A query against a resource collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    conditions: Vec<Condition>,
    order: Vec<SortOrder>,
    limit: Option<u32>,
    offset: Option<u32>,
}

impl Query {
    /// Creates a query matching every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a condition.
    pub fn filter(
        mut self,
        field: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> Self {
        self.conditions.push(Condition::new(field, operator, value));
        self
    }

    /// Adds an equality condition.
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(field, Operator::Eq, value)
    }

    /// Adds a membership condition.
    pub fn one_of<V: Into<Value>>(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.conditions.push(Condition::one_of(field, values));
        self
    }

    /// Adds a prepared condition.
    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Appends a sort key.
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order.push(SortOrder {
            field: field.into(),
            direction,
        });
        self
    }

    /// Sets the maximum number of records to return.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the number of records to skip.
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns the conditions in insertion order.
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Returns the sort keys.
    pub fn order(&self) -> &[SortOrder] {
        &self.order
    }

    /// Returns the limit.
    pub fn limit_value(&self) -> Option<u32> {
        self.limit
    }

    /// Returns the offset.
    pub fn offset_value(&self) -> Option<u32> {
        self.offset
    }

    /// Returns the key value if this query is a plain lookup by `key`.
    ///
    /// A keyed lookup has exactly one condition, `key eq value` with a
    /// non-null value, and no ordering or bounds.
    pub fn key_lookup(&self, key: &str) -> Option<&Value> {
        if !self.order.is_empty() || self.limit.is_some() || self.offset.is_some() {
            return None;
        }
        match self.conditions.as_slice() {
            [
                Condition {
                    field,
                    operator: Operator::Eq,
                    operand: Operand::Single(value),
                },
            ] if field == key && !value.is_null() => Some(value),
            _ => None,
        }
    }
}
