//! JSON codec.

use serde_json::{Map, Number, Value as Json};
use tracing::debug;

use crate::error::FormatError;
use crate::types::{FieldKind, Payload, Record, ResourceModel, Value};

pub(super) fn encode_record(
    model: &ResourceModel,
    record: &Record,
) -> Result<Vec<u8>, FormatError> {
    Ok(serde_json::to_vec(&record_to_json(model, record)?)?)
}

pub(super) fn encode_collection(
    model: &ResourceModel,
    records: &[Record],
) -> Result<Vec<u8>, FormatError> {
    let items = records
        .iter()
        .map(|r| record_to_json(model, r))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(serde_json::to_vec(&Json::Array(items))?)
}

pub(super) fn decode(model: &ResourceModel, body: &[u8]) -> Result<Payload, FormatError> {
    let document: Json = serde_json::from_slice(body)?;

    match document {
        Json::Array(items) => items
            .into_iter()
            .map(|item| object_to_record(model, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Payload::Many),
        Json::Object(mut map) => {
            // Root-wrapped documents: {"book": {...}} or {"books": [...]}
            if map.len() == 1 {
                if let Some(Json::Object(_)) = map.get(model.name()) {
                    if let Some(inner) = map.remove(model.name()) {
                        return object_to_record(model, inner).map(Payload::One);
                    }
                }
                if let Some(Json::Array(_)) = map.get(model.storage_name()) {
                    if let Some(Json::Array(items)) = map.remove(model.storage_name()) {
                        return items
                            .into_iter()
                            .map(|item| object_to_record(model, item))
                            .collect::<Result<Vec<_>, _>>()
                            .map(Payload::Many);
                    }
                }
            }
            object_to_record(model, Json::Object(map)).map(Payload::One)
        }
        other => Err(FormatError::UnexpectedShape(format!(
            "expected an object or array, found {}",
            json_type_name(&other)
        ))),
    }
}

pub(super) fn decode_errors(body: &[u8]) -> Vec<String> {
    let Ok(document) = serde_json::from_slice::<Json>(body) else {
        return Vec::new();
    };

    let errors = match &document {
        Json::Object(map) => map.get("errors").or_else(|| map.get("error")),
        Json::Array(_) => Some(&document),
        _ => None,
    };

    match errors {
        Some(Json::Array(items)) => items.iter().map(error_text).collect(),
        Some(Json::String(s)) => vec![s.clone()],
        // {"errors": {"title": ["can't be blank"]}}
        Some(Json::Object(fields)) => fields
            .iter()
            .flat_map(|(field, messages)| match messages {
                Json::Array(items) => items
                    .iter()
                    .map(|m| format!("{} {}", field, error_text(m)))
                    .collect::<Vec<_>>(),
                other => vec![format!("{} {}", field, error_text(other))],
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn error_text(value: &Json) -> String {
    match value {
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn record_to_json(model: &ResourceModel, record: &Record) -> Result<Json, FormatError> {
    let mut map = Map::new();
    for (name, value) in record.iter() {
        if model.field(name).is_some() {
            map.insert(name.clone(), value_to_json(name, value)?);
        }
    }
    Ok(Json::Object(map))
}

fn value_to_json(field: &str, value: &Value) -> Result<Json, FormatError> {
    Ok(match value {
        Value::Null => Json::Null,
        Value::Boolean(b) => Json::Bool(*b),
        Value::Integer(i) => Json::Number(Number::from(*i)),
        Value::Float(f) => Json::Number(Number::from_f64(*f).ok_or_else(|| {
            FormatError::NonFiniteFloat {
                field: field.to_string(),
            }
        })?),
        // Decimals and temporal values keep their exact textual form.
        Value::Decimal(_) | Value::Date(_) | Value::DateTime(_) => Json::String(value.to_text()),
        Value::String(s) => Json::String(s.clone()),
    })
}

fn object_to_record(model: &ResourceModel, item: Json) -> Result<Record, FormatError> {
    let Json::Object(map) = item else {
        return Err(FormatError::UnexpectedShape(format!(
            "expected a {} object, found {}",
            model.name(),
            json_type_name(&item)
        )));
    };

    let mut record = Record::new();
    for (name, json) in map {
        let Some(kind) = model.kind_of(&name) else {
            debug!(resource = model.name(), field = %name, "Ignoring undeclared field");
            continue;
        };
        let value = json_to_value(&name, kind, json)?;
        record.set(name, value);
    }
    Ok(record)
}

fn json_to_value(field: &str, kind: FieldKind, json: Json) -> Result<Value, FormatError> {
    let invalid = |message: String| FormatError::InvalidValue {
        field: field.to_string(),
        message,
    };

    match (kind, json) {
        (_, Json::Null) => Ok(Value::Null),
        (FieldKind::Boolean, Json::Bool(b)) => Ok(Value::Boolean(b)),
        (FieldKind::Integer, Json::Number(n)) => n
            .as_i64()
            .map(Value::Integer)
            .ok_or_else(|| invalid(format!("{} is not an integer", n))),
        (FieldKind::Float, Json::Number(n)) => n
            .as_f64()
            .map(Value::Float)
            .ok_or_else(|| invalid(format!("{} is not a float", n))),
        (FieldKind::Decimal, Json::Number(n)) => kind.parse_text(&n.to_string()).map_err(invalid),
        (FieldKind::String, Json::String(s)) => Ok(Value::String(s)),
        // Everything else may arrive quoted.
        (kind, Json::String(s)) => kind.parse_text(&s).map_err(invalid),
        (kind, other) => Err(invalid(format!(
            "expected {}, found {}",
            kind,
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
