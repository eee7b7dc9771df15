//! Request translation.
//!
//! [`RequestTranslator`] maps logical data operations on a
//! [`ResourceModel`] to HTTP requests, and HTTP responses back to decoded
//! [`Payload`]s or typed [`AdapterError`]s. It is stateless apart from the
//! shared, read-only [`ResourceEndpoint`], so a single translator may be used
//! from any number of callers at once.
//!
//! | Operation | HTTP Method | URL |
//! |-----------|-------------|-----|
//! | find | GET | `{base}/{storage}.{ext}?{predicates}` |
//! | find (by key) / get | GET | `{base}/{storage}/{id}.{ext}` |
//! | create | POST | `{base}/{storage}.{ext}` |
//! | update | PUT | `{base}/{storage}/{id}.{ext}` |
//! | destroy | DELETE | `{base}/{storage}/{id}.{ext}` |
//!
//! # Query Strings
//!
//! | Predicate | Encoding |
//! |-----------|----------|
//! | `title eq "Dune"` | `title=Dune` |
//! | `year gte 1965` | `year[gte]=1965` |
//! | `id in [1, 2]` | `id[in]=1&id[in]=2` |
//! | `author eq null` | `author[null]=true` |
//! | `author ne null` | `author[null]=false` |
//! | order by title, year desc | `order=title,-year` |
//! | limit / offset | `limit=10&offset=20` |
//!
//! Keys and values are percent-encoded as `application/x-www-form-urlencoded`.

use std::sync::Arc;

use http::header::{ACCEPT, ALLOW, AUTHORIZATION, CONTENT_TYPE, LOCATION};
use http::{Method, Request, Response};
use tracing::{debug, warn};
use url::Url;

use crate::endpoint::ResourceEndpoint;
use crate::error::{AdapterError, AdapterResult};
use crate::format::Format;
use crate::types::{Condition, FieldKind, Operand, Operator, Payload, Query, Record, ResourceModel, Value};

/// An outgoing HTTP request.
pub type HttpRequest = Request<Vec<u8>>;

/// An incoming HTTP response.
pub type HttpResponse = Response<Vec<u8>>;

/// Longest error body excerpt carried in error messages.
const MAX_ERROR_EXCERPT: usize = 200;

/// Translates resource operations to HTTP requests and responses to records.
#[derive(Debug, Clone)]
pub struct RequestTranslator {
    endpoint: Arc<ResourceEndpoint>,
}

impl RequestTranslator {
    /// Creates a translator for an endpoint.
    pub fn new(endpoint: impl Into<Arc<ResourceEndpoint>>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    /// Returns the endpoint.
    pub fn endpoint(&self) -> &ResourceEndpoint {
        &self.endpoint
    }

    /// Builds a GET request for the records matching `query`.
    ///
    /// A query that is a plain lookup by key is sent to the member URL.
    ///
    /// # Errors
    ///
    /// * `AdapterError::InvalidQuery` - a predicate or sort key names an
    ///   unknown field, or an operator does not apply to the field's kind
    pub fn translate_find(&self, model: &ResourceModel, query: &Query) -> AdapterResult<HttpRequest> {
        validate_query(model, query)?;

        let url = match query.key_lookup(model.key()) {
            Some(id) => self.endpoint.member_url(model.storage_name(), &id.to_text()),
            None => {
                let mut url = self.endpoint.collection_url(model.storage_name());
                encode_query(&mut url, query);
                url
            }
        };

        debug!(
            resource = model.name(),
            conditions = query.conditions().len(),
            url = %url,
            "Translated find"
        );
        self.build(Method::GET, &url, None)
    }

    /// Builds a GET request for a single record.
    pub fn translate_get(&self, model: &ResourceModel, id: &Value) -> AdapterResult<HttpRequest> {
        let url = self.member_url(model, id)?;
        debug!(resource = model.name(), url = %url, "Translated get");
        self.build(Method::GET, &url, None)
    }

    /// Builds a POST request creating `record` in the collection.
    ///
    /// # Errors
    ///
    /// * `AdapterError::InvalidRecord` - the record has undeclared fields or
    ///   values of the wrong kind
    pub fn translate_create(
        &self,
        model: &ResourceModel,
        record: &Record,
    ) -> AdapterResult<HttpRequest> {
        let record = self.conform_record(model, record)?;
        let body = self.endpoint.format().encode_record(model, &record)?;
        let url = self.endpoint.collection_url(model.storage_name());
        debug!(resource = model.name(), url = %url, bytes = body.len(), "Translated create");
        self.build(Method::POST, &url, Some(body))
    }

    /// Builds a PUT request replacing the record identified by its key.
    ///
    /// # Errors
    ///
    /// * `AdapterError::InvalidRecord` - the key is missing or null, or the
    ///   record does not conform to the model
    pub fn translate_update(
        &self,
        model: &ResourceModel,
        record: &Record,
    ) -> AdapterResult<HttpRequest> {
        let record = self.conform_record(model, record)?;
        let id = match record.get(model.key()) {
            Some(id) if !id.is_null() => id,
            _ => {
                return Err(AdapterError::InvalidRecord {
                    resource: model.name().to_string(),
                    message: format!("key field '{}' is required for update", model.key()),
                });
            }
        };
        let url = self.member_url(model, id)?;
        let body = self.endpoint.format().encode_record(model, &record)?;
        debug!(resource = model.name(), url = %url, bytes = body.len(), "Translated update");
        self.build(Method::PUT, &url, Some(body))
    }

    /// Builds a DELETE request for the record with the given key.
    pub fn translate_destroy(
        &self,
        model: &ResourceModel,
        id: &Value,
    ) -> AdapterResult<HttpRequest> {
        let url = self.member_url(model, id)?;
        debug!(resource = model.name(), url = %url, "Translated destroy");
        self.build(Method::DELETE, &url, None)
    }

    /// Validates `record` against the model and converts each value to its
    /// field's representation.
    ///
    /// This is the record that create and update requests carry.
    ///
    /// # Errors
    ///
    /// * `AdapterError::InvalidRecord` - the record has undeclared fields or
    ///   values of the wrong kind
    pub fn conform_record(&self, model: &ResourceModel, record: &Record) -> AdapterResult<Record> {
        model
            .conform_record(record)
            .map_err(|message| AdapterError::InvalidRecord {
                resource: model.name().to_string(),
                message,
            })
    }

    /// Maps a response to a decoded payload or a typed error.
    ///
    /// The body is decoded in the format named by the response
    /// `Content-Type`, falling back to the endpoint's format.
    pub fn parse_response(
        &self,
        model: &ResourceModel,
        response: &HttpResponse,
    ) -> AdapterResult<Payload> {
        let status = response.status();
        let format = self.response_format(response);
        let body = response.body();

        if !status.is_success() {
            let errors = format.decode_errors(body);
            let message = if errors.is_empty() {
                excerpt(body)
            } else {
                errors.join(", ")
            };
            let location = header_text(response, LOCATION);
            let allow = header_text(response, ALLOW);

            if let Some(err) = AdapterError::from_status(status, location, allow, message, errors) {
                warn!(
                    resource = model.name(),
                    status = status.as_u16(),
                    error = %err,
                    "Request failed"
                );
                return Err(err);
            }
        }

        let payload = format.decode(model, body)?;
        let records = match &payload {
            Payload::Empty => 0,
            Payload::One(_) => 1,
            Payload::Many(records) => records.len(),
        };
        debug!(
            resource = model.name(),
            status = status.as_u16(),
            records,
            "Parsed response"
        );
        Ok(payload)
    }

    fn response_format(&self, response: &HttpResponse) -> Format {
        header_text(response, CONTENT_TYPE)
            .and_then(|ct| Format::from_content_type(&ct))
            .unwrap_or(self.endpoint.format())
    }

    fn member_url(&self, model: &ResourceModel, id: &Value) -> AdapterResult<Url> {
        let key = model.key_field();
        if id.is_null() || !id.fits(key.kind) {
            return Err(AdapterError::InvalidRecord {
                resource: model.name().to_string(),
                message: format!("'{}' is not a valid {} key", id, key.kind),
            });
        }
        Ok(self.endpoint.member_url(model.storage_name(), &id.to_text()))
    }

    fn build(&self, method: Method, url: &Url, body: Option<Vec<u8>>) -> AdapterResult<HttpRequest> {
        let format = self.endpoint.format();
        let mut builder = Request::builder()
            .method(method)
            .uri(url.as_str())
            .header(ACCEPT, format.mime_type());

        if let Some(authorization) = self.endpoint.authorization() {
            builder = builder.header(AUTHORIZATION, authorization);
        }

        let body = match body {
            Some(body) => {
                builder = builder.header(CONTENT_TYPE, format.mime_type());
                body
            }
            None => Vec::new(),
        };

        Ok(builder.body(body)?)
    }
}

fn validate_query(model: &ResourceModel, query: &Query) -> AdapterResult<()> {
    let invalid = |message: String| AdapterError::InvalidQuery {
        resource: model.name().to_string(),
        message,
    };

    for condition in query.conditions() {
        let kind = model
            .kind_of(&condition.field)
            .ok_or_else(|| invalid(format!("unknown field '{}'", condition.field)))?;
        validate_condition(condition, kind).map_err(invalid)?;
    }

    for order in query.order() {
        if model.field(&order.field).is_none() {
            return Err(invalid(format!("cannot order by unknown field '{}'", order.field)));
        }
    }

    if query.limit_value() == Some(0) {
        return Err(invalid("limit must be positive".to_string()));
    }

    Ok(())
}

fn validate_condition(condition: &Condition, kind: FieldKind) -> Result<(), String> {
    let field = &condition.field;
    let check_value = |value: &Value| {
        if value.fits(kind) {
            Ok(())
        } else {
            Err(format!("'{}' is not a valid {} for '{}'", value, kind, field))
        }
    };

    match (condition.operator, &condition.operand) {
        (Operator::In, Operand::List(values)) => {
            if values.is_empty() {
                return Err(format!("'{}[in]' needs at least one value", field));
            }
            if values.iter().any(Value::is_null) {
                return Err(format!("'{}[in]' cannot contain null", field));
            }
            values.iter().try_for_each(check_value)
        }
        (Operator::In, Operand::Single(_)) => Err(format!("'{}[in]' needs a list of values", field)),
        (operator, Operand::List(_)) => {
            Err(format!("'{}[{}]' does not take a list of values", field, operator))
        }
        (Operator::Eq | Operator::Ne, Operand::Single(value)) => check_value(value),
        (operator, Operand::Single(Value::Null)) => {
            Err(format!("'{}[{}]' cannot compare with null", field, operator))
        }
        (Operator::Like, Operand::Single(value)) => {
            if kind != FieldKind::String {
                return Err(format!("'{}[like]' only applies to string fields", field));
            }
            check_value(value)
        }
        (operator, Operand::Single(value)) => {
            if !kind.is_ordered() {
                return Err(format!("'{}[{}]' does not apply to {} fields", field, operator, kind));
            }
            check_value(value)
        }
    }
}

fn encode_query(url: &mut Url, query: &Query) {
    let has_bounds = query.limit_value().is_some() || query.offset_value().is_some();
    if query.conditions().is_empty() && query.order().is_empty() && !has_bounds {
        return;
    }

    let mut pairs = url.query_pairs_mut();
    for condition in query.conditions() {
        let field = &condition.field;
        match (condition.operator, &condition.operand) {
            (Operator::Eq, Operand::Single(Value::Null)) => {
                pairs.append_pair(&format!("{}[null]", field), "true");
            }
            (Operator::Ne, Operand::Single(Value::Null)) => {
                pairs.append_pair(&format!("{}[null]", field), "false");
            }
            (Operator::Eq, Operand::Single(value)) => {
                pairs.append_pair(field, &value.to_text());
            }
            (operator, Operand::Single(value)) => {
                pairs.append_pair(&format!("{}[{}]", field, operator), &value.to_text());
            }
            (operator, Operand::List(values)) => {
                let key = format!("{}[{}]", field, operator);
                for value in values {
                    pairs.append_pair(&key, &value.to_text());
                }
            }
        }
    }

    if !query.order().is_empty() {
        let order = query
            .order()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        pairs.append_pair("order", &order);
    }
    if let Some(limit) = query.limit_value() {
        pairs.append_pair("limit", &limit.to_string());
    }
    if let Some(offset) = query.offset_value() {
        pairs.append_pair("offset", &offset.to_string());
    }
}

fn header_text(response: &HttpResponse, name: http::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.chars().count() > MAX_ERROR_EXCERPT {
        let mut short: String = text.chars().take(MAX_ERROR_EXCERPT).collect();
        short.push_str("...");
        short
    } else {
        text.to_string()
    }
}
