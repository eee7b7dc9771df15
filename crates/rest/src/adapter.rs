//! The REST adapter.
//!
//! [`RestAdapter`] pairs a [`RequestTranslator`] with a [`Transport`] and
//! offers record-level operations to a mapping layer. Each operation is a
//! sequence of one or more request/response exchanges performed in order;
//! the adapter holds no mutable state and may be shared across tasks.

use std::sync::Arc;

use http::header::LOCATION;
use percent_encoding::percent_decode_str;
use tracing::{debug, instrument, warn};

use crate::config::{AdapterConfig, DEFAULT_MAX_BODY_SIZE};
use crate::endpoint::ResourceEndpoint;
use crate::error::{AdapterError, AdapterResult, FormatError, TransportError};
use crate::translator::{HttpRequest, HttpResponse, RequestTranslator};
use crate::transport::Transport;
use crate::types::{Payload, Query, Record, ResourceModel, Value};

/// Record-level operations against a remote resource service.
#[derive(Debug, Clone)]
pub struct RestAdapter<T> {
    translator: RequestTranslator,
    transport: T,
    max_body_size: usize,
}

impl<T: Transport> RestAdapter<T> {
    /// Creates an adapter for `endpoint` sending requests through `transport`.
    pub fn new(endpoint: impl Into<Arc<ResourceEndpoint>>, transport: T) -> Self {
        Self {
            translator: RequestTranslator::new(endpoint),
            transport,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    /// Creates an adapter from configuration.
    pub fn from_config(config: &AdapterConfig, transport: T) -> AdapterResult<Self> {
        Ok(Self::new(config.resource_endpoint()?, transport).with_max_body_size(config.max_body_size))
    }

    /// Sets the largest response body accepted.
    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    /// Returns the translator.
    pub fn translator(&self) -> &RequestTranslator {
        &self.translator
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Creates a record.
    ///
    /// The result is `record`, with values converted to their declared kinds,
    /// overlaid with whatever fields the service returned. When the service
    /// answers with an empty body, the key is recovered from the `Location`
    /// header if present.
    #[instrument(skip_all, fields(resource = model.name()))]
    pub async fn create(&self, model: &ResourceModel, record: &Record) -> AdapterResult<Record> {
        let mut created = self.translator.conform_record(model, record)?;
        let request = self.translator.translate_create(model, &created)?;
        let response = self.execute(request).await?;
        let payload = self.translator.parse_response(model, &response)?;

        match payload {
            Payload::One(returned) => created.merge(returned),
            Payload::Empty => match location_key(model, &response) {
                Some(id) => {
                    created.set(model.key(), id);
                }
                None => debug!("Create returned no body and no usable Location header"),
            },
            Payload::Many(_) => return Err(single_record_expected(model)),
        }
        Ok(created)
    }

    /// Reads the records matching `query`.
    ///
    /// A lookup by key that the service answers with 404 yields no records.
    #[instrument(skip_all, fields(resource = model.name()))]
    pub async fn read(&self, model: &ResourceModel, query: &Query) -> AdapterResult<Vec<Record>> {
        let keyed = query.key_lookup(model.key()).is_some();
        let request = self.translator.translate_find(model, query)?;
        let response = self.execute(request).await?;

        match self.translator.parse_response(model, &response) {
            Ok(payload) => Ok(payload.into_records()),
            Err(AdapterError::NotFound) if keyed => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Reads a single record by key. Returns `None` on 404.
    #[instrument(skip_all, fields(resource = model.name(), id = %id))]
    pub async fn get(&self, model: &ResourceModel, id: &Value) -> AdapterResult<Option<Record>> {
        let request = self.translator.translate_get(model, id)?;
        let response = self.execute(request).await?;

        match self.translator.parse_response(model, &response) {
            Ok(Payload::One(record)) => Ok(Some(record)),
            Ok(Payload::Empty) => Ok(None),
            Ok(Payload::Many(_)) => Err(single_record_expected(model)),
            Err(AdapterError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Replaces a record identified by its key.
    ///
    /// Fields returned by the service are overlaid on the conformed `record`.
    #[instrument(skip_all, fields(resource = model.name()))]
    pub async fn update(&self, model: &ResourceModel, record: &Record) -> AdapterResult<Record> {
        let mut updated = self.translator.conform_record(model, record)?;
        let request = self.translator.translate_update(model, &updated)?;
        let response = self.execute(request).await?;

        match self.translator.parse_response(model, &response)? {
            Payload::One(returned) => updated.merge(returned),
            Payload::Empty => {}
            Payload::Many(_) => return Err(single_record_expected(model)),
        }
        Ok(updated)
    }

    /// Deletes the record with the given key.
    #[instrument(skip_all, fields(resource = model.name(), id = %id))]
    pub async fn destroy(&self, model: &ResourceModel, id: &Value) -> AdapterResult<()> {
        let request = self.translator.translate_destroy(model, id)?;
        let response = self.execute(request).await?;
        self.translator.parse_response(model, &response)?;
        Ok(())
    }

    /// Applies `changes` to every record matching `query`.
    ///
    /// Records are read first and then updated one at a time; the first
    /// failure stops the sequence. Returns the number of records updated.
    #[instrument(skip_all, fields(resource = model.name()))]
    pub async fn update_matching(
        &self,
        model: &ResourceModel,
        query: &Query,
        changes: &Record,
    ) -> AdapterResult<usize> {
        let changes = self.translator.conform_record(model, changes)?;
        if changes.contains(model.key()) {
            return Err(AdapterError::InvalidRecord {
                resource: model.name().to_string(),
                message: format!("key field '{}' cannot be changed", model.key()),
            });
        }

        let records = self.read(model, query).await?;
        let mut updated = 0;
        for mut record in records {
            record.merge(changes.clone());
            self.update(model, &record).await?;
            updated += 1;
        }

        debug!(updated, "Updated matching records");
        Ok(updated)
    }

    /// Deletes every record matching `query`. Returns the number deleted.
    #[instrument(skip_all, fields(resource = model.name()))]
    pub async fn destroy_matching(&self, model: &ResourceModel, query: &Query) -> AdapterResult<usize> {
        let records = self.read(model, query).await?;
        let mut destroyed = 0;
        for record in records {
            let id = match record.get(model.key()) {
                Some(id) if !id.is_null() => id,
                _ => {
                    return Err(AdapterError::InvalidRecord {
                        resource: model.name().to_string(),
                        message: format!("matched record has no '{}'", model.key()),
                    });
                }
            };
            self.destroy(model, id).await?;
            destroyed += 1;
        }

        debug!(destroyed, "Destroyed matching records");
        Ok(destroyed)
    }

    async fn execute(&self, request: HttpRequest) -> AdapterResult<HttpResponse> {
        let method = request.method().clone();
        let uri = request.uri().clone();

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(TransportError::BodyTooLarge { size, limit }) => {
                warn!(
                    transport = self.transport.name(),
                    method = %method,
                    uri = %uri,
                    size,
                    limit,
                    "Response body too large"
                );
                return Err(AdapterError::ResponseTooLarge { size, limit });
            }
            Err(e) => {
                warn!(
                    transport = self.transport.name(),
                    method = %method,
                    uri = %uri,
                    error = %e,
                    "Transport failed"
                );
                return Err(e.into());
            }
        };

        let size = response.body().len();
        debug!(
            transport = self.transport.name(),
            method = %method,
            uri = %uri,
            status = response.status().as_u16(),
            bytes = size,
            "Received response"
        );

        if size > self.max_body_size {
            return Err(AdapterError::ResponseTooLarge {
                size,
                limit: self.max_body_size,
            });
        }
        Ok(response)
    }
}

fn single_record_expected(model: &ResourceModel) -> AdapterError {
    FormatError::UnexpectedShape(format!(
        "expected a single {}, found a collection",
        model.name()
    ))
    .into()
}

/// Extracts the key from a `Location` header such as `/books/42.xml`.
fn location_key(model: &ResourceModel, response: &HttpResponse) -> Option<Value> {
    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    let path = location.split(['?', '#']).next()?;
    let segment = path.trim_end_matches('/').rsplit('/').next()?;
    let segment = match segment.rsplit_once('.') {
        Some((stem, "xml" | "json")) => stem,
        _ => segment,
    };
    if segment.is_empty() {
        return None;
    }

    let decoded = percent_decode_str(segment).decode_utf8().ok()?;
    model.key_field().kind.parse_text(&decoded).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldKind;
    use http::Response;

    fn book() -> ResourceModel {
        ResourceModel::builder("book")
            .field("id", FieldKind::Integer)
            .field("title", FieldKind::String)
            .build()
            .unwrap()
    }

    fn with_location(location: &str) -> HttpResponse {
        Response::builder()
            .status(201)
            .header(LOCATION, location)
            .body(Vec::new())
            .unwrap()
    }

    #[test]
    fn test_location_key() {
        let model = book();
        assert_eq!(
            location_key(&model, &with_location("http://localhost:4000/books/42.xml")),
            Some(Value::Integer(42))
        );
        assert_eq!(
            location_key(&model, &with_location("/books/7")),
            Some(Value::Integer(7))
        );
        assert_eq!(
            location_key(&model, &with_location("/books/7.json?x=1")),
            Some(Value::Integer(7))
        );
        assert_eq!(location_key(&model, &with_location("/books/abc.xml")), None);
    }

    #[test]
    fn test_location_key_string_keys() {
        let model = ResourceModel::builder("tag")
            .key("slug")
            .field("slug", FieldKind::String)
            .build()
            .unwrap();
        assert_eq!(
            location_key(&model, &with_location("/tags/rust%20lang.xml")),
            Some(Value::from("rust lang"))
        );
    }
}
