//! Fake transport harness.
//!
//! [`FakeTransport`] answers requests from canned responses registered by
//! method and path, and records every request it receives so tests can
//! assert on what the adapter sent.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use http::{Method, Response, StatusCode};
use parking_lot::Mutex;
use restmap_rest::{HttpRequest, HttpResponse, RestAdapter, Transport, TransportError};

use super::fixtures;

/// A response to replay.
#[derive(Debug, Clone)]
pub struct CannedResponse {
    status: u16,
    headers: Vec<(HeaderName, String)>,
    body: Vec<u8>,
}

impl CannedResponse {
    /// An empty response with `status`.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// An XML response.
    pub fn xml(status: u16, body: &str) -> Self {
        Self::status(status)
            .header(CONTENT_TYPE, "application/xml; charset=utf-8")
            .body(body)
    }

    /// A JSON response.
    pub fn json(status: u16, body: &str) -> Self {
        Self::status(status)
            .header(CONTENT_TYPE, "application/json; charset=utf-8")
            .body(body)
    }

    /// Adds a header.
    pub fn header(mut self, name: HeaderName, value: &str) -> Self {
        self.headers.push((name, value.to_string()));
        self
    }

    /// Sets the body.
    pub fn body(mut self, body: impl AsRef<[u8]>) -> Self {
        self.body = body.as_ref().to_vec();
        self
    }

    fn to_response(&self) -> HttpResponse {
        let mut response = Response::new(self.body.clone());
        *response.status_mut() = StatusCode::from_u16(self.status).expect("valid status");
        for (name, value) in &self.headers {
            response.headers_mut().append(
                name.clone(),
                HeaderValue::from_str(value).expect("valid header value"),
            );
        }
        response
    }
}

/// A request as the transport received it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Request method.
    pub method: Method,
    /// Full request URI.
    pub uri: String,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Vec<u8>,
}

impl RecordedRequest {
    /// Returns the body as text.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Returns a header value as text.
    pub fn header(&self, name: HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// In-memory transport with canned responses.
///
/// Responses are matched on method and path (the query string is ignored).
/// Several responses registered for the same route are replayed in order;
/// the last one repeats.
#[derive(Debug, Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<CannedResponse>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    failure: Mutex<Option<Failure>>,
}

#[derive(Debug, Clone)]
enum Failure {
    Connect(String),
    BodyTooLarge { size: usize, limit: usize },
}

impl FakeTransport {
    /// Creates a transport with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a response for `method` and `path`.
    pub fn respond(&self, method: Method, path: &str, response: CannedResponse) -> &Self {
        self.routes
            .lock()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(response);
        self
    }

    /// Makes every subsequent request fail at the transport level.
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock() = Some(Failure::Connect(message.to_string()));
    }

    /// Makes every subsequent request fail as if the body exceeded `limit`.
    pub fn fail_too_large(&self, size: usize, limit: usize) {
        *self.failure.lock() = Some(Failure::BodyTooLarge { size, limit });
    }

    /// Returns the requests received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Returns the most recent request.
    pub fn last_request(&self) -> RecordedRequest {
        self.requests
            .lock()
            .last()
            .cloned()
            .expect("no request was sent")
    }

    /// Returns the number of requests received.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let (parts, body) = request.into_parts();
        let path = parts.uri.path().to_string();
        self.requests.lock().push(RecordedRequest {
            method: parts.method.clone(),
            uri: parts.uri.to_string(),
            headers: parts.headers,
            body,
        });

        match self.failure.lock().clone() {
            Some(Failure::Connect(message)) => return Err(TransportError::Connect(message)),
            Some(Failure::BodyTooLarge { size, limit }) => {
                return Err(TransportError::BodyTooLarge { size, limit });
            }
            None => {}
        }

        let mut routes = self.routes.lock();
        let queue = routes
            .get_mut(&(parts.method.clone(), path.clone()))
            .ok_or_else(|| {
                TransportError::Other(format!("no canned response for {} {}", parts.method, path))
            })?;
        let canned = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        canned
            .map(|c| c.to_response())
            .ok_or_else(|| TransportError::Other(format!("no canned response for {}", path)))
    }
}

/// Creates an adapter over a shared fake transport.
pub fn xml_adapter() -> (RestAdapter<Arc<FakeTransport>>, Arc<FakeTransport>) {
    let transport = Arc::new(FakeTransport::new());
    let adapter = RestAdapter::new(fixtures::xml_endpoint(), Arc::clone(&transport));
    (adapter, transport)
}

/// Creates a JSON adapter over a shared fake transport.
pub fn json_adapter() -> (RestAdapter<Arc<FakeTransport>>, Arc<FakeTransport>) {
    let transport = Arc::new(FakeTransport::new());
    let adapter = RestAdapter::new(fixtures::json_endpoint(), Arc::clone(&transport));
    (adapter, transport)
}
