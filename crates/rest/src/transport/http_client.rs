//! reqwest-backed transport.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::Transport;
use crate::config::DEFAULT_MAX_BODY_SIZE;
use crate::error::TransportError;
use crate::translator::{HttpRequest, HttpResponse};

/// A [`Transport`] backed by a pooled [`reqwest::Client`].
///
/// Redirects are returned to the caller as ordinary 3xx responses, and
/// bodies larger than the configured limit are rejected while reading.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
    max_body_size: usize,
}

impl ReqwestTransport {
    /// Creates a transport whose requests fail after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(Self::with_client(client, timeout))
    }

    /// Wraps an existing client. `timeout` is used for error reporting only.
    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    /// Sets the largest response body read before giving up.
    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    fn map_error(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(self.timeout.as_secs())
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }

    fn too_large(&self, size: usize) -> TransportError {
        TransportError::BodyTooLarge {
            size,
            limit: self.max_body_size,
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    fn name(&self) -> &'static str {
        "reqwest"
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let request = reqwest::Request::try_from(request)
            .map_err(|e| TransportError::Other(e.to_string()))?;
        debug!(method = %request.method(), url = %request.url(), "Sending request");

        let mut response = self
            .client
            .execute(request)
            .await
            .map_err(|e| self.map_error(e))?;

        if let Some(length) = response.content_length() {
            let length = usize::try_from(length).unwrap_or(usize::MAX);
            if length > self.max_body_size {
                return Err(self.too_large(length));
            }
        }

        let status = response.status();
        let version = response.version();
        let headers = response.headers().clone();

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.map_error(e))? {
            let size = body.len() + chunk.len();
            if size > self.max_body_size {
                return Err(self.too_large(size));
            }
            body.extend_from_slice(&chunk);
        }

        let mut out = HttpResponse::new(body);
        *out.status_mut() = status;
        *out.version_mut() = version;
        *out.headers_mut() = headers;
        Ok(out)
    }
}
