//! HTTP transport abstraction.
//!
//! The adapter never opens connections itself. It hands fully built
//! requests to a [`Transport`] and receives complete responses back, which
//! keeps the translation testable with an in-memory fake.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::translator::{HttpRequest, HttpResponse};

#[cfg(feature = "http-client")]
mod http_client;

#[cfg(feature = "http-client")]
pub use self::http_client::ReqwestTransport;

/// Sends HTTP requests to a remote resource service.
///
/// Implementations must return non-success statuses as ordinary responses;
/// only failures to exchange a request (connection, timeout) are errors.
///
/// # Example
///
/// ```ignore
/// use restmap_rest::{HttpRequest, Transport, TransportError};
///
/// async fn ping<T: Transport>(transport: &T, request: HttpRequest) -> Result<(), TransportError> {
///     let response = transport.send(request).await?;
///     println!("{} answered {}", transport.name(), response.status());
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Returns a human-readable name for this transport.
    fn name(&self) -> &'static str;

    /// Sends a request and waits for the complete response.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request).await
    }
}
