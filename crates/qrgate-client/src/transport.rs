//! Transport capabilities the validator and subscription client run on.
//!
//! Session logic only sees these traits, so the push channel can be a native
//! event stream, a long-poll substitute, or an in-memory fake in tests.

use async_trait::async_trait;
use futures::stream::BoxStream;
use url::Url;

use crate::error::TransportError;

/// Message payloads from one open push connection, in arrival order.
///
/// The stream ending means the server closed the connection. Dropping the
/// stream closes it from our side.
pub type PushStream = BoxStream<'static, Result<String, TransportError>>;

/// Opens server-push connections.
#[async_trait]
pub trait PushTransport: Send + Sync + 'static {
    async fn open(&self, url: Url, headers: &[(&str, &str)]) -> Result<PushStream, TransportError>;
}

/// A minimal HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Canonical reason phrase for `status`, e.g. `Not Found`.
    pub reason: String,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Request/response calls against the admin API.
#[async_trait]
pub trait RequestTransport: Send + Sync {
    async fn get(&self, url: Url, headers: &[(&str, &str)]) -> Result<HttpResponse, TransportError>;

    async fn delete(
        &self,
        url: Url,
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse, TransportError>;
}
