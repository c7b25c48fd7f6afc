//! In-memory transports for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use url::Url;

use crate::config::API_KEY_HEADER;
use crate::error::TransportError;
use crate::transport::{HttpResponse, PushStream, PushTransport, RequestTransport};

fn api_key(headers: &[(&str, &str)]) -> Option<String> {
    headers
        .iter()
        .find(|(name, _)| *name == API_KEY_HEADER)
        .map(|(_, value)| (*value).to_string())
}

/// Server side of one mock push connection.
///
/// Dropping it ends the stream; `tx.is_closed()` tells whether the client
/// dropped its end.
#[derive(Debug)]
pub struct MockConnection {
    pub url: Url,
    pub api_key: Option<String>,
    pub tx: mpsc::UnboundedSender<Result<String, TransportError>>,
}

impl MockConnection {
    pub fn send(&self, payload: &str) {
        let _ = self.tx.send(Ok(payload.to_string()));
    }

    pub fn fail(&self, error: TransportError) {
        let _ = self.tx.send(Err(error));
    }
}

/// Push transport handing every opened connection to the test.
pub struct MockPush {
    opened: mpsc::UnboundedSender<MockConnection>,
    open_error: Option<TransportError>,
}

impl MockPush {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MockConnection>) {
        let (opened, rx) = mpsc::unbounded_channel();
        (
            Self {
                opened,
                open_error: None,
            },
            rx,
        )
    }

    /// Every `open` fails with `error`.
    pub fn failing(error: TransportError) -> (Self, mpsc::UnboundedReceiver<MockConnection>) {
        let (mut push, rx) = Self::new();
        push.open_error = Some(error);
        (push, rx)
    }
}

#[async_trait]
impl PushTransport for MockPush {
    async fn open(&self, url: Url, headers: &[(&str, &str)]) -> Result<PushStream, TransportError> {
        if let Some(e) = &self.open_error {
            return Err(e.clone());
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = self.opened.send(MockConnection {
            url,
            api_key: api_key(headers),
            tx,
        });
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            let item = rx.recv().await?;
            Some((item, rx))
        });
        Ok(stream.boxed())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub url: Url,
    pub api_key: Option<String>,
}

/// Request transport answering every call with one canned response.
pub struct MockRequests {
    response: Result<HttpResponse, TransportError>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockRequests {
    pub fn new(response: Result<HttpResponse, TransportError>) -> Self {
        Self {
            response,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn respond(status: u16, reason: &str, body: &str) -> Self {
        Self::new(Ok(HttpResponse {
            status,
            reason: reason.to_string(),
            body: body.to_string(),
        }))
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn record(
        &self,
        method: &'static str,
        url: Url,
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            method,
            url,
            api_key: api_key(headers),
        });
        self.response.clone()
    }
}

#[async_trait]
impl RequestTransport for MockRequests {
    async fn get(&self, url: Url, headers: &[(&str, &str)]) -> Result<HttpResponse, TransportError> {
        self.record("GET", url, headers)
    }

    async fn delete(
        &self,
        url: Url,
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse, TransportError> {
        self.record("DELETE", url, headers)
    }
}
