//! [`reqwest`]-backed transport for the admin API.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Method;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::{debug, info};
use url::Url;

use crate::error::TransportError;
use crate::sse::{SseDecoder, SseEvent};
use crate::transport::{HttpResponse, PushStream, PushTransport, RequestTransport};

#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuse an existing client (connection pool, TLS settings, proxies).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse, TransportError> {
        info!(method = %method, url = %url, "admin API request");
        let mut req = self
            .client
            .request(method, url)
            .header(CONTENT_TYPE, "application/json");
        for (name, value) in headers {
            req = req.header(*name, *value);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        debug!(status = status.as_u16(), bytes = body.len(), "admin API response");

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        })
    }
}

#[async_trait]
impl PushTransport for ReqwestTransport {
    async fn open(&self, url: Url, headers: &[(&str, &str)]) -> Result<PushStream, TransportError> {
        info!(url = %url, "opening event stream");
        let mut req = self.client.get(url).header(ACCEPT, "text/event-stream");
        for (name, value) in headers {
            req = req.header(*name, *value);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let state = (
            Box::pin(resp.bytes_stream()),
            SseDecoder::new(),
            VecDeque::new(),
        );
        let messages = futures::stream::unfold(state, |(mut body, mut decoder, mut queued)| async move {
            loop {
                if let Some(data) = queued.pop_front() {
                    return Some((Ok(data), (body, decoder, queued)));
                }
                match body.next().await {
                    Some(Ok(chunk)) => queued.extend(
                        decoder
                            .feed(&chunk)
                            .into_iter()
                            .filter(SseEvent::is_message)
                            .map(|event| event.data),
                    ),
                    Some(Err(e)) => {
                        return Some((
                            Err(TransportError::Stream(e.to_string())),
                            (body, decoder, queued),
                        ));
                    }
                    None => return None,
                }
            }
        });

        Ok(messages.boxed())
    }
}

#[async_trait]
impl RequestTransport for ReqwestTransport {
    async fn get(&self, url: Url, headers: &[(&str, &str)]) -> Result<HttpResponse, TransportError> {
        self.send(Method::GET, url, headers).await
    }

    async fn delete(
        &self,
        url: Url,
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse, TransportError> {
        self.send(Method::DELETE, url, headers).await
    }
}
