//! Request/response calls against the admin API: deleting a scanned
//! subscription and looking up the records behind it.

use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use qrgate_core::token;
use qrgate_core::{Subscription, User};

use crate::config::ClientConfig;
use crate::delete::DeleteSession;
use crate::error::ClientError;
use crate::transport::{HttpResponse, RequestTransport};

pub struct SubscriptionClient<T: RequestTransport> {
    transport: T,
    config: ClientConfig,
}

impl<T: RequestTransport> SubscriptionClient<T> {
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Delete the subscription named by a scanned JSON code.
    ///
    /// Codes that are not JSON, or carry neither `subId` nor
    /// `subscriptionId`, fail without a request.
    pub async fn delete_subscription(&self, code: &str) -> DeleteSession {
        let (tx, _rx) = watch::channel(DeleteSession::default());
        self.delete_subscription_watched(code, &tx).await
    }

    /// As [`delete_subscription`](Self::delete_subscription), publishing the
    /// `Deleting` state to `progress` before the request goes out.
    pub async fn delete_subscription_watched(
        &self,
        code: &str,
        progress: &watch::Sender<DeleteSession>,
    ) -> DeleteSession {
        let id = match token::subscription_id(code) {
            Ok(id) => id,
            Err(e) => {
                debug!(code = %code, "not a deletable code");
                let session = DeleteSession::rejected(e.to_string());
                progress.send_replace(session.clone());
                return session;
            }
        };

        let pending = DeleteSession::deleting(&id);
        progress.send_replace(pending.clone());

        let url = self.config.endpoint(&["subscriptions", id.as_str()]);
        info!(subscription_id = %id, "deleting subscription");
        let session = match self.transport.delete(url, &[self.config.auth_header()]).await {
            Ok(resp) if resp.is_success() => {
                debug!(body = %resp.body, "delete response");
                pending.finish()
            }
            Ok(resp) => {
                let err = server_error(resp);
                warn!(subscription_id = %id, error = %err, "delete rejected");
                pending.fail(err.to_string())
            }
            Err(e) => {
                warn!(subscription_id = %id, error = %e, "delete request failed");
                pending.fail(e.to_string())
            }
        };
        progress.send_replace(session.clone());
        session
    }

    pub async fn fetch_user(&self, id: &str) -> Result<User, ClientError> {
        self.get_json(&["users", id]).await
    }

    pub async fn fetch_subscription(&self, id: &str) -> Result<Subscription, ClientError> {
        self.get_json(&["subscriptions", id]).await
    }

    async fn get_json<R: DeserializeOwned>(&self, segments: &[&str]) -> Result<R, ClientError> {
        let url = self.config.endpoint(segments);
        let resp = self
            .transport
            .get(url, &[self.config.auth_header()])
            .await?;
        if !resp.is_success() {
            return Err(api_error(resp));
        }
        Ok(serde_json::from_str(&resp.body)?)
    }
}

fn server_error(resp: HttpResponse) -> ClientError {
    ClientError::Server {
        status: resp.status,
        reason: resp.reason,
        body: resp.body,
    }
}

/// Prefer the `message` of a JSON error body over the raw response.
fn api_error(resp: HttpResponse) -> ClientError {
    if let Ok(body) = serde_json::from_str::<serde_json::Value>(&resp.body)
        && let Some(message) = body.get("message").and_then(|m| m.as_str())
    {
        return ClientError::Api(message.to_string());
    }
    server_error(resp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delete::{DELETED_MESSAGE, DeleteState};
    use crate::error::TransportError;
    use crate::test_utils::MockRequests;

    fn mock_client(transport: MockRequests) -> SubscriptionClient<MockRequests> {
        let config = ClientConfig::new("http://gate.test/api/", "key-1").unwrap();
        SubscriptionClient::new(transport, config)
    }

    #[tokio::test]
    async fn invalid_json_makes_no_request() {
        let client = mock_client(MockRequests::respond(200, "OK", ""));
        let session = client.delete_subscription("plain text").await;
        assert_eq!(session.state, DeleteState::Error);
        assert_eq!(session.message.as_deref(), Some("Invalid QR code format"));
        assert!(client.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn missing_id_makes_no_request() {
        let client = mock_client(MockRequests::respond(200, "OK", ""));
        let session = client.delete_subscription(r#"{"userId":"u1"}"#).await;
        assert_eq!(
            session.message.as_deref(),
            Some("No subscription ID found in QR code")
        );
        assert!(client.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn deletes_by_sub_id() {
        let client = mock_client(MockRequests::respond(200, "OK", "{}"));
        let session = client
            .delete_subscription(r#"{"subId":"s-9","userId":"u1"}"#)
            .await;
        assert!(session.is_deleted());
        assert_eq!(session.subscription_id.as_deref(), Some("s-9"));
        assert_eq!(session.message.as_deref(), Some(DELETED_MESSAGE));

        let requests = client.transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "DELETE");
        assert_eq!(
            requests[0].url.as_str(),
            "http://gate.test/api/subscriptions/s-9"
        );
        assert_eq!(requests[0].api_key.as_deref(), Some("key-1"));
    }

    #[tokio::test]
    async fn falls_back_to_subscription_id() {
        let client = mock_client(MockRequests::respond(204, "No Content", ""));
        let session = client
            .delete_subscription(r#"{"subscriptionId":"s-2"}"#)
            .await;
        assert!(session.is_deleted());
        assert!(client.transport.requests()[0].url.path().ends_with("/s-2"));
    }

    #[tokio::test]
    async fn server_rejection_message() {
        let client = mock_client(MockRequests::respond(404, "Not Found", "no such subscription"));
        let (tx, rx) = watch::channel(DeleteSession::default());
        let session = client
            .delete_subscription_watched(r#"{"subId":"s-1"}"#, &tx)
            .await;
        assert_eq!(session.state, DeleteState::Error);
        assert_eq!(
            session.message.as_deref(),
            Some("404 Not Found: no such subscription")
        );
        assert_eq!(*rx.borrow(), session);
    }

    #[tokio::test]
    async fn transport_failure_message() {
        let client = mock_client(MockRequests::new(Err(TransportError::Http(
            "connection refused".into(),
        ))));
        let session = client.delete_subscription(r#"{"subId":"s-1"}"#).await;
        assert_eq!(session.state, DeleteState::Error);
        assert_eq!(
            session.message.as_deref(),
            Some("HTTP request failed: connection refused")
        );
    }

    #[tokio::test]
    async fn fetch_user_parses_record() {
        let body = r#"{"id":"u1","fullName":"Ada","createdAt":"2024-01-01T00:00:00Z","updatedAt":"2024-01-02T00:00:00Z"}"#;
        let client = mock_client(MockRequests::respond(200, "OK", body));
        let user = client.fetch_user("u1").await.unwrap();
        assert_eq!(user.full_name, "Ada");
        let requests = client.transport.requests();
        assert_eq!(requests[0].method, "GET");
        assert_eq!(requests[0].url.as_str(), "http://gate.test/api/users/u1");
    }

    #[tokio::test]
    async fn lookup_error_prefers_api_message() {
        let client = mock_client(MockRequests::respond(
            404,
            "Not Found",
            r#"{"message":"Subscription not found"}"#,
        ));
        let err = client.fetch_subscription("s-1").await.unwrap_err();
        assert_eq!(err.to_string(), "Subscription not found");

        let client = mock_client(MockRequests::respond(500, "Internal Server Error", "boom"));
        let err = client.fetch_subscription("s-1").await.unwrap_err();
        assert_eq!(err.to_string(), "500 Internal Server Error: boom");
    }
}
