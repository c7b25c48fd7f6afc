//! Streaming validation of scanned codes.
//!
//! Each call to [`Validator::validate`] starts a session: one push connection
//! and one driver task racing the first server message against the timeout.
//! Whichever finishes first settles the session; the loser is dropped along
//! with the connection. Sessions are numbered, and a driver only publishes
//! while its number is the current one, so a superseded attempt can never
//! overwrite a newer result.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::session::{Outcome, ValidationSession};
use crate::transport::PushTransport;

/// Path of the validation event stream under the base URL.
pub const VALIDATE_PATH: [&str; 3] = ["one-c", "qr", "validate"];

type SessionSender = Arc<watch::Sender<Option<ValidationSession>>>;

pub struct Validator<T: PushTransport> {
    transport: Arc<T>,
    config: ClientConfig,
    tx: SessionSender,
    next_generation: u64,
    last_code: Option<String>,
    driver: Option<JoinHandle<()>>,
}

impl<T: PushTransport> Validator<T> {
    pub fn new(transport: T, config: ClientConfig) -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            transport: Arc::new(transport),
            config,
            tx: Arc::new(tx),
            next_generation: 1,
            last_code: None,
            driver: None,
        }
    }

    /// Start validating `code`, superseding any session in flight.
    ///
    /// Must be called within a tokio runtime.
    pub fn validate(&mut self, code: &str) -> SessionWatch {
        self.abort_driver();

        let generation = self.next_generation;
        self.next_generation += 1;
        self.last_code = Some(code.to_string());

        let session = ValidationSession::new(generation, code);
        let mut url = self.config.endpoint(&VALIDATE_PATH);
        url.query_pairs_mut()
            .append_pair("code", session.derived_key());
        debug!(generation, code = %code, key = %session.derived_key(), "validating code");
        info!(generation, url = %url, "starting validation session");

        // Subscribe before publishing so the watcher sees this session as unseen.
        let rx = self.tx.subscribe();
        self.tx.send_replace(Some(session));

        let transport = Arc::clone(&self.transport);
        let tx = Arc::clone(&self.tx);
        let (header, api_key) = self.config.auth_header();
        let api_key = api_key.to_string();
        let timeout = self.config.validation_timeout();

        self.driver = Some(tokio::spawn(async move {
            let outcome = tokio::select! {
                outcome = first_outcome(transport.as_ref(), url, header, &api_key) => outcome,
                () = tokio::time::sleep(timeout) => {
                    warn!(generation, ?timeout, "validation timed out");
                    Outcome::TimedOut
                }
            };
            if publish(&tx, generation, outcome) {
                debug!(generation, "validation session settled");
            }
        }));

        SessionWatch { generation, rx }
    }

    /// Validate the most recent code again as a fresh session.
    pub fn retry(&mut self) -> Option<SessionWatch> {
        let code = self.last_code.clone()?;
        info!("retrying validation");
        Some(self.validate(&code))
    }

    /// Abandon the current session and clear it.
    pub fn cancel(&mut self) {
        self.abort_driver();
        self.tx.send_replace(None);
    }

    /// Snapshot of the current session.
    pub fn current(&self) -> Option<ValidationSession> {
        self.tx.borrow().clone()
    }

    /// Receiver following every session this validator publishes.
    pub fn subscribe(&self) -> watch::Receiver<Option<ValidationSession>> {
        self.tx.subscribe()
    }

    fn abort_driver(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}

impl<T: PushTransport> Drop for Validator<T> {
    fn drop(&mut self) {
        self.abort_driver();
    }
}

/// Handle on one session, returned by [`Validator::validate`].
#[derive(Debug)]
pub struct SessionWatch {
    generation: u64,
    rx: watch::Receiver<Option<ValidationSession>>,
}

impl SessionWatch {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Wait for this session to reach a terminal state.
    ///
    /// Returns `None` if the session was superseded or cancelled first, or
    /// the validator was dropped.
    pub async fn settled(&mut self) -> Option<ValidationSession> {
        let generation = self.generation;
        let current = self
            .rx
            .wait_for(|s| !matches!(s, Some(s) if s.generation() == generation && !s.is_terminal()))
            .await
            .ok()?;
        current
            .as_ref()
            .filter(|s| s.generation() == generation)
            .cloned()
    }
}

/// Open the stream and wait for the first thing it says.
async fn first_outcome<T: PushTransport>(
    transport: &T,
    url: url::Url,
    header: &'static str,
    api_key: &str,
) -> Outcome {
    let mut stream = match transport.open(url, &[(header, api_key)]).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(error = %e, "validation stream failed to open");
            return Outcome::ConnectionError;
        }
    };
    match stream.next().await {
        Some(Ok(payload)) => {
            debug!(payload = %payload, "validation message");
            let outcome = Outcome::from_message(&payload);
            if outcome == Outcome::Malformed {
                warn!("unparseable validation message");
            }
            outcome
        }
        Some(Err(e)) => {
            warn!(error = %e, "validation stream error");
            Outcome::ConnectionError
        }
        None => {
            warn!("validation stream closed without a message");
            Outcome::ConnectionError
        }
    }
}

/// Settle the session `generation` if it is still current. Returns whether
/// anything changed.
fn publish(
    tx: &watch::Sender<Option<ValidationSession>>,
    generation: u64,
    outcome: Outcome,
) -> bool {
    tx.send_if_modified(|current| match current {
        Some(session) if session.generation() == generation => session.settle(outcome),
        _ => false,
    })
}
