//! Admin API client: streaming validation of scanned codes, subscription
//! deletion, and record lookups, over pluggable transports.

pub mod client;
pub mod config;
pub mod delete;
pub mod error;
pub mod session;
pub mod sse;
pub mod transport;
pub mod validator;

#[cfg(feature = "http")]
pub mod http;

#[cfg(test)]
mod test_utils;

pub use client::SubscriptionClient;
pub use config::{ClientConfig, DEFAULT_VALIDATION_TIMEOUT};
pub use delete::{DeleteSession, DeleteState};
pub use error::{ClientError, ConfigError, TransportError};
pub use session::{Outcome, SessionState, ValidationData, ValidationSession};
pub use transport::{HttpResponse, PushStream, PushTransport, RequestTransport};
pub use validator::{SessionWatch, Validator};

#[cfg(feature = "http")]
pub use http::ReqwestTransport;
