//! State of one delete-subscription attempt.

use serde::Serialize;

pub const DELETED_MESSAGE: &str = "Subscription deleted successfully";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteState {
    Idle,
    Deleting,
    Deleted,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSession {
    pub subscription_id: Option<String>,
    pub state: DeleteState,
    pub message: Option<String>,
}

impl Default for DeleteSession {
    fn default() -> Self {
        Self {
            subscription_id: None,
            state: DeleteState::Idle,
            message: None,
        }
    }
}

impl DeleteSession {
    pub fn deleting(subscription_id: impl Into<String>) -> Self {
        Self {
            subscription_id: Some(subscription_id.into()),
            state: DeleteState::Deleting,
            message: None,
        }
    }

    /// Failure before any request was made.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            subscription_id: None,
            state: DeleteState::Error,
            message: Some(message.into()),
        }
    }

    pub fn finish(mut self) -> Self {
        self.state = DeleteState::Deleted;
        self.message = Some(DELETED_MESSAGE.to_string());
        self
    }

    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.state = DeleteState::Error;
        self.message = Some(message.into());
        self
    }

    pub fn is_deleted(&self) -> bool {
        self.state == DeleteState::Deleted
    }
}
