//! Validation session state and the server's verdict messages.

use chrono::{DateTime, NaiveDate};
use serde::{Serialize, Serializer};
use serde_json::Value;

use qrgate_core::token;

pub const VALID_MESSAGE: &str = "✓ Valid QR Code";
pub const CONNECTION_ERROR_MESSAGE: &str = "Connection error during validation";
pub const TIMEOUT_MESSAGE: &str = "Validation timeout";
pub const PARSE_ERROR_MESSAGE: &str = "Failed to parse validation response";
pub const INVALID_MESSAGE: &str = "Invalid QR code";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Pending,
    Success,
    Failure,
    TimedOut,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Payload of a positive verdict.
///
/// The typed fields are read leniently: ids may be strings or numbers, and a
/// field of an unexpected type is treated as absent. `raw` keeps the server's
/// `data` exactly as sent and is what serialises.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationData {
    pub subscription_id: Option<String>,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub expires_at: Option<String>,
    pub remaining_uses: Option<u32>,
    pub validated_at: Option<String>,
    pub raw: Value,
}

impl ValidationData {
    pub fn from_value(data: &Value) -> Self {
        let text = |key: &str| {
            data.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Self {
            subscription_id: token::id_field(data, "subscriptionId"),
            user_id: token::id_field(data, "userId"),
            user_name: text("userName"),
            expires_at: text("expiresAt"),
            remaining_uses: data
                .get("remainingUses")
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok()),
            validated_at: text("validatedAt"),
            raw: data.clone(),
        }
    }
}

impl Serialize for ValidationData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

/// What ended a validation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Valid(ValidationData),
    Invalid {
        reason: Option<String>,
        message: Option<String>,
    },
    /// A message arrived but could not be parsed.
    Malformed,
    /// The connection failed or closed before any message.
    ConnectionError,
    TimedOut,
}

impl Outcome {
    /// Interpret one stream message. Only text that is not JSON is
    /// `Malformed`; `valid` is judged by truthiness before `data` is read.
    pub fn from_message(payload: &str) -> Self {
        let Ok(body) = serde_json::from_str::<Value>(payload) else {
            return Self::Malformed;
        };
        if body.get("valid").is_some_and(token::is_truthy) {
            let data = body.get("data").cloned().unwrap_or(Value::Null);
            return Self::Valid(ValidationData::from_value(&data));
        }
        let text = |key: &str| {
            body.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Self::Invalid {
            reason: text("reason"),
            message: text("message"),
        }
    }
}

/// Snapshot of one validation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSession {
    #[serde(skip)]
    generation: u64,
    code: String,
    derived_key: String,
    state: SessionState,
    result_message: Option<String>,
    result_data: Option<ValidationData>,
}

impl ValidationSession {
    pub fn new(generation: u64, code: impl Into<String>) -> Self {
        let code = code.into();
        let derived_key = token::validation_key(&code);
        Self {
            generation,
            code,
            derived_key,
            state: SessionState::Pending,
            result_message: None,
            result_data: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The code as scanned.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// The identifier sent to the validation endpoint.
    pub fn derived_key(&self) -> &str {
        &self.derived_key
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn result_message(&self) -> Option<&str> {
        self.result_message.as_deref()
    }

    pub fn result_data(&self) -> Option<&ValidationData> {
        self.result_data.as_ref()
    }

    /// Apply a terminal outcome. Returns false, changing nothing, if the
    /// session already left `Pending`.
    pub fn settle(&mut self, outcome: Outcome) -> bool {
        if self.is_terminal() {
            return false;
        }
        let (state, message) = match outcome {
            Outcome::Valid(data) => {
                let message = success_message(&data);
                self.result_data = Some(data);
                (SessionState::Success, message)
            }
            Outcome::Invalid { reason, message } => (
                SessionState::Failure,
                message.unwrap_or_else(|| failure_message(reason.as_deref())),
            ),
            Outcome::Malformed => (SessionState::Failure, PARSE_ERROR_MESSAGE.to_string()),
            Outcome::ConnectionError => {
                (SessionState::Failure, CONNECTION_ERROR_MESSAGE.to_string())
            }
            Outcome::TimedOut => (SessionState::TimedOut, TIMEOUT_MESSAGE.to_string()),
        };
        self.state = state;
        self.result_message = Some(message);
        true
    }
}

fn success_message(data: &ValidationData) -> String {
    let mut details = Vec::new();
    if let Some(id) = &data.subscription_id {
        details.push(format!("Subscription: {id}"));
    }
    if let Some(id) = &data.user_id {
        details.push(format!("User: {id}"));
    }
    if let Some(expires) = &data.expires_at {
        details.push(format!("Expires: {}", format_date(expires)));
    }
    if details.is_empty() {
        VALID_MESSAGE.to_string()
    } else {
        format!("{VALID_MESSAGE} ({})", details.join(" | "))
    }
}

/// Human text for a rejection reason code.
pub fn failure_message(reason: Option<&str>) -> String {
    let Some(reason) = reason else {
        return INVALID_MESSAGE.to_string();
    };
    let text = match reason {
        "not_found" => "QR code not found",
        "already_used" => "QR code already used",
        "not_yet_valid" => "QR code not yet valid",
        "expired" => "QR code expired",
        "no_user" => "No user found",
        "no_active_subscription" => "No active subscription",
        other => return format!("Invalid: {other}"),
    };
    text.to_string()
}

/// `YYYY-MM-DD` for an RFC 3339 timestamp or a bare date; anything else as given.
fn format_date(raw: &str) -> String {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return ts.date_naive().format("%Y-%m-%d").to_string();
    }
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => date.format("%Y-%m-%d").to_string(),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_derives_key() {
        let session = ValidationSession::new(3, r#"{"subId":"abc","userId":"u1"}"#);
        assert_eq!(session.derived_key(), "abc_sub");
        assert_eq!(session.state(), SessionState::Pending);
        assert_eq!(session.generation(), 3);
        assert!(session.result_message().is_none());

        let plain = ValidationSession::new(1, "TICKET-42");
        assert_eq!(plain.derived_key(), "TICKET-42");
    }

    #[test]
    fn settle_is_absorbing() {
        let mut session = ValidationSession::new(1, "c");
        assert!(session.settle(Outcome::TimedOut));
        assert_eq!(session.state(), SessionState::TimedOut);
        assert!(!session.settle(Outcome::Valid(ValidationData::default())));
        assert_eq!(session.state(), SessionState::TimedOut);
        assert_eq!(session.result_message(), Some(TIMEOUT_MESSAGE));
        assert!(session.result_data().is_none());
    }

    #[test]
    fn success_with_details() {
        let outcome = Outcome::from_message(
            r#"{"type":"validation","valid":true,"data":{"subscriptionId":"s1","userId":"u1","expiresAt":"2025-03-01T12:00:00.000Z","remainingUses":4}}"#,
        );
        let mut session = ValidationSession::new(1, "c");
        assert!(session.settle(outcome));
        assert_eq!(session.state(), SessionState::Success);
        assert_eq!(
            session.result_message(),
            Some("✓ Valid QR Code (Subscription: s1 | User: u1 | Expires: 2025-03-01)")
        );
        assert_eq!(session.result_data().and_then(|d| d.remaining_uses), Some(4));
    }

    #[test]
    fn success_without_details() {
        let mut session = ValidationSession::new(1, "c");
        session.settle(Outcome::from_message(r#"{"valid":true}"#));
        assert_eq!(session.result_message(), Some(VALID_MESSAGE));
    }

    #[test]
    fn reason_table() {
        assert_eq!(failure_message(Some("expired")), "QR code expired");
        assert_eq!(failure_message(Some("already_used")), "QR code already used");
        assert_eq!(failure_message(Some("weird")), "Invalid: weird");
        assert_eq!(failure_message(None), "Invalid QR code");
    }

    #[test]
    fn server_message_wins_over_reason() {
        let mut session = ValidationSession::new(1, "c");
        session.settle(Outcome::from_message(
            r#"{"valid":false,"reason":"expired","message":"Ended last week"}"#,
        ));
        assert_eq!(session.state(), SessionState::Failure);
        assert_eq!(session.result_message(), Some("Ended last week"));
    }

    #[test]
    fn malformed_messages() {
        assert_eq!(Outcome::from_message("not json"), Outcome::Malformed);
        assert_eq!(Outcome::from_message(""), Outcome::Malformed);
        assert_eq!(
            Outcome::from_message("{}"),
            Outcome::Invalid {
                reason: None,
                message: None
            }
        );
    }

    #[test]
    fn numeric_ids_still_succeed() {
        let mut session = ValidationSession::new(1, r#"{"subId":42,"userId":7}"#);
        assert_eq!(session.derived_key(), "42_sub");
        let payload = r#"{"valid":true,"data":{"subscriptionId":42,"userId":7,"remainingUses":null}}"#;
        assert!(session.settle(Outcome::from_message(payload)));
        assert_eq!(session.state(), SessionState::Success);
        assert_eq!(
            session.result_message(),
            Some("✓ Valid QR Code (Subscription: 42 | User: 7)")
        );
        let data = session.result_data().unwrap();
        assert_eq!(data.subscription_id.as_deref(), Some("42"));
        assert_eq!(data.remaining_uses, None);
    }

    #[test]
    fn odd_field_types_are_ignored_and_kept_raw() {
        let outcome =
            Outcome::from_message(r#"{"valid":true,"data":{"remainingUses":"lots","extra":[1]}}"#);
        let data = match outcome {
            Outcome::Valid(data) => data,
            other => panic!("expected a valid verdict, got {other:?}"),
        };
        assert_eq!(data.remaining_uses, None);
        assert_eq!(
            serde_json::to_value(&data).unwrap(),
            serde_json::json!({"remainingUses": "lots", "extra": [1]})
        );
    }

    #[test]
    fn valid_flag_uses_truthiness() {
        assert!(matches!(Outcome::from_message(r#"{"valid":1}"#), Outcome::Valid(_)));
        assert!(matches!(
            Outcome::from_message(r#"{"valid":0,"reason":"expired"}"#),
            Outcome::Invalid { reason: Some(r), .. } if r == "expired"
        ));
    }

    #[test]
    fn unparseable_expiry_is_shown_raw() {
        assert_eq!(format_date("2025-03-01"), "2025-03-01");
        assert_eq!(format_date("next tuesday"), "next tuesday");
    }
}
