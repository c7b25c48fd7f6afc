//! Subscription tokens: the `{"subId": "...", "userId": "..."}` JSON printed
//! on member QR codes, and the identifiers derived from them.

use serde_json::Value;
use thiserror::Error;

/// Subscription id field written by the token issuer.
pub const SUB_ID_KEY: &str = "subId";
/// Long-form subscription id field, accepted when deleting.
pub const SUBSCRIPTION_ID_KEY: &str = "subscriptionId";
pub const USER_ID_KEY: &str = "userId";

/// Suffix the validation endpoint uses to tell token ids from opaque codes.
pub const VALIDATION_KEY_SUFFIX: &str = "_sub";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Invalid QR code format")]
    InvalidFormat,
    #[error("No subscription ID found in QR code")]
    MissingSubscriptionId,
}

/// Parsed subscription token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionToken {
    pub subscription_id: String,
    pub user_id: String,
}

impl SubscriptionToken {
    /// Both ids present and non-empty.
    pub fn from_value(value: &Value) -> Option<Self> {
        Some(Self {
            subscription_id: id_field(value, SUB_ID_KEY)?,
            user_id: id_field(value, USER_ID_KEY)?,
        })
    }
}

/// Read an id field as text. Only truthy scalars count: `""`, `0`, `false`
/// and `null` are absent, numbers and `true` are printed. Arrays and objects
/// never name an id.
pub fn id_field(value: &Value, key: &str) -> Option<String> {
    let field = value.get(key).filter(|v| is_truthy(v))?;
    match field {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// JavaScript truthiness of a JSON value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// The identifier sent to the validation endpoint for a scanned `code`.
///
/// Token JSON with a `subId` becomes `"<subId>_sub"`; anything else is sent
/// unchanged.
pub fn validation_key(code: &str) -> String {
    if code.trim_start().starts_with('{')
        && let Ok(value) = serde_json::from_str::<Value>(code)
        && let Some(sub_id) = id_field(&value, SUB_ID_KEY)
    {
        return format!("{sub_id}{VALIDATION_KEY_SUFFIX}");
    }
    code.to_string()
}

/// The subscription id a delete request targets: `subId`, else `subscriptionId`.
pub fn subscription_id(code: &str) -> Result<String, TokenError> {
    let value: Value = serde_json::from_str(code).map_err(|_| TokenError::InvalidFormat)?;
    id_field(&value, SUB_ID_KEY)
        .or_else(|| id_field(&value, SUBSCRIPTION_ID_KEY))
        .ok_or(TokenError::MissingSubscriptionId)
}
