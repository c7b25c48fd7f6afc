//! Classified QR payloads.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// Semantic type of a scanned code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    Url,
    Email,
    Phone,
    Sms,
    Wifi,
    Json,
    Subscription,
    Text,
    Encrypted,
}

impl PayloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Sms => "sms",
            Self::Wifi => "wifi",
            Self::Json => "json",
            Self::Subscription => "subscription",
            Self::Text => "text",
            Self::Encrypted => "encrypted",
        }
    }

    /// Heading shown above the payload in a result card.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Subscription => "🎫 Subscription",
            Self::Url => "🔗 URL",
            Self::Email => "📧 Email",
            Self::Phone => "📞 Phone",
            Self::Sms => "💬 SMS",
            Self::Wifi => "📶 WiFi Network",
            Self::Json => "📄 JSON Data",
            Self::Text => "📝 Text",
            Self::Encrypted => "🔒 Encrypted",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the decryption step that ran (or didn't) before classification.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Decryption {
    /// No cipher configured, or the input did not look like ciphertext.
    #[default]
    NotAttempted,
    /// The input decrypted; classification ran on the plaintext.
    Decrypted,
    /// The input looked like ciphertext but did not decrypt.
    Failed(String),
}

/// A scanned code after classification.
///
/// `raw` is always the scanned string, even when classification ran on
/// decrypted plaintext.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedPayload {
    pub kind: PayloadKind,
    pub raw: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Value>,
    pub display: String,
    #[serde(flatten)]
    pub decryption: Decryption,
}

impl DecodedPayload {
    pub fn was_decrypted(&self) -> bool {
        self.decryption == Decryption::Decrypted
    }

    pub fn decryption_error(&self) -> Option<&str> {
        match &self.decryption {
            Decryption::Failed(msg) => Some(msg),
            _ => None,
        }
    }

    /// String value of a top-level field, if present.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.as_ref()?.get(key)?.as_str()
    }

    /// `"<label>\n<display>"`, the two-part rendering used by result cards.
    pub fn summary(&self) -> String {
        format!("{}\n{}", self.kind.label(), self.display)
    }

    /// Delete is only offered for subscription tokens.
    pub fn is_subscription(&self) -> bool {
        self.kind == PayloadKind::Subscription
    }
}

impl Serialize for Decryption {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("wasDecrypted", &(*self == Decryption::Decrypted))?;
        if let Decryption::Failed(msg) = self {
            map.serialize_entry("decryptionError", msg)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(decryption: Decryption) -> DecodedPayload {
        DecodedPayload {
            kind: PayloadKind::Text,
            raw: "hello".into(),
            fields: None,
            display: "hello".into(),
            decryption,
        }
    }

    #[test]
    fn decryption_flags_are_exclusive() {
        let plain = payload(Decryption::NotAttempted);
        assert!(!plain.was_decrypted());
        assert!(plain.decryption_error().is_none());

        let ok = payload(Decryption::Decrypted);
        assert!(ok.was_decrypted());
        assert!(ok.decryption_error().is_none());

        let failed = payload(Decryption::Failed("bad tag".into()));
        assert!(!failed.was_decrypted());
        assert_eq!(failed.decryption_error(), Some("bad tag"));
    }

    #[test]
    fn serializes_with_flat_flags() {
        let value = serde_json::to_value(payload(Decryption::Failed("bad tag".into()))).unwrap();
        assert_eq!(
            value,
            json!({
                "kind": "text",
                "raw": "hello",
                "display": "hello",
                "wasDecrypted": false,
                "decryptionError": "bad tag",
            })
        );
    }

    #[test]
    fn summary_prefixes_label() {
        let mut p = payload(Decryption::NotAttempted);
        p.kind = PayloadKind::Wifi;
        p.display = "WiFi: Home".into();
        assert_eq!(p.summary(), "📶 WiFi Network\nWiFi: Home");
    }
}
