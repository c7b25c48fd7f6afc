//! Classification of raw scanned text into typed payloads.
//!
//! Rules run in a fixed order and the first match wins:
//!
//! 1. Decryption, when a [`Cipher`] is configured and the input looks like an
//!    encoded envelope. Later rules run on the plaintext if it opens, and on
//!    the original text if it doesn't.
//! 2. JSON object/array. Subscription tokens are recognised before generic JSON.
//! 3. `http://` / `https://` URL
//! 4. `mailto:`
//! 5. `tel:`
//! 6. `sms:` / `smsto:`
//! 7. `WIFI:`
//! 8. Fallback to text (or `encrypted` when decryption failed).

use serde_json::{Map, Value, json};
use tracing::debug;
use url::Url;

use crate::cipher::{Cipher, looks_encrypted};
use crate::payload::{DecodedPayload, Decryption, PayloadKind};
use crate::token::SubscriptionToken;

/// Stateless classifier. Holds only the optional pre-shared-key cipher.
#[derive(Debug, Default)]
pub struct Decoder {
    cipher: Option<Cipher>,
}

/// A rule match, before the decryption status and raw text are attached.
struct Classified {
    kind: PayloadKind,
    fields: Option<Value>,
    display: String,
}

impl Decoder {
    pub fn new(cipher: Option<Cipher>) -> Self {
        Self { cipher }
    }

    /// A decoder that attempts decryption with `cipher`.
    pub fn with_cipher(cipher: Cipher) -> Self {
        Self::new(Some(cipher))
    }

    /// Classify `raw`. Never fails: unrecognised input is `text`.
    pub fn decode(&self, raw: &str) -> DecodedPayload {
        let mut decryption = Decryption::NotAttempted;
        let mut plaintext = None;

        if let Some(cipher) = &self.cipher
            && looks_encrypted(raw)
        {
            match cipher.open(raw) {
                Ok(text) => {
                    decryption = Decryption::Decrypted;
                    plaintext = Some(text);
                }
                Err(e) => {
                    debug!(error = %e, "payload looked encrypted but did not open");
                    decryption = Decryption::Failed(e.to_string());
                }
            }
        }

        let working = plaintext.as_deref().unwrap_or(raw);
        let classified = classify(working).unwrap_or_else(|| match &decryption {
            Decryption::Decrypted => Classified {
                kind: PayloadKind::Text,
                fields: None,
                display: working.to_string(),
            },
            Decryption::Failed(_) => Classified {
                kind: PayloadKind::Encrypted,
                fields: None,
                display: raw.to_string(),
            },
            Decryption::NotAttempted => Classified {
                kind: PayloadKind::Text,
                fields: None,
                display: raw.to_string(),
            },
        });

        debug!(kind = %classified.kind, decryption = ?decryption, "classified scanned code");

        DecodedPayload {
            kind: classified.kind,
            raw: raw.to_string(),
            fields: classified.fields,
            display: classified.display,
            decryption,
        }
    }
}

/// Classify `raw` without a decryption step.
pub fn decode(raw: &str) -> DecodedPayload {
    Decoder::default().decode(raw)
}

fn classify(data: &str) -> Option<Classified> {
    classify_json(data)
        .or_else(|| classify_url(data))
        .or_else(|| classify_prefixed(data))
        .or_else(|| classify_wifi(data))
}

fn classify_json(data: &str) -> Option<Classified> {
    let trimmed = data.trim();
    let bracketed = (trimmed.starts_with('{') && trimmed.ends_with('}'))
        || (trimmed.starts_with('[') && trimmed.ends_with(']'));
    if !bracketed {
        return None;
    }
    let value: Value = serde_json::from_str(trimmed).ok()?;

    if let Some(token) = SubscriptionToken::from_value(&value) {
        let display = format!(
            "Subscription ID: {}\nUser ID: {}",
            token.subscription_id, token.user_id
        );
        return Some(Classified {
            kind: PayloadKind::Subscription,
            fields: Some(json!({
                "subscriptionId": token.subscription_id,
                "userId": token.user_id,
            })),
            display,
        });
    }

    let display = serde_json::to_string_pretty(&value).ok()?;
    Some(Classified {
        kind: PayloadKind::Json,
        fields: Some(value),
        display,
    })
}

fn classify_url(data: &str) -> Option<Classified> {
    if !(data.starts_with("http://") || data.starts_with("https://")) {
        return None;
    }
    let url = Url::parse(data).ok()?;

    // Same shape as the browser `URL` accessors.
    let prefixed = |sigil: char, part: Option<&str>| match part {
        Some(p) if !p.is_empty() => format!("{sigil}{p}"),
        _ => String::new(),
    };
    let fields = json!({
        "protocol": format!("{}:", url.scheme()),
        "hostname": url.host_str().unwrap_or_default(),
        "pathname": url.path(),
        "search": prefixed('?', url.query()),
        "hash": prefixed('#', url.fragment()),
    });

    Some(Classified {
        kind: PayloadKind::Url,
        fields: Some(fields),
        display: data.to_string(),
    })
}

fn classify_prefixed(data: &str) -> Option<Classified> {
    let (kind, key, rest) = if let Some(rest) = data.strip_prefix("mailto:") {
        (PayloadKind::Email, "email", rest)
    } else if let Some(rest) = data.strip_prefix("tel:") {
        (PayloadKind::Phone, "phone", rest)
    } else if let Some(rest) = data
        .strip_prefix("smsto:")
        .or_else(|| data.strip_prefix("sms:"))
    {
        (PayloadKind::Sms, "phone", rest)
    } else {
        return None;
    };

    let mut fields = Map::new();
    fields.insert(key.to_string(), Value::String(rest.to_string()));
    Some(Classified {
        kind,
        fields: Some(Value::Object(fields)),
        display: rest.to_string(),
    })
}

// ── WiFi ──

fn classify_wifi(data: &str) -> Option<Classified> {
    let body = data.strip_prefix("WIFI:")?;

    let mut fields = Map::new();
    for segment in split_unescaped(body, ';') {
        let Some((key, value)) = split_once_unescaped(segment, ':') else {
            continue;
        };
        let (key, value) = (unescape(key), unescape(value));
        if key.is_empty() || value.is_empty() {
            continue;
        }
        let name = match key.as_str() {
            "T" => "security".to_string(),
            "S" => "ssid".to_string(),
            "P" => "password".to_string(),
            "H" => "hidden".to_string(),
            _ => key,
        };
        fields.insert(name, Value::String(value));
    }

    let ssid = fields
        .get("ssid")
        .and_then(Value::as_str)
        .unwrap_or("Unknown");
    let display = format!("WiFi: {ssid}");

    Some(Classified {
        kind: PayloadKind::Wifi,
        fields: Some(Value::Object(fields)),
        display,
    })
}

/// Split on `sep` where it is not preceded by a backslash. Escapes are kept.
fn split_unescaped(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == sep {
            parts.push(&s[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&s[start..]);
    parts
}

fn split_once_unescaped(s: &str, sep: char) -> Option<(&str, &str)> {
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == sep {
            return Some((&s[..i], &s[i + c.len_utf8()..]));
        }
    }
    None
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) => out.push(next),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}
