//! Pre-shared-key decryption for encrypted QR payloads.
//!
//! Encrypted codes carry an AES-256-GCM envelope, `nonce (12) || ciphertext || tag (16)`,
//! printed as hex or base64 (standard or URL-safe, padding optional).
//!
//! The key is process-wide configuration: build one [`Cipher`] at start-up and
//! hand it to the [`Decoder`](crate::Decoder).

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::digest::{SHA256, digest};
use ring::rand::{SecureRandom, SystemRandom};
use thiserror::Error;

/// Inputs at or below this many characters are never treated as ciphertext.
pub const MIN_CIPHERTEXT_LEN: usize = 40;

const TAG_LEN: usize = 16;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CipherError {
    #[error("payload is neither hex nor base64")]
    Encoding,
    #[error("payload too short: {0} bytes")]
    TooShort(usize),
    #[error("decryption failed: authentication tag mismatch")]
    Authentication,
    #[error("decrypted payload is not valid UTF-8")]
    NotUtf8,
    #[error("decrypted payload is empty")]
    Empty,
    #[error("system random source unavailable")]
    Random,
    #[error("invalid key: expected 32 bytes, got {0}")]
    InvalidKey(usize),
}

/// Text encoding of a sealed envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Base64,
    Hex,
}

/// AES-256-GCM cipher bound to the pre-shared key.
pub struct Cipher {
    key: LessSafeKey,
}

impl fmt::Debug for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cipher").finish_non_exhaustive()
    }
}

impl Cipher {
    /// Derive the key as SHA-256 of a shared passphrase.
    pub fn from_passphrase(passphrase: &str) -> Result<Self, CipherError> {
        let hash = digest(&SHA256, passphrase.as_bytes());
        Self::from_key_bytes(hash.as_ref())
    }

    /// Use 32 raw key bytes.
    pub fn from_key_bytes(bytes: &[u8]) -> Result<Self, CipherError> {
        let unbound = UnboundKey::new(&AES_256_GCM, bytes)
            .map_err(|_| CipherError::InvalidKey(bytes.len()))?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
        })
    }

    /// Decrypt a textual envelope, returning the UTF-8 plaintext.
    ///
    /// Hex-looking input is tried as hex first, then as base64, since every
    /// hex string is also in the base64 alphabet. The first error is reported.
    pub fn open(&self, text: &str) -> Result<String, CipherError> {
        let text = text.trim();
        let mut first_err = None;
        for envelope in candidate_envelopes(text) {
            match envelope.and_then(|bytes| self.open_bytes(bytes)) {
                Ok(plain) => return Ok(plain),
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }
        Err(first_err.unwrap_or(CipherError::Encoding))
    }

    fn open_bytes(&self, mut envelope: Vec<u8>) -> Result<String, CipherError> {
        if envelope.len() < NONCE_LEN + TAG_LEN {
            return Err(CipherError::TooShort(envelope.len()));
        }
        let mut sealed = envelope.split_off(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(&envelope)
            .map_err(|_| CipherError::TooShort(envelope.len()))?;
        let plain = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut sealed)
            .map_err(|_| CipherError::Authentication)?;
        let text = std::str::from_utf8(plain).map_err(|_| CipherError::NotUtf8)?;
        if text.is_empty() {
            return Err(CipherError::Empty);
        }
        Ok(text.to_string())
    }

    /// Encrypt `plaintext` under a fresh random nonce.
    pub fn seal(&self, plaintext: &str, encoding: Encoding) -> Result<String, CipherError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        SystemRandom::new()
            .fill(&mut nonce_bytes)
            .map_err(|_| CipherError::Random)?;

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut in_out,
            )
            .map_err(|_| CipherError::Authentication)?;

        let mut envelope = Vec::with_capacity(NONCE_LEN + in_out.len());
        envelope.extend_from_slice(&nonce_bytes);
        envelope.extend_from_slice(&in_out);

        Ok(match encoding {
            Encoding::Base64 => STANDARD.encode(envelope),
            Encoding::Hex => hex::encode(envelope),
        })
    }
}

/// Whether `s` is long enough and shaped like an encoded envelope.
pub fn looks_encrypted(s: &str) -> bool {
    s.len() > MIN_CIPHERTEXT_LEN && (is_hex(s) || is_base64(s))
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit())
}

fn is_base64(s: &str) -> bool {
    let body = s.trim_end_matches('=');
    let padding = s.len() - body.len();
    !body.is_empty()
        && padding <= 2
        && body
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'-' | b'_'))
}

fn candidate_envelopes(text: &str) -> Vec<Result<Vec<u8>, CipherError>> {
    let mut out = Vec::with_capacity(2);
    if is_hex(text) && text.len() % 2 == 0 {
        out.push(hex::decode(text).map_err(|_| CipherError::Encoding));
    }
    if is_base64(text) {
        let body = text.trim_end_matches('=');
        let decoded = if body.contains(['-', '_']) {
            URL_SAFE_NO_PAD.decode(body)
        } else {
            STANDARD_NO_PAD.decode(body)
        };
        out.push(decoded.map_err(|_| CipherError::Encoding));
    }
    if out.is_empty() {
        out.push(Err(CipherError::Encoding));
    }
    out
}
