//! Core of qrgate: QR payload classification, pre-shared-key decryption,
//! subscription tokens, and the backend record types.

pub mod cipher;
pub mod decode;
pub mod payload;
pub mod records;
pub mod token;

pub use cipher::{Cipher, CipherError, Encoding};
pub use decode::{Decoder, decode};
pub use payload::{DecodedPayload, Decryption, PayloadKind};
pub use records::{Subscription, SubscriptionPlan, User};
pub use token::{SubscriptionToken, TokenError};
