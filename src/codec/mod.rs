//! Cookie value codecs with key rotation.
//!
//! Several [`SecureCookie`] codecs can be configured at once. Encoding always
//! uses the first (primary) codec; decoding tries each codec in order, so a
//! retired key keeps validating existing cookies until it is removed.

mod secure;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use secure::{SecureCookie, DEFAULT_MAX_AGE, DEFAULT_MAX_LENGTH};

/// Errors produced while encoding or decoding cookie values.
#[derive(Error, Debug)]
pub enum CodecError {
    /// No codec was supplied.
    #[error("no codecs configured")]
    NoCodecs,

    /// The hash key is empty.
    #[error("hash key is not set")]
    HashKeyNotSet,

    /// The block key has an unsupported length.
    #[error("block key must be 16 or 32 bytes, got {0}")]
    InvalidBlockKey(usize),

    #[error("failed to serialize value: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to deserialize value: {0}")]
    Deserialize(#[source] serde_json::Error),

    #[error("failed to encrypt value")]
    Encrypt,

    #[error("failed to decrypt value")]
    Decrypt,

    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The token does not have the `timestamp|value|mac` layout.
    #[error("malformed value")]
    Malformed,

    /// Signature mismatch: tampered, or signed with an unknown key.
    #[error("the value is not valid")]
    InvalidMac,

    /// The token is older than the codec's max age.
    #[error("the value has expired")]
    Expired,

    /// The token exceeds the codec's max length.
    #[error("the value is too long")]
    TooLong,

    /// Every configured codec rejected the token.
    #[error("all codecs failed: {}", join_errors(.0))]
    Multi(Vec<CodecError>),
}

fn join_errors(errors: &[CodecError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A hash key and optional block key, as configured for one codec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    /// Key used to authenticate values with HMAC-SHA256.
    pub hash_key: Vec<u8>,
    /// Optional AES key (16 or 32 bytes) used to encrypt values.
    #[serde(default)]
    pub block_key: Option<Vec<u8>>,
}

impl KeyPair {
    /// A pair that signs but does not encrypt.
    pub fn signing(hash_key: impl Into<Vec<u8>>) -> Self {
        Self {
            hash_key: hash_key.into(),
            block_key: None,
        }
    }

    /// A pair that signs and encrypts.
    pub fn encrypting(hash_key: impl Into<Vec<u8>>, block_key: impl Into<Vec<u8>>) -> Self {
        Self {
            hash_key: hash_key.into(),
            block_key: Some(block_key.into()),
        }
    }
}

/// Build one codec per key pair, in order.
pub fn codecs_from_pairs(pairs: &[KeyPair]) -> Result<Vec<SecureCookie>, CodecError> {
    if pairs.is_empty() {
        return Err(CodecError::NoCodecs);
    }
    pairs
        .iter()
        .map(|pair| SecureCookie::new(pair.hash_key.clone(), pair.block_key.as_deref()))
        .collect()
}

/// Encode `value` with the primary codec.
pub fn encode_multi<T>(name: &str, value: &T, codecs: &[SecureCookie]) -> Result<String, CodecError>
where
    T: Serialize + ?Sized,
{
    codecs
        .first()
        .ok_or(CodecError::NoCodecs)?
        .encode(name, value)
}

/// Decode `token` with the first codec that accepts it.
pub fn decode_multi<T>(name: &str, token: &str, codecs: &[SecureCookie]) -> Result<T, CodecError>
where
    T: DeserializeOwned,
{
    if codecs.is_empty() {
        return Err(CodecError::NoCodecs);
    }

    let mut errors = Vec::with_capacity(codecs.len());
    for codec in codecs {
        match codec.decode(name, token) {
            Ok(value) => return Ok(value),
            Err(e) => errors.push(e),
        }
    }

    if errors.len() == 1 {
        Err(errors.remove(0))
    } else {
        Err(CodecError::Multi(errors))
    }
}
