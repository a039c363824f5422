//! Signed and optionally encrypted cookie values.
//!
//! A token is the URL-safe base64 encoding of
//! `timestamp|base64(payload)|mac`, where `mac` is HMAC-SHA256 over
//! `name|timestamp|base64(payload)`. Binding the cookie name into the MAC
//! means a value issued for one cookie cannot be replayed under another.
//! When a block key is configured the JSON payload is sealed with AES-GCM
//! before it is base64-encoded.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::Sha256;

use super::CodecError;

type HmacSha256 = Hmac<Sha256>;

/// Default lifetime accepted by [`SecureCookie::decode`] (30 days).
pub const DEFAULT_MAX_AGE: i64 = 86400 * 30;

/// Default maximum token length, the practical browser cookie limit.
pub const DEFAULT_MAX_LENGTH: usize = 4096;

const NONCE_LEN: usize = 12;

#[derive(Clone)]
enum BlockCipher {
    Aes128(Aes128Gcm),
    Aes256(Aes256Gcm),
}

impl BlockCipher {
    fn new(key: &[u8]) -> Result<Self, CodecError> {
        let invalid = |_| CodecError::InvalidBlockKey(key.len());
        match key.len() {
            16 => Aes128Gcm::new_from_slice(key)
                .map(Self::Aes128)
                .map_err(invalid),
            32 => Aes256Gcm::new_from_slice(key)
                .map(Self::Aes256)
                .map_err(invalid),
            n => Err(CodecError::InvalidBlockKey(n)),
        }
    }

    /// Returns `nonce || ciphertext`.
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CodecError> {
        let (nonce, sealed) = match self {
            Self::Aes128(cipher) => {
                let nonce = Aes128Gcm::generate_nonce(&mut OsRng);
                (nonce, cipher.encrypt(&nonce, plaintext))
            }
            Self::Aes256(cipher) => {
                let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
                (nonce, cipher.encrypt(&nonce, plaintext))
            }
        };
        let sealed = sealed.map_err(|_| CodecError::Encrypt)?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        if data.len() < NONCE_LEN {
            return Err(CodecError::Decrypt);
        }
        let (nonce, sealed) = data.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce);
        match self {
            Self::Aes128(cipher) => cipher.decrypt(nonce, sealed),
            Self::Aes256(cipher) => cipher.decrypt(nonce, sealed),
        }
        .map_err(|_| CodecError::Decrypt)
    }
}

/// Encodes and decodes authenticated cookie values.
#[derive(Clone)]
pub struct SecureCookie {
    hash_key: Vec<u8>,
    block: Option<BlockCipher>,
    max_age: i64,
    max_length: usize,
}

impl SecureCookie {
    /// Create a codec from a hash key and an optional block key.
    ///
    /// The hash key authenticates values and must not be empty. A block key,
    /// when given, must be 16 bytes (AES-128) or 32 bytes (AES-256).
    pub fn new(hash_key: impl Into<Vec<u8>>, block_key: Option<&[u8]>) -> Result<Self, CodecError> {
        let hash_key = hash_key.into();
        if hash_key.is_empty() {
            return Err(CodecError::HashKeyNotSet);
        }
        let block = block_key.map(BlockCipher::new).transpose()?;

        Ok(Self {
            hash_key,
            block,
            max_age: DEFAULT_MAX_AGE,
            max_length: DEFAULT_MAX_LENGTH,
        })
    }

    /// Set the maximum age, in seconds, of values accepted by `decode`.
    ///
    /// Zero or a negative value disables the check.
    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = seconds;
        self
    }

    /// Set the maximum encoded length. Zero disables the limit.
    pub fn max_length(mut self, length: usize) -> Self {
        self.max_length = length;
        self
    }

    /// Whether values are encrypted in addition to being signed.
    pub fn is_encrypting(&self) -> bool {
        self.block.is_some()
    }

    /// Encode `value` for the cookie called `name`.
    pub fn encode<T>(&self, name: &str, value: &T) -> Result<String, CodecError>
    where
        T: Serialize + ?Sized,
    {
        self.encode_at(name, value, unix_now())
    }

    fn encode_at<T>(&self, name: &str, value: &T, timestamp: i64) -> Result<String, CodecError>
    where
        T: Serialize + ?Sized,
    {
        let mut payload = serde_json::to_vec(value).map_err(CodecError::Serialize)?;
        if let Some(block) = &self.block {
            payload = block.encrypt(&payload)?;
        }
        let payload = URL_SAFE.encode(payload);

        let signed = format!("{}|{}|{}", name, timestamp, payload);
        let mac = self.mac(signed.as_bytes())?;

        // The name is covered by the MAC but not carried in the token.
        let mut token = signed.as_bytes()[name.len() + 1..].to_vec();
        token.push(b'|');
        token.extend_from_slice(&mac);

        let encoded = URL_SAFE.encode(token);
        if self.max_length != 0 && encoded.len() > self.max_length {
            return Err(CodecError::TooLong);
        }
        Ok(encoded)
    }

    /// Decode a token previously produced by `encode` for the same `name`.
    pub fn decode<T>(&self, name: &str, token: &str) -> Result<T, CodecError>
    where
        T: DeserializeOwned,
    {
        if self.max_length != 0 && token.len() > self.max_length {
            return Err(CodecError::TooLong);
        }
        let raw = URL_SAFE.decode(token)?;

        let mut parts = raw.splitn(3, |b| *b == b'|');
        let (timestamp, payload, mac) = match (parts.next(), parts.next(), parts.next()) {
            (Some(t), Some(p), Some(m)) => (t, p, m),
            _ => return Err(CodecError::Malformed),
        };

        let mut signed = Vec::with_capacity(name.len() + timestamp.len() + payload.len() + 2);
        signed.extend_from_slice(name.as_bytes());
        signed.push(b'|');
        signed.extend_from_slice(timestamp);
        signed.push(b'|');
        signed.extend_from_slice(payload);
        self.verify(&signed, mac)?;

        let issued: i64 = std::str::from_utf8(timestamp)
            .ok()
            .and_then(|t| t.parse().ok())
            .ok_or(CodecError::Malformed)?;
        if self.max_age > 0 && issued < unix_now() - self.max_age {
            return Err(CodecError::Expired);
        }

        let mut payload = URL_SAFE.decode(payload)?;
        if let Some(block) = &self.block {
            payload = block.decrypt(&payload)?;
        }
        serde_json::from_slice(&payload).map_err(CodecError::Deserialize)
    }

    fn hmac(&self) -> Result<HmacSha256, CodecError> {
        <HmacSha256 as Mac>::new_from_slice(&self.hash_key).map_err(|_| CodecError::HashKeyNotSet)
    }

    fn mac(&self, message: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut mac = self.hmac()?;
        mac.update(message);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    fn verify(&self, message: &[u8], tag: &[u8]) -> Result<(), CodecError> {
        let mut mac = self.hmac()?;
        mac.update(message);
        mac.verify_slice(tag).map_err(|_| CodecError::InvalidMac)
    }
}

impl fmt::Debug for SecureCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureCookie")
            .field("hash_key", &"<redacted>")
            .field("encrypting", &self.is_encrypting())
            .field("max_age", &self.max_age)
            .field("max_length", &self.max_length)
            .finish()
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn signer() -> SecureCookie {
        SecureCookie::new(b"very-secret-hash-key".to_vec(), None).unwrap()
    }

    fn sealer() -> SecureCookie {
        SecureCookie::new(
            b"very-secret-hash-key".to_vec(),
            Some(b"0123456789abcdef0123456789abcdef"),
        )
        .unwrap()
    }

    #[test]
    fn test_signed_value_decodes() {
        let codec = signer();
        let token = codec.encode("session", "42").unwrap();
        let id: String = codec.decode("session", &token).unwrap();
        assert_eq!(id, "42");
    }

    #[test]
    fn test_encrypted_map_decodes() {
        let codec = sealer();
        let mut values = HashMap::new();
        values.insert("user".to_string(), serde_json::json!("alice"));

        let token = codec.encode("session", &values).unwrap();
        assert!(!token.contains("alice"));

        let decoded: HashMap<String, serde_json::Value> = codec.decode("session", &token).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_empty_hash_key_rejected() {
        let result = SecureCookie::new(Vec::new(), None);
        assert!(matches!(result, Err(CodecError::HashKeyNotSet)));
    }

    #[test]
    fn test_bad_block_key_length() {
        let result = SecureCookie::new(b"hash".to_vec(), Some(b"short"));
        assert!(matches!(result, Err(CodecError::InvalidBlockKey(5))));
    }

    #[test]
    fn test_aes128_block_key() {
        let codec = SecureCookie::new(b"hash".to_vec(), Some(b"0123456789abcdef")).unwrap();
        assert!(codec.is_encrypting());
        let token = codec.encode("s", &7u32).unwrap();
        assert_eq!(codec.decode::<u32>("s", &token).unwrap(), 7);
    }

    #[test]
    fn test_tampered_token_rejected() {
        let codec = signer();
        let token = codec.encode("session", "42").unwrap();

        let mut raw = URL_SAFE.decode(&token).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = URL_SAFE.encode(raw);

        let result: Result<String, _> = codec.decode("session", &tampered);
        assert!(matches!(result, Err(CodecError::InvalidMac)));
    }

    #[test]
    fn test_name_is_bound() {
        let codec = signer();
        let token = codec.encode("session", "42").unwrap();
        let result: Result<String, _> = codec.decode("other", &token);
        assert!(matches!(result, Err(CodecError::InvalidMac)));
    }

    #[test]
    fn test_other_key_rejected() {
        let token = signer().encode("session", "42").unwrap();
        let other = SecureCookie::new(b"another-key".to_vec(), None).unwrap();
        let result: Result<String, _> = other.decode("session", &token);
        assert!(matches!(result, Err(CodecError::InvalidMac)));
    }

    #[test]
    fn test_expired_token_rejected() {
        let codec = signer().max_age(60);
        let token = codec.encode_at("session", "42", unix_now() - 120).unwrap();
        let result: Result<String, _> = codec.decode("session", &token);
        assert!(matches!(result, Err(CodecError::Expired)));
    }

    #[test]
    fn test_zero_max_age_never_expires() {
        let codec = signer().max_age(0);
        let token = codec.encode_at("session", "42", 1).unwrap();
        let id: String = codec.decode("session", &token).unwrap();
        assert_eq!(id, "42");
    }

    #[test]
    fn test_max_length() {
        let codec = signer().max_length(32);
        let long = "x".repeat(100);
        assert!(matches!(codec.encode("s", &long), Err(CodecError::TooLong)));

        let unlimited = signer().max_length(0);
        assert!(unlimited.encode("s", &"x".repeat(10_000)).is_ok());
    }

    #[test]
    fn test_garbage_input() {
        let codec = signer();
        assert!(matches!(
            codec.decode::<String>("s", "%%%not-base64%%%"),
            Err(CodecError::Base64(_))
        ));

        let no_separators = URL_SAFE.encode(b"just-some-bytes");
        assert!(matches!(
            codec.decode::<String>("s", &no_separators),
            Err(CodecError::Malformed)
        ));
    }

    #[test]
    fn test_debug_redacts_keys() {
        let debug = format!("{:?}", sealer());
        assert!(!debug.contains("very-secret"));
        assert!(debug.contains("encrypting: true"));
    }
}
