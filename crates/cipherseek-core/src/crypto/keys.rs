#![forbid(unsafe_code)]

use std::fmt;

use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroizing;

/// Size of a content key in bytes (256-bit).
pub const KEY_SIZE: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Key is not valid hex: {0}")]
    InvalidHex(String),
}

/// A 256-bit symmetric key for chunk encryption.
///
/// Key storage and distribution belong to the caller; this type only keeps
/// the bytes zeroized on drop and out of `Debug` output.
#[derive(Clone)]
pub struct ContentKey {
    bytes: Zeroizing<[u8; KEY_SIZE]>,
}

impl ContentKey {
    /// Generate a new random key using a cryptographically secure RNG.
    pub fn random() -> Self {
        let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
        rand::rng().fill_bytes(&mut *bytes);
        Self { bytes }
    }

    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
        }
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; KEY_SIZE] = slice.try_into().map_err(|_| KeyError::InvalidLength {
            expected: KEY_SIZE,
            actual: slice.len(),
        })?;
        Ok(Self::from_bytes(bytes))
    }

    /// Parse a hex-encoded key. Surrounding whitespace is ignored.
    pub fn from_hex(encoded: &str) -> Result<Self, KeyError> {
        let decoded = Zeroizing::new(
            hex::decode(encoded.trim()).map_err(|e| KeyError::InvalidHex(e.to_string()))?,
        );
        Self::from_slice(&decoded)
    }

    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(*self.bytes))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_keys_differ() {
        assert_ne!(ContentKey::random().as_bytes(), ContentKey::random().as_bytes());
    }

    #[test]
    fn test_hex_roundtrip() {
        let key = ContentKey::random();
        let parsed = ContentKey::from_hex(&key.to_hex()).unwrap();
        assert_eq!(key.as_bytes(), parsed.as_bytes());
    }

    #[test]
    fn test_hex_with_newline() {
        let hex = format!("{}\n", "ab".repeat(KEY_SIZE));
        let key = ContentKey::from_hex(&hex).unwrap();
        assert_eq!(key.as_bytes(), &[0xAB; KEY_SIZE]);
    }

    #[test]
    fn test_wrong_length() {
        assert_eq!(
            ContentKey::from_slice(&[0u8; 16]).unwrap_err(),
            KeyError::InvalidLength {
                expected: KEY_SIZE,
                actual: 16
            }
        );
    }

    #[test]
    fn test_invalid_hex() {
        assert!(matches!(
            ContentKey::from_hex("zz"),
            Err(KeyError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_debug_redacts() {
        let key = ContentKey::from_bytes([0x42; KEY_SIZE]);
        let debug = format!("{key:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("42"));
    }
}
