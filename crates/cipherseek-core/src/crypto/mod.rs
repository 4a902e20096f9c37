//! AEAD cipher instances used to seal and open chunks.
//!
//! The chunk layer never sees key material. It receives an object bound to a
//! single symmetric key that can `seal` and `open` with a caller-supplied
//! nonce and associated data.

pub mod keys;

use std::fmt;
use std::sync::Arc;

use aead::{
    Aead, AeadCore, KeyInit, Payload,
    generic_array::{GenericArray, typenum::Unsigned},
};
use aes_gcm::Aes256Gcm;
use chacha20poly1305::ChaCha20Poly1305;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use keys::ContentKey;

/// Errors reported by an [`AeadCipher`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    /// Sealing failed inside the primitive.
    #[error("AEAD seal failed: {0}")]
    Seal(String),

    /// Tag verification failed. Tampering and a wrong key are indistinguishable.
    #[error("AEAD open failed: authentication tag mismatch")]
    Open,

    /// The caller passed a nonce of the wrong length.
    #[error("Invalid nonce length: expected {expected}, got {actual}")]
    NonceLength { expected: usize, actual: usize },
}

/// An AEAD cipher bound to one fixed key.
///
/// `seal` returns `ciphertext ‖ tag`; `open` takes the same layout back.
/// Implementations must be deterministic for `open` and must not keep state
/// between calls.
pub trait AeadCipher {
    /// Human-readable algorithm name.
    fn algorithm(&self) -> &'static str;

    /// Nonce length in bytes.
    fn nonce_size(&self) -> usize;

    /// Authentication tag length in bytes.
    fn tag_size(&self) -> usize;

    fn seal(&self, nonce: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CipherError>;

    fn open(
        &self,
        nonce: &[u8],
        ciphertext_and_tag: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, CipherError>;
}

fn seal_with<A: Aead>(
    cipher: &A,
    nonce: &[u8],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CipherError> {
    let nonce = nonce_from_slice::<A>(nonce)?;
    cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| CipherError::Seal(e.to_string()))
}

fn open_with<A: Aead>(
    cipher: &A,
    nonce: &[u8],
    ciphertext_and_tag: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CipherError> {
    let nonce = nonce_from_slice::<A>(nonce)?;
    cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext_and_tag,
                aad,
            },
        )
        .map_err(|_| CipherError::Open)
}

// `GenericArray::from_slice` panics on a length mismatch, so check first.
fn nonce_from_slice<A: AeadCore>(nonce: &[u8]) -> Result<&aead::Nonce<A>, CipherError> {
    let expected = <A::NonceSize as Unsigned>::USIZE;
    if nonce.len() != expected {
        return Err(CipherError::NonceLength {
            expected,
            actual: nonce.len(),
        });
    }
    Ok(GenericArray::from_slice(nonce))
}

macro_rules! impl_aead_cipher {
    ($ty:ty, $name:literal) => {
        impl AeadCipher for $ty {
            fn algorithm(&self) -> &'static str {
                $name
            }

            fn nonce_size(&self) -> usize {
                <<$ty as AeadCore>::NonceSize as Unsigned>::USIZE
            }

            fn tag_size(&self) -> usize {
                <<$ty as AeadCore>::TagSize as Unsigned>::USIZE
            }

            fn seal(
                &self,
                nonce: &[u8],
                plaintext: &[u8],
                aad: &[u8],
            ) -> Result<Vec<u8>, CipherError> {
                seal_with(self, nonce, plaintext, aad)
            }

            fn open(
                &self,
                nonce: &[u8],
                ciphertext_and_tag: &[u8],
                aad: &[u8],
            ) -> Result<Vec<u8>, CipherError> {
                open_with(self, nonce, ciphertext_and_tag, aad)
            }
        }
    };
}

impl_aead_cipher!(Aes256Gcm, "AES-256-GCM");
impl_aead_cipher!(ChaCha20Poly1305, "ChaCha20-Poly1305");

macro_rules! forward_aead_cipher {
    ($($wrapper:ty),+ $(,)?) => {
        $(
            impl<T: AeadCipher + ?Sized> AeadCipher for $wrapper {
                fn algorithm(&self) -> &'static str {
                    (**self).algorithm()
                }

                fn nonce_size(&self) -> usize {
                    (**self).nonce_size()
                }

                fn tag_size(&self) -> usize {
                    (**self).tag_size()
                }

                fn seal(
                    &self,
                    nonce: &[u8],
                    plaintext: &[u8],
                    aad: &[u8],
                ) -> Result<Vec<u8>, CipherError> {
                    (**self).seal(nonce, plaintext, aad)
                }

                fn open(
                    &self,
                    nonce: &[u8],
                    ciphertext_and_tag: &[u8],
                    aad: &[u8],
                ) -> Result<Vec<u8>, CipherError> {
                    (**self).open(nonce, ciphertext_and_tag, aad)
                }
            }
        )+
    };
}

forward_aead_cipher!(&T, Box<T>, Arc<T>);

/// Supported AEAD algorithms, selectable at runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CipherKind {
    #[default]
    #[serde(rename = "aes-256-gcm", alias = "aes-gcm")]
    Aes256Gcm,
    #[serde(rename = "chacha20-poly1305", alias = "chacha20")]
    ChaCha20Poly1305,
}

impl CipherKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CipherKind::Aes256Gcm => "aes-256-gcm",
            CipherKind::ChaCha20Poly1305 => "chacha20-poly1305",
        }
    }

    /// Build a cipher instance bound to `key`.
    pub fn build(self, key: &ContentKey) -> CipherSuite {
        match self {
            CipherKind::Aes256Gcm => {
                CipherSuite::Aes256Gcm(Box::new(Aes256Gcm::new(key.as_bytes().into())))
            }
            CipherKind::ChaCha20Poly1305 => CipherSuite::ChaCha20Poly1305(Box::new(
                ChaCha20Poly1305::new(key.as_bytes().into()),
            )),
        }
    }
}

impl fmt::Display for CipherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CipherKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aes-256-gcm" | "aes-gcm" => Ok(CipherKind::Aes256Gcm),
            "chacha20-poly1305" | "chacha20" => Ok(CipherKind::ChaCha20Poly1305),
            other => Err(format!("unknown cipher '{other}'")),
        }
    }
}

/// A cipher chosen at runtime from a [`CipherKind`].
#[derive(Clone)]
pub enum CipherSuite {
    Aes256Gcm(Box<Aes256Gcm>),
    ChaCha20Poly1305(Box<ChaCha20Poly1305>),
}

impl CipherSuite {
    pub fn kind(&self) -> CipherKind {
        match self {
            CipherSuite::Aes256Gcm(_) => CipherKind::Aes256Gcm,
            CipherSuite::ChaCha20Poly1305(_) => CipherKind::ChaCha20Poly1305,
        }
    }
}

impl fmt::Debug for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherSuite")
            .field("algorithm", &self.algorithm())
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl AeadCipher for CipherSuite {
    fn algorithm(&self) -> &'static str {
        match self {
            CipherSuite::Aes256Gcm(c) => c.algorithm(),
            CipherSuite::ChaCha20Poly1305(c) => c.algorithm(),
        }
    }

    fn nonce_size(&self) -> usize {
        match self {
            CipherSuite::Aes256Gcm(c) => c.nonce_size(),
            CipherSuite::ChaCha20Poly1305(c) => c.nonce_size(),
        }
    }

    fn tag_size(&self) -> usize {
        match self {
            CipherSuite::Aes256Gcm(c) => c.tag_size(),
            CipherSuite::ChaCha20Poly1305(c) => c.tag_size(),
        }
    }

    fn seal(&self, nonce: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CipherError> {
        match self {
            CipherSuite::Aes256Gcm(c) => c.seal(nonce, plaintext, aad),
            CipherSuite::ChaCha20Poly1305(c) => c.seal(nonce, plaintext, aad),
        }
    }

    fn open(
        &self,
        nonce: &[u8],
        ciphertext_and_tag: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, CipherError> {
        match self {
            CipherSuite::Aes256Gcm(c) => c.open(nonce, ciphertext_and_tag, aad),
            CipherSuite::ChaCha20Poly1305(c) => c.open(nonce, ciphertext_and_tag, aad),
        }
    }
}
