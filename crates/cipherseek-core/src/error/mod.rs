//! Error types for the cipherseek crate
//!
//! All chunk, stream and transform operations report failures through
//! [`StreamError`]. Integrity failures are kept distinct from end-of-stream:
//! a short read is never an error, and a failed authentication is never
//! reported as a short read.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use crate::crypto::CipherError;

/// Context for stream operations, providing debugging information.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamContext {
    /// Path to the encrypted container (if known)
    pub path: Option<PathBuf>,
    /// Chunk being processed
    pub chunk_index: Option<u64>,
    /// Operation being performed
    pub operation: Option<&'static str>,
}

impl StreamContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_chunk(mut self, chunk_index: u64) -> Self {
        self.chunk_index = Some(chunk_index);
        self
    }

    #[must_use]
    pub fn with_operation(mut self, operation: &'static str) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Returns true when no field is set.
    pub fn is_empty(&self) -> bool {
        self.path.is_none() && self.chunk_index.is_none() && self.operation.is_none()
    }

    /// Fill unset fields from `other`, keeping the fields already present.
    #[must_use]
    pub fn merged_with(mut self, other: &StreamContext) -> Self {
        if self.path.is_none() {
            self.path.clone_from(&other.path);
        }
        if self.chunk_index.is_none() {
            self.chunk_index = other.chunk_index;
        }
        if self.operation.is_none() {
            self.operation = other.operation;
        }
        self
    }
}

impl fmt::Display for StreamContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();

        if let Some(op) = self.operation {
            parts.push(op.to_string());
        }
        if let Some(ref path) = self.path {
            parts.push(format!("at {:?}", path.display()));
        }
        if let Some(chunk) = self.chunk_index {
            parts.push(format!("chunk {chunk}"));
        }

        if parts.is_empty() {
            write!(f, "(no context)")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

/// Errors raised by chunk encoding, random-access reads and batch transforms.
///
/// # Security Classification
///
/// Variants marked `[INTEGRITY VIOLATION]` mean the ciphertext cannot be
/// trusted: it was truncated, tampered with, or sealed under another key.
/// They must never be downgraded to an empty read.
#[derive(Error, Debug)]
pub enum StreamError {
    /// IO error on the underlying storage
    #[error("IO error during {context}: {source}")]
    Io {
        #[source]
        source: io::Error,
        context: StreamContext,
    },

    /// A chunk is shorter than its nonce and tag framing.
    ///
    /// **[INTEGRITY VIOLATION]** Indicates truncation or corruption.
    #[error(
        "[INTEGRITY VIOLATION] Malformed chunk for {context}: expected at least {minimum} bytes, got {actual}"
    )]
    MalformedChunk {
        actual: usize,
        minimum: usize,
        context: StreamContext,
    },

    /// AEAD tag verification failed.
    ///
    /// **[INTEGRITY VIOLATION]** The chunk was tampered with, moved, or the key is wrong.
    #[error(
        "[INTEGRITY VIOLATION] Authentication failed for {context}: invalid tag - possible tampering or wrong key"
    )]
    Authentication { context: StreamContext },

    /// The cipher failed while sealing a chunk.
    #[error("Chunk encryption failed for {context}: {reason}")]
    Encryption {
        reason: String,
        context: StreamContext,
    },

    /// A plaintext unit handed to the codec exceeds the chunk capacity.
    #[error("Plaintext chunk too large: {actual} bytes exceeds capacity of {maximum}")]
    ChunkTooLarge { actual: usize, maximum: usize },

    /// Seek or read target lies past the end of the decrypted stream.
    #[error("Position {requested} is out of range for decrypted size {size}")]
    OutOfRange { requested: u64, size: u64 },

    /// The container length cannot be split into valid chunks.
    ///
    /// **[INTEGRITY VIOLATION]** Usually a truncated or foreign file.
    #[error(
        "[INTEGRITY VIOLATION] Malformed container for {context}: {reason} (encrypted size {encrypted_size})"
    )]
    MalformedFile {
        encrypted_size: u64,
        reason: String,
        context: StreamContext,
    },

    /// The chunk geometry is unusable.
    #[error("Invalid chunk layout: {reason}")]
    InvalidLayout { reason: String },
}

impl From<io::Error> for StreamError {
    fn from(source: io::Error) -> Self {
        StreamError::Io {
            source,
            context: StreamContext::new(),
        }
    }
}

impl StreamError {
    /// Create an IO error with context
    #[must_use]
    pub fn io_with_context(source: io::Error, context: StreamContext) -> Self {
        StreamError::Io { source, context }
    }

    /// Add context to an error, keeping any fields it already carries.
    #[must_use]
    pub fn with_context(self, context: &StreamContext) -> Self {
        match self {
            StreamError::Io { source, context: own } => StreamError::Io {
                source,
                context: own.merged_with(context),
            },
            StreamError::MalformedChunk {
                actual,
                minimum,
                context: own,
            } => StreamError::MalformedChunk {
                actual,
                minimum,
                context: own.merged_with(context),
            },
            StreamError::Authentication { context: own } => StreamError::Authentication {
                context: own.merged_with(context),
            },
            StreamError::Encryption {
                reason,
                context: own,
            } => StreamError::Encryption {
                reason,
                context: own.merged_with(context),
            },
            StreamError::MalformedFile {
                encrypted_size,
                reason,
                context: own,
            } => StreamError::MalformedFile {
                encrypted_size,
                reason,
                context: own.merged_with(context),
            },
            other @ (StreamError::ChunkTooLarge { .. }
            | StreamError::OutOfRange { .. }
            | StreamError::InvalidLayout { .. }) => other,
        }
    }

    /// Whether this error means the ciphertext itself cannot be trusted.
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            StreamError::Authentication { .. }
                | StreamError::MalformedChunk { .. }
                | StreamError::MalformedFile { .. }
        )
    }

    /// The context attached to this error, if the variant carries one.
    pub fn context(&self) -> Option<&StreamContext> {
        match self {
            StreamError::Io { context, .. }
            | StreamError::MalformedChunk { context, .. }
            | StreamError::Authentication { context }
            | StreamError::Encryption { context, .. }
            | StreamError::MalformedFile { context, .. } => Some(context),
            StreamError::ChunkTooLarge { .. }
            | StreamError::OutOfRange { .. }
            | StreamError::InvalidLayout { .. } => None,
        }
    }
}

impl From<StreamError> for io::Error {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::Io { source, .. } => source,
            StreamError::OutOfRange { .. } | StreamError::ChunkTooLarge { .. } => {
                io::Error::new(io::ErrorKind::InvalidInput, err)
            }
            other if other.is_integrity_violation() => {
                io::Error::new(io::ErrorKind::InvalidData, other)
            }
            other => io::Error::other(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_display_empty() {
        assert_eq!(StreamContext::new().to_string(), "(no context)");
    }

    #[test]
    fn test_context_display_combined() {
        let context = StreamContext::new()
            .with_operation("read_chunk")
            .with_path("/data/movie.enc")
            .with_chunk(7);
        let display = context.to_string();
        assert!(display.starts_with("read_chunk"), "got: {display}");
        assert!(display.contains("movie.enc"), "got: {display}");
        assert!(display.contains("chunk 7"), "got: {display}");
    }

    #[test]
    fn test_with_context_keeps_existing_fields() {
        let err = StreamError::Authentication {
            context: StreamContext::new().with_chunk(3),
        };
        let err = err.with_context(
            &StreamContext::new()
                .with_chunk(9)
                .with_path("/tmp/a.enc"),
        );
        let context = err.context().unwrap();
        assert_eq!(context.chunk_index, Some(3));
        assert_eq!(context.path.as_deref(), Some(std::path::Path::new("/tmp/a.enc")));
    }

    #[test]
    fn test_integrity_classification() {
        let auth = StreamError::Authentication {
            context: StreamContext::new(),
        };
        let range = StreamError::OutOfRange {
            requested: 10,
            size: 5,
        };
        assert!(auth.is_integrity_violation());
        assert!(!range.is_integrity_violation());
    }

    #[test]
    fn test_io_error_kinds() {
        let auth: io::Error = StreamError::Authentication {
            context: StreamContext::new(),
        }
        .into();
        assert_eq!(auth.kind(), io::ErrorKind::InvalidData);
        let inner = auth.get_ref().and_then(|e| e.downcast_ref::<StreamError>());
        assert!(matches!(inner, Some(StreamError::Authentication { .. })));

        let range: io::Error = StreamError::OutOfRange {
            requested: 2,
            size: 1,
        }
        .into();
        assert_eq!(range.kind(), io::ErrorKind::InvalidInput);
    }
}
