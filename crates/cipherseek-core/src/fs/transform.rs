//! Whole-container encryption and decryption.
//!
//! These helpers process one chunk at a time, so memory stays bounded by the
//! chunk size regardless of input length. The stream variants leave a
//! partially written sink behind on failure; the path variants write to a
//! temporary sibling and only replace the destination once everything has
//! been sealed or authenticated.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Cursor, Read, SeekFrom, Write};
use std::path::Path;

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, instrument};
use zeroize::Zeroizing;

use super::codec::ChunkCodec;
use super::source::ByteSource;
use super::writer::EncryptingWriter;
use crate::crypto::AeadCipher;
use crate::error::{StreamContext, StreamError};

/// Counters reported by a completed transform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransformStats {
    pub chunks: u64,
    pub plaintext_bytes: u64,
    pub ciphertext_bytes: u64,
}

// ============================================================================
// Stream transforms
// ============================================================================

/// Encrypt everything `source` yields into `sink`.
#[instrument(level = "debug", skip_all)]
pub fn encrypt_stream<R, W, C>(
    mut source: R,
    sink: W,
    codec: &ChunkCodec<C>,
) -> Result<TransformStats, StreamError>
where
    R: Read,
    W: Write,
    C: AeadCipher,
{
    let context = StreamContext::new().with_operation("encrypt");
    let mut writer = EncryptingWriter::new(sink, codec.by_ref());
    let mut buf = Zeroizing::new(vec![0u8; codec.layout().plaintext_chunk_size()]);

    loop {
        let n = match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(StreamError::io_with_context(e, context)),
        };
        writer.append(&buf[..n])?;
    }

    let (_, stats) = writer.finish()?;
    Ok(stats)
}

/// Authenticate and decrypt a whole container into `sink`.
///
/// Fails on the first chunk that does not verify. Chunks before it have
/// already been written to `sink` and must not be trusted as complete output.
#[instrument(level = "debug", skip_all)]
pub fn decrypt_stream<S, W, C>(
    mut source: S,
    mut sink: W,
    codec: &ChunkCodec<C>,
) -> Result<TransformStats, StreamError>
where
    S: ByteSource,
    W: Write,
    C: AeadCipher,
{
    let context = StreamContext::new().with_operation("decrypt");
    let layout = codec.layout();

    let encrypted_size = source
        .size()
        .map_err(|e| StreamError::io_with_context(e, context.clone()))?;
    let plaintext_size = layout
        .plaintext_size(encrypted_size)
        .map_err(|e| e.with_context(&context))?;

    source
        .seek(SeekFrom::Start(0))
        .map_err(|e| StreamError::io_with_context(e, context.clone()))?;

    let mut stats = TransformStats::default();
    let mut encrypted = vec![0u8; layout.encrypted_chunk_size()];
    let chunk_count = layout.chunk_count(encrypted_size);

    for chunk_index in 0..chunk_count {
        let chunk_context = context.clone().with_chunk(chunk_index);
        let Some(len) = layout.encrypted_chunk_len(chunk_index, encrypted_size) else {
            break;
        };

        source.read_exact(&mut encrypted[..len]).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                StreamError::MalformedFile {
                    encrypted_size,
                    reason: "source ended inside a chunk".to_string(),
                    context: chunk_context.clone(),
                }
            } else {
                StreamError::io_with_context(e, chunk_context.clone())
            }
        })?;

        let is_final = chunk_index + 1 == chunk_count;
        let plaintext = codec
            .decrypt_indexed(chunk_index, is_final, &encrypted[..len])
            .map_err(|e| e.with_context(&chunk_context))?;

        sink.write_all(&plaintext)
            .map_err(|e| StreamError::io_with_context(e, chunk_context))?;

        stats.chunks += 1;
        stats.plaintext_bytes += plaintext.len() as u64;
        stats.ciphertext_bytes += len as u64;
    }

    sink.flush()
        .map_err(|e| StreamError::io_with_context(e, context))?;

    debug_assert_eq!(stats.plaintext_bytes, plaintext_size);
    debug!(
        chunks = stats.chunks,
        plaintext_bytes = stats.plaintext_bytes,
        "Decryption finished"
    );
    Ok(stats)
}

// ============================================================================
// Path transforms
// ============================================================================

/// Encrypt the file at `src` into `dst`, replacing `dst` atomically.
#[instrument(level = "debug", skip(codec), fields(src = %src.display(), dst = %dst.display()))]
pub fn encrypt_file<C: AeadCipher>(
    src: &Path,
    dst: &Path,
    codec: &ChunkCodec<C>,
) -> Result<TransformStats, StreamError> {
    let source = open_source(src, "encrypt_file")?;
    write_atomically(dst, "encrypt_file", |file| {
        encrypt_stream(BufReader::new(source), BufWriter::new(file), codec)
    })
}

/// Decrypt the container at `src` into `dst`, replacing `dst` atomically.
///
/// On failure `dst` is left untouched.
#[instrument(level = "debug", skip(codec), fields(src = %src.display(), dst = %dst.display()))]
pub fn decrypt_file<C: AeadCipher>(
    src: &Path,
    dst: &Path,
    codec: &ChunkCodec<C>,
) -> Result<TransformStats, StreamError> {
    let source = open_source(src, "decrypt_file")?;
    write_atomically(dst, "decrypt_file", |file| {
        decrypt_stream(source, BufWriter::new(file), codec)
    })
    .map_err(|e| e.with_context(&StreamContext::new().with_path(src)))
}

fn open_source(path: &Path, operation: &'static str) -> Result<File, StreamError> {
    File::open(path).map_err(|e| {
        StreamError::io_with_context(
            e,
            StreamContext::new().with_path(path).with_operation(operation),
        )
    })
}

fn write_atomically<F>(
    dst: &Path,
    operation: &'static str,
    fill: F,
) -> Result<TransformStats, StreamError>
where
    F: FnOnce(&mut File) -> Result<TransformStats, StreamError>,
{
    let context = StreamContext::new().with_path(dst).with_operation(operation);
    let parent = dst
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let mut temp = NamedTempFile::new_in(parent)
        .map_err(|e| StreamError::io_with_context(e, context.clone()))?;

    // Dropping `temp` on the error path removes the partial output.
    let stats = fill(temp.as_file_mut())?;

    temp.as_file()
        .sync_all()
        .map_err(|e| StreamError::io_with_context(e, context.clone()))?;
    temp.persist(dst)
        .map_err(|e| StreamError::io_with_context(e.error, context))?;

    debug!(chunks = stats.chunks, "Output persisted");
    Ok(stats)
}

// ============================================================================
// In-memory transforms
// ============================================================================

/// Encrypt a buffer into a new container.
pub fn encrypt_bytes<C: AeadCipher>(
    plaintext: &[u8],
    codec: &ChunkCodec<C>,
) -> Result<Vec<u8>, StreamError> {
    let capacity = codec.layout().encrypted_size(plaintext.len() as u64);
    let mut out = Vec::with_capacity(usize::try_from(capacity).unwrap_or(0));
    encrypt_stream(plaintext, &mut out, codec)?;
    Ok(out)
}

/// Decrypt a whole container held in memory.
pub fn decrypt_bytes<C: AeadCipher>(
    container: &[u8],
    codec: &ChunkCodec<C>,
) -> Result<Vec<u8>, StreamError> {
    let mut out = Vec::new();
    decrypt_stream(Cursor::new(container), &mut out, codec)?;
    Ok(out)
}
