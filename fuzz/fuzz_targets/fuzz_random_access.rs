//! Fuzz target for seek/read sequences on a decrypting stream
//!
//! Every read on an untouched container must match the plaintext slice at
//! the same offset, whatever the order of seeks and the cache size.

#![no_main]

use std::io::Cursor;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use cipherseek_core::crypto::{CipherKind, ContentKey};
use cipherseek_core::fs::{ChunkCodec, DecryptingStream, StreamOptions, encrypt_bytes};

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    chunk_size: u8,
    cache_chunks: u8,
    plaintext: Vec<u8>,
    ops: Vec<(u16, u16)>,
}

fuzz_target!(|input: FuzzInput| {
    if input.plaintext.len() > 256 * 1024 || input.ops.len() > 256 {
        return;
    }

    let key = ContentKey::from_bytes([0x17; 32]);
    let chunk_size = usize::from(input.chunk_size) + 1;
    let Ok(codec) = ChunkCodec::new(CipherKind::ChaCha20Poly1305.build(&key))
        .and_then(|c| c.with_chunk_size(chunk_size))
    else {
        return;
    };

    let container = encrypt_bytes(&input.plaintext, &codec).expect("encryption must succeed");
    let options = StreamOptions {
        cache_chunks: usize::from(input.cache_chunks),
    };
    let mut stream = DecryptingStream::open_with(Cursor::new(container), codec, options)
        .expect("valid container must open");
    assert_eq!(stream.size(), input.plaintext.len() as u64);

    let size = input.plaintext.len();
    for (offset, len) in input.ops {
        let offset = usize::from(offset);
        let len = usize::from(len);

        if offset > size {
            assert!(stream.seek_to(offset as u64).is_err());
            continue;
        }

        let data = stream
            .read_at(offset as u64, len)
            .expect("read of intact container must succeed");
        let end = (offset + len).min(size);
        assert_eq!(data, input.plaintext[offset..end]);
        assert_eq!(stream.position(), end as u64);
    }
});
