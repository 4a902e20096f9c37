//! Fuzz target for whole-container decryption
//!
//! Arbitrary bytes must decrypt to an error, never a panic, and a single
//! flipped bit in a valid container must never decrypt successfully.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use cipherseek_core::crypto::{CipherKind, ContentKey};
use cipherseek_core::fs::{ChunkAad, ChunkCodec, decrypt_bytes, encrypt_bytes};

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    mode: FuzzMode,
    /// Chunk size selector, kept small so inputs span many chunks
    chunk_size: u8,
    indexed: bool,
    data: Vec<u8>,
}

#[derive(Arbitrary, Debug)]
enum FuzzMode {
    /// Decrypt the raw bytes as a container
    ContainerRaw,
    /// Encrypt, flip one bit, decrypt
    RoundtripCorrupt { flip_at: usize, bit: u8 },
}

fuzz_target!(|input: FuzzInput| {
    if input.data.len() > 1024 * 1024 {
        return;
    }

    let key = ContentKey::from_bytes([0x42; 32]);
    let chunk_size = usize::from(input.chunk_size) + 1;
    let Ok(codec) = ChunkCodec::new(CipherKind::Aes256Gcm.build(&key))
        .and_then(|c| c.with_chunk_size(chunk_size))
    else {
        return;
    };
    let codec = if input.indexed {
        codec.with_aad(ChunkAad::Indexed(b"fuzz".to_vec()))
    } else {
        codec
    };

    match input.mode {
        FuzzMode::ContainerRaw => {
            let _ = decrypt_bytes(&input.data, &codec);
        }

        FuzzMode::RoundtripCorrupt { flip_at, bit } => {
            let container = encrypt_bytes(&input.data, &codec).expect("encryption must succeed");
            let decrypted = decrypt_bytes(&container, &codec).expect("roundtrip must succeed");
            assert_eq!(decrypted, input.data, "roundtrip must preserve content");

            if container.is_empty() {
                return;
            }
            let mut corrupted = container;
            let pos = flip_at % corrupted.len();
            corrupted[pos] ^= 1 << (bit % 8);

            assert!(
                decrypt_bytes(&corrupted, &codec).is_err(),
                "flipped bit at {pos} decrypted successfully"
            );
        }
    }
});
