//! Random-access reads through `DecryptingStream` with the default layout.

mod common;

use std::io::{Cursor, Read, Seek, SeekFrom};
use std::sync::Arc;

use cipherseek_core::error::StreamError;
use cipherseek_core::fs::{DecryptingStream, StreamOptions, encrypt_bytes};
use common::{CHUNK, create_sized_content, create_test_codec};
use proptest::prelude::*;

fn open(plaintext: &[u8]) -> DecryptingStream<Cursor<Vec<u8>>, cipherseek_core::CipherSuite> {
    let codec = create_test_codec();
    let container = encrypt_bytes(plaintext, &codec).unwrap();
    DecryptingStream::open(Cursor::new(container), codec).unwrap()
}

#[test]
fn test_seek_across_chunk_boundary() {
    let plaintext = vec![b'A'; 70_000];
    let mut stream = open(&plaintext);

    assert_eq!(stream.size(), 70_000);
    stream.seek_to(65_530).unwrap();
    let data = stream.read_up_to(20).unwrap();

    assert_eq!(data.len(), 20);
    assert_eq!(data, plaintext[65_530..65_550]);
    assert_eq!(stream.position(), 65_550);
}

#[test]
fn test_boundary_read_with_distinct_bytes() {
    let plaintext = create_sized_content(70_000);
    let mut stream = open(&plaintext);

    let data = stream.read_at(65_530, 20).unwrap();
    assert_eq!(data[..6], plaintext[65_530..CHUNK]);
    assert_eq!(data[6..], plaintext[CHUNK..CHUNK + 14]);
}

#[test]
fn test_empty_container() {
    let mut stream = open(b"");

    assert_eq!(stream.encrypted_size(), 0);
    assert_eq!(stream.size(), 0);
    assert!(stream.is_eof());
    assert!(stream.read_up_to(100).unwrap().is_empty());
    assert_eq!(stream.seek_to(0).unwrap(), 0);
    assert!(matches!(
        stream.seek_to(1),
        Err(StreamError::OutOfRange { requested: 1, size: 0 })
    ));
}

#[test]
fn test_size_for_boundary_lengths() {
    let codec = create_test_codec();
    for len in [0, 1, CHUNK - 1, CHUNK, CHUNK + 1, 3 * CHUNK] {
        let container = encrypt_bytes(&create_sized_content(len), &codec).unwrap();
        let chunks = len.div_ceil(CHUNK);
        assert_eq!(container.len(), len + chunks * 28, "len {len}");

        let stream = DecryptingStream::open(Cursor::new(container), codec.clone()).unwrap();
        assert_eq!(stream.size(), len as u64, "len {len}");
    }
}

#[test]
fn test_short_read_only_at_eof() {
    let plaintext = create_sized_content(CHUNK + 100);
    let mut stream = open(&plaintext);

    stream.seek_to(CHUNK as u64 + 50).unwrap();
    let tail = stream.read_up_to(1_000).unwrap();
    assert_eq!(tail, plaintext[CHUNK + 50..]);
    assert!(stream.read_up_to(1).unwrap().is_empty());
}

#[test]
fn test_read_spanning_many_chunks() {
    let plaintext = create_sized_content(5 * CHUNK + 37);
    let mut stream = DecryptingStream::open_with(
        Cursor::new(encrypt_bytes(&plaintext, &create_test_codec()).unwrap()),
        create_test_codec(),
        StreamOptions { cache_chunks: 3 },
    )
    .unwrap();

    let data = stream.read_at(10, 4 * CHUNK).unwrap();
    assert_eq!(data, plaintext[10..10 + 4 * CHUNK]);
}

#[test]
fn test_backward_seeks() {
    let plaintext = create_sized_content(3 * CHUNK);
    let mut stream = open(&plaintext);

    for offset in [2 * CHUNK + 5, CHUNK + 7, 3, 2 * CHUNK - 1, 0] {
        let data = stream.read_at(offset as u64, 64).unwrap();
        assert_eq!(data, plaintext[offset..offset + 64], "offset {offset}");
    }
}

#[test]
fn test_std_io_consumers() {
    let plaintext = create_sized_content(2 * CHUNK + 999);
    let mut stream = open(&plaintext);

    let mut all = Vec::new();
    stream.read_to_end(&mut all).unwrap();
    assert_eq!(all, plaintext);

    stream.seek(SeekFrom::End(-999)).unwrap();
    let mut tail = vec![0u8; 999];
    stream.read_exact(&mut tail).unwrap();
    assert_eq!(tail, plaintext[2 * CHUNK..]);

    stream.rewind().unwrap();
    let mut reader = std::io::BufReader::new(&mut stream);
    let mut head = [0u8; 10];
    reader.read_exact(&mut head).unwrap();
    assert_eq!(head, plaintext[..10]);
}

#[test]
fn test_independent_streams_share_storage() {
    let plaintext = Arc::new(create_sized_content(4 * CHUNK + 11));
    let codec = create_test_codec();
    let container: Arc<[u8]> = encrypt_bytes(&plaintext, &codec).unwrap().into();

    std::thread::scope(|scope| {
        for worker in 0..4usize {
            let container = Arc::clone(&container);
            let plaintext = Arc::clone(&plaintext);
            let codec = codec.clone();
            scope.spawn(move || {
                let mut stream = DecryptingStream::open(Cursor::new(container), codec).unwrap();
                for step in 0..20usize {
                    let offset = (worker * 37_123 + step * 12_345) % plaintext.len();
                    let data = stream.read_at(offset as u64, 5_000).unwrap();
                    let end = (offset + 5_000).min(plaintext.len());
                    assert_eq!(data, plaintext[offset..end]);
                }
            });
        }
    });
}

#[test]
fn test_wrong_key_is_error_not_eof() {
    let container = encrypt_bytes(b"classified", &create_test_codec()).unwrap();
    let other = cipherseek_core::ChunkCodec::new(
        cipherseek_core::CipherKind::Aes256Gcm.build(&cipherseek_core::ContentKey::random()),
    )
    .unwrap();

    let mut stream = DecryptingStream::open(Cursor::new(container), other).unwrap();
    let err = stream.read_up_to(10).unwrap_err();
    assert!(err.is_integrity_violation());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn test_random_access_matches_plaintext(
        len in 0usize..=(5 * CHUNK + 37),
        reads in prop::collection::vec((any::<prop::sample::Index>(), 0usize..(2 * CHUNK)), 1..8),
    ) {
        let plaintext = create_sized_content(len);
        let mut stream = open(&plaintext);

        for (offset, read_len) in reads {
            let offset = offset.index(len + 1);
            let data = stream.read_at(offset as u64, read_len).unwrap();
            let end = (offset + read_len).min(len);
            prop_assert_eq!(&data[..], &plaintext[offset..end]);
            prop_assert_eq!(stream.position(), end as u64);
        }
    }
}
