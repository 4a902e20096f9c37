use std::hint::black_box;
use std::io::Cursor;

use cipherseek_core::crypto::{CipherKind, CipherSuite, ContentKey};
use cipherseek_core::fs::{
    ChunkAad, ChunkCodec, DecryptingStream, StreamOptions, decrypt_bytes, encrypt_bytes,
};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn generate_test_data(size: usize) -> Vec<u8> {
    let mut rng = ChaCha8Rng::seed_from_u64(12345);
    let mut data = vec![0u8; size];
    rng.fill(&mut data[..]);
    data
}

fn codec(kind: CipherKind) -> ChunkCodec<CipherSuite> {
    ChunkCodec::new(kind.build(&ContentKey::from_bytes([0x42; 32]))).unwrap()
}

fn bench_batch_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_transform");

    let test_sizes = [
        ("1KB", 1024),
        ("64KB", 64 * 1024), // One chunk exactly
        ("1MB", 1024 * 1024),
        ("10MB", 10 * 1024 * 1024),
    ];

    for kind in [CipherKind::Aes256Gcm, CipherKind::ChaCha20Poly1305] {
        let codec = codec(kind);
        for (name, size) in test_sizes {
            let plaintext = generate_test_data(size);
            let container = encrypt_bytes(&plaintext, &codec).unwrap();
            group.throughput(Throughput::Bytes(size as u64));

            group.bench_with_input(
                BenchmarkId::new(format!("encrypt/{kind}"), name),
                &plaintext,
                |b, plaintext| b.iter(|| black_box(encrypt_bytes(plaintext, &codec).unwrap())),
            );
            group.bench_with_input(
                BenchmarkId::new(format!("decrypt/{kind}"), name),
                &container,
                |b, container| b.iter(|| black_box(decrypt_bytes(container, &codec).unwrap())),
            );
        }
    }
    group.finish();
}

fn bench_random_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("random_access");
    let size = 8 * 1024 * 1024;
    let codec = codec(CipherKind::Aes256Gcm);
    let container = encrypt_bytes(&generate_test_data(size), &codec).unwrap();

    // Offsets a seeking media decoder might produce
    let mut rng = ChaCha8Rng::seed_from_u64(999);
    let offsets: Vec<u64> = (0..64).map(|_| rng.random_range(0..size as u64)).collect();

    for cache_chunks in [1usize, 8] {
        group.throughput(Throughput::Bytes(64 * 4096));
        group.bench_with_input(
            BenchmarkId::new("read_4KB", format!("cache_{cache_chunks}")),
            &cache_chunks,
            |b, &cache_chunks| {
                b.iter(|| {
                    let mut stream = DecryptingStream::open_with(
                        Cursor::new(container.as_slice()),
                        codec.by_ref(),
                        StreamOptions { cache_chunks },
                    )
                    .unwrap();
                    for offset in &offsets {
                        black_box(stream.read_at(*offset, 4096).unwrap());
                    }
                });
            },
        );
    }

    group.throughput(Throughput::Bytes(size as u64));
    group.bench_function("sequential_64KB_reads", |b| {
        b.iter(|| {
            let mut stream =
                DecryptingStream::open(Cursor::new(container.as_slice()), codec.by_ref()).unwrap();
            while !stream.is_eof() {
                black_box(stream.read_up_to(64 * 1024).unwrap());
            }
        });
    });
    group.finish();
}

fn bench_aad_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("aad_policy");
    let plaintext = generate_test_data(1024 * 1024);
    group.throughput(Throughput::Bytes(plaintext.len() as u64));

    let policies = [
        ("none", ChunkAad::None),
        ("fixed", ChunkAad::Fixed(b"media-library".to_vec())),
        ("indexed", ChunkAad::Indexed(b"media-library".to_vec())),
    ];

    for (name, aad) in policies {
        let codec = codec(CipherKind::Aes256Gcm).with_aad(aad);
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter(|| black_box(encrypt_bytes(&plaintext, &codec).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_batch_transform,
    bench_random_access,
    bench_aad_overhead
);
criterion_main!(benches);
