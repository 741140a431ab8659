use std::sync::Arc;

use vaultpack_core::{FileMetadata, FilenameEncryptionOptions, FilenameMode};
use vaultpack_crypto::{
    derive_archive_file_key, ContainerCodec, DerivedKey, EncryptionSecret, KdfParams, KeySource,
    RustCryptoProvider,
};

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

fn codec() -> ContainerCodec {
    ContainerCodec::new(Arc::new(RustCryptoProvider), KdfParams::default())
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_pack_archive_key(bencher: divan::Bencher, size: usize) {
    let codec = codec();
    let secret = EncryptionSecret::new("bench-password");
    let archive_key = DerivedKey::from_bytes([0xAB; 32]);
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            codec
                .pack_with_key_source(
                    divan::black_box(&data),
                    FileMetadata::new("bench.bin", size as u64, ""),
                    &secret,
                    KeySource::Archive(&archive_key),
                )
                .unwrap()
        });
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_unpack_archive_key(bencher: divan::Bencher, size: usize) {
    let codec = codec();
    let secret = EncryptionSecret::new("bench-password");
    let archive_key = DerivedKey::from_bytes([0xAB; 32]);
    let data = make_data(size);
    let packed = codec
        .pack_with_key_source(
            &data,
            FileMetadata::new("bench.bin", size as u64, ""),
            &secret,
            KeySource::Archive(&archive_key),
        )
        .unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            codec
                .unpack_with_key_source(
                    divan::black_box(&packed.bytes),
                    &secret,
                    KeySource::Archive(&archive_key),
                )
                .unwrap()
        });
}

#[divan::bench(sample_count = 10)]
fn bench_pack_password_kdf() {
    let codec = codec();
    let secret = EncryptionSecret::new("bench-password");
    codec
        .pack(
            divan::black_box(b"small"),
            FileMetadata::new("small.txt", 5, ""),
            &secret,
        )
        .unwrap();
}

#[divan::bench]
fn bench_hkdf_file_key() -> DerivedKey {
    let archive_key = DerivedKey::from_bytes([0x11; 32]);
    derive_archive_file_key(divan::black_box(&archive_key), &[0x22; 16]).unwrap()
}

#[divan::bench(sample_count = 10)]
fn bench_full_name_seal() -> String {
    let codec = codec();
    let secret = EncryptionSecret::new("bench-password");
    let options = FilenameEncryptionOptions::new(FilenameMode::Full);
    codec
        .names()
        .obfuscate(divan::black_box("report.pdf"), secret.password(), &options)
        .unwrap()
}

fn main() {
    divan::main();
}
