//! Single-file container codec
//!
//! Binary layout:
//! ```text
//! [16 bytes: salt][12 bytes: iv]
//! [4 bytes LE: hwSaltLen][hwSaltLen bytes: hardware salt]
//! [4 bytes LE: metadataLen][metadataLen bytes: FileMetadata JSON]
//! [N bytes: AES-256-GCM ciphertext][16 bytes: GCM tag]
//! ```
//!
//! Parsing is strictly length-prefixed. Every structural problem, like every
//! tag mismatch, surfaces as [`VaultError::Authentication`] so a caller cannot
//! tell a wrong password from a damaged file.

use std::sync::Arc;
use tracing::debug;

use vaultpack_core::{FileMetadata, VaultError, VaultResult};

use crate::kdf::KdfParams;
use crate::keys::{resolve_container_key, EncryptionSecret, KeySource};
use crate::names::FilenameObfuscator;
use crate::provider::{default_provider, CryptoProvider};
use crate::{IV_SIZE, SALT_SIZE, TAG_SIZE};

/// Fields of a container, borrowed from its bytes
#[derive(Debug)]
pub struct ContainerLayout<'a> {
    pub salt: [u8; SALT_SIZE],
    pub iv: [u8; IV_SIZE],
    pub hw_salt: &'a [u8],
    pub metadata_json: &'a [u8],
    pub ciphertext: &'a [u8],
}

impl<'a> ContainerLayout<'a> {
    /// Split container bytes into fields using the embedded length prefixes
    pub fn parse(bytes: &'a [u8]) -> VaultResult<Self> {
        let mut reader = Reader { bytes, pos: 0 };

        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(reader.take(SALT_SIZE)?);
        let mut iv = [0u8; IV_SIZE];
        iv.copy_from_slice(reader.take(IV_SIZE)?);

        let hw_len = reader.u32_le()? as usize;
        let hw_salt = reader.take(hw_len)?;
        let meta_len = reader.u32_le()? as usize;
        let metadata_json = reader.take(meta_len)?;

        let ciphertext = reader.rest();
        if ciphertext.len() < TAG_SIZE {
            debug!(len = ciphertext.len(), "container ciphertext shorter than tag");
            return Err(VaultError::Authentication);
        }

        Ok(Self {
            salt,
            iv,
            hw_salt,
            metadata_json,
            ciphertext,
        })
    }

    pub fn metadata(&self) -> VaultResult<FileMetadata> {
        serde_json::from_slice(self.metadata_json).map_err(|e| {
            debug!(error = %e, "container metadata unparseable");
            VaultError::Authentication
        })
    }

    /// Concatenate fields in container order
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            SALT_SIZE
                + IV_SIZE
                + 8
                + self.hw_salt.len()
                + self.metadata_json.len()
                + self.ciphertext.len(),
        );
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&(self.hw_salt.len() as u32).to_le_bytes());
        out.extend_from_slice(self.hw_salt);
        out.extend_from_slice(&(self.metadata_json.len() as u32).to_le_bytes());
        out.extend_from_slice(self.metadata_json);
        out.extend_from_slice(self.ciphertext);
        out
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> VaultResult<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or(VaultError::Authentication)?;
        let slice = self.bytes.get(self.pos..end).ok_or_else(|| {
            debug!(need = end, have = self.bytes.len(), "container truncated");
            VaultError::Authentication
        })?;
        self.pos = end;
        Ok(slice)
    }

    fn u32_le(&mut self) -> VaultResult<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(buf))
    }

    fn rest(&mut self) -> &'a [u8] {
        let rest = &self.bytes[self.pos..];
        self.pos = self.bytes.len();
        rest
    }
}

/// Output of [`ContainerCodec::pack`]
#[derive(Debug)]
pub struct PackedContainer {
    pub bytes: Vec<u8>,
    /// Name to store the container under, per the metadata's filename options
    pub stored_name: String,
}

/// Output of [`ContainerCodec::unpack`]
#[derive(Debug)]
pub struct UnpackedContainer {
    pub data: Vec<u8>,
    pub metadata: FileMetadata,
}

#[derive(Clone)]
pub struct ContainerCodec {
    provider: Arc<dyn CryptoProvider>,
    params: KdfParams,
    names: FilenameObfuscator,
}

impl Default for ContainerCodec {
    fn default() -> Self {
        Self::new(default_provider(), KdfParams::default())
    }
}

impl ContainerCodec {
    pub fn new(provider: Arc<dyn CryptoProvider>, params: KdfParams) -> Self {
        let names = FilenameObfuscator::new(Arc::clone(&provider), &params);
        Self {
            provider,
            params,
            names,
        }
    }

    pub fn provider(&self) -> &Arc<dyn CryptoProvider> {
        &self.provider
    }

    pub fn params(&self) -> &KdfParams {
        &self.params
    }

    pub fn names(&self) -> &FilenameObfuscator {
        &self.names
    }

    /// Seal `data` with a key derived from the secret's password.
    pub fn pack(
        &self,
        data: &[u8],
        metadata: FileMetadata,
        secret: &EncryptionSecret,
    ) -> VaultResult<PackedContainer> {
        self.pack_with_key_source(data, metadata, secret, KeySource::Password)
    }

    pub fn pack_with_key_source(
        &self,
        data: &[u8],
        mut metadata: FileMetadata,
        secret: &EncryptionSecret,
        source: KeySource<'_>,
    ) -> VaultResult<PackedContainer> {
        let stored_name = self.names.obfuscate(
            &metadata.original_name,
            secret.password(),
            &metadata.filename_encryption,
        )?;

        let mut salt = [0u8; SALT_SIZE];
        let mut iv = [0u8; IV_SIZE];
        self.provider.fill_random(&mut salt)?;
        self.provider.fill_random(&mut iv)?;

        let hw_salt: &[u8] = match secret.hardware() {
            Some(hw) => &hw.salt,
            None => &[],
        };
        metadata.has_hardware_key = !hw_salt.is_empty();

        let key = resolve_container_key(
            self.provider.as_ref(),
            secret,
            &salt,
            (!hw_salt.is_empty()).then_some(hw_salt),
            source,
            &self.params,
        )?;
        let ciphertext = self.provider.encrypt(&key, &iv, data)?;
        let metadata_json = serde_json::to_vec(&metadata)?;

        let layout = ContainerLayout {
            salt,
            iv,
            hw_salt,
            metadata_json: &metadata_json,
            ciphertext: &ciphertext,
        };
        let bytes = layout.to_bytes();

        debug!(
            plaintext = data.len(),
            container = bytes.len(),
            hardware = metadata.has_hardware_key,
            "packed container"
        );
        Ok(PackedContainer { bytes, stored_name })
    }

    /// Open a container sealed with a per-container password key.
    pub fn unpack(&self, bytes: &[u8], secret: &EncryptionSecret) -> VaultResult<UnpackedContainer> {
        self.unpack_with_key_source(bytes, secret, KeySource::Password)
    }

    pub fn unpack_with_key_source(
        &self,
        bytes: &[u8],
        secret: &EncryptionSecret,
        source: KeySource<'_>,
    ) -> VaultResult<UnpackedContainer> {
        let layout = ContainerLayout::parse(bytes)?;
        let metadata = layout.metadata()?;

        if metadata.has_hardware_key == layout.hw_salt.is_empty() {
            debug!("hardware flag disagrees with hardware salt length");
            return Err(VaultError::Authentication);
        }
        if metadata.has_hardware_key && !secret.has_hardware() {
            return Err(VaultError::HardwareKeyRequired);
        }

        let key = resolve_container_key(
            self.provider.as_ref(),
            secret,
            &layout.salt,
            metadata.has_hardware_key.then_some(layout.hw_salt),
            source,
            &self.params,
        )?;
        let data = self.provider.decrypt(&key, &layout.iv, layout.ciphertext)?;

        debug!(plaintext = data.len(), "unpacked container");
        Ok(UnpackedContainer { data, metadata })
    }

    /// Read a container's metadata without a password.
    pub fn peek_metadata(bytes: &[u8]) -> VaultResult<FileMetadata> {
        ContainerLayout::parse(bytes)?.metadata()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{HardwareSecret, RawHardwareKey};
    use crate::provider::RustCryptoProvider;
    use crate::KEY_SIZE;
    use vaultpack_core::{FilenameEncryptionOptions, FilenameMode};

    fn codec() -> ContainerCodec {
        ContainerCodec::new(
            Arc::new(RustCryptoProvider),
            KdfParams {
                iterations: 1000,
                name_iterations: 100,
            },
        )
    }

    fn hardware() -> HardwareSecret {
        HardwareSecret::new(Arc::new(RawHardwareKey::new([0x33; KEY_SIZE])), [9u8; SALT_SIZE])
    }

    #[test]
    fn test_pack_unpack_roundtrip() {
        let c = codec();
        let secret = EncryptionSecret::new("password-123");
        let meta = FileMetadata::new("notes.txt", 11, "");

        let packed = c.pack(b"hello world", meta.clone(), &secret).unwrap();
        assert_eq!(packed.stored_name, "notes.txt.enc");

        let out = c.unpack(&packed.bytes, &secret).unwrap();
        assert_eq!(out.data, b"hello world");
        assert_eq!(out.metadata, meta);
    }

    #[test]
    fn test_layout_offsets() {
        let c = codec();
        let meta = FileMetadata::new("a.bin", 3, "");
        let packed = c.pack(b"abc", meta, &EncryptionSecret::new("password-123")).unwrap();
        let bytes = &packed.bytes;

        // no hardware salt
        assert_eq!(&bytes[28..32], &[0, 0, 0, 0]);
        let meta_len = u32::from_le_bytes(bytes[32..36].try_into().unwrap()) as usize;
        let json: serde_json::Value = serde_json::from_slice(&bytes[36..36 + meta_len]).unwrap();
        assert_eq!(json["originalName"], "a.bin");
        // ciphertext + tag
        assert_eq!(bytes.len() - 36 - meta_len, 3 + TAG_SIZE);
    }

    #[test]
    fn test_hardware_salt_recorded() {
        let c = codec();
        let secret = EncryptionSecret::new("password-123").with_hardware(hardware());
        let packed = c.pack(b"abc", FileMetadata::new("a.bin", 3, ""), &secret).unwrap();

        let layout = ContainerLayout::parse(&packed.bytes).unwrap();
        assert_eq!(layout.hw_salt, &[9u8; SALT_SIZE]);
        assert!(layout.metadata().unwrap().has_hardware_key);

        let out = c.unpack(&packed.bytes, &secret).unwrap();
        assert_eq!(out.data, b"abc");
    }

    #[test]
    fn test_hardware_required() {
        let c = codec();
        let sealed = EncryptionSecret::new("password-123").with_hardware(hardware());
        let packed = c.pack(b"abc", FileMetadata::new("a.bin", 3, ""), &sealed).unwrap();

        let err = c
            .unpack(&packed.bytes, &EncryptionSecret::new("password-123"))
            .unwrap_err();
        assert!(matches!(err, VaultError::HardwareKeyRequired));
    }

    #[test]
    fn test_wrong_hardware_key_is_authentication() {
        let c = codec();
        let sealed = EncryptionSecret::new("password-123").with_hardware(hardware());
        let packed = c.pack(b"abc", FileMetadata::new("a.bin", 3, ""), &sealed).unwrap();

        let other = EncryptionSecret::new("password-123").with_hardware(HardwareSecret::new(
            Arc::new(RawHardwareKey::new([0x44; KEY_SIZE])),
            [9u8; SALT_SIZE],
        ));
        assert!(matches!(
            c.unpack(&packed.bytes, &other).unwrap_err(),
            VaultError::Authentication
        ));
    }

    #[test]
    fn test_hardware_supplied_but_unused_is_ignored() {
        let c = codec();
        let packed = c
            .pack(b"abc", FileMetadata::new("a.bin", 3, ""), &EncryptionSecret::new("password-123"))
            .unwrap();
        let with_hw = EncryptionSecret::new("password-123").with_hardware(hardware());
        assert_eq!(c.unpack(&packed.bytes, &with_hw).unwrap().data, b"abc");
    }

    #[test]
    fn test_truncated_container_is_authentication() {
        let c = codec();
        let secret = EncryptionSecret::new("password-123");
        let packed = c.pack(b"abcdef", FileMetadata::new("a.bin", 6, ""), &secret).unwrap();

        for len in [0, 10, 30, 35, packed.bytes.len() - 1] {
            let err = c.unpack(&packed.bytes[..len], &secret).unwrap_err();
            assert!(matches!(err, VaultError::Authentication), "len {len}: {err}");
        }
    }

    #[test]
    fn test_oversized_length_prefix() {
        let mut bytes = vec![0u8; 28];
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        let err = ContainerCodec::peek_metadata(&bytes).unwrap_err();
        assert!(matches!(err, VaultError::Authentication));
    }

    #[test]
    fn test_tampered_ciphertext() {
        let c = codec();
        let secret = EncryptionSecret::new("password-123");
        let mut bytes = c
            .pack(b"secret data", FileMetadata::new("a.bin", 11, ""), &secret)
            .unwrap()
            .bytes;
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;

        assert!(matches!(c.unpack(&bytes, &secret), Err(VaultError::Authentication)));
    }

    #[test]
    fn test_stored_name_follows_metadata_options() {
        let c = codec();
        let secret = EncryptionSecret::new("password-123");
        let opts = FilenameEncryptionOptions::new(FilenameMode::Full).with_preserved_extensions(true);
        let meta = FileMetadata::new("hello.txt", 5, "").with_filename_encryption(opts.clone());

        let packed = c.pack(b"hello", meta, &secret).unwrap();
        assert!(packed.stored_name.ends_with(".txt"));
        assert_ne!(packed.stored_name, "hello.txt");
        assert_eq!(
            c.names().reveal(&packed.stored_name, secret.password(), &opts, "fallback"),
            "hello.txt"
        );
    }

    #[test]
    fn test_peek_metadata_without_password() {
        let c = codec();
        let secret = EncryptionSecret::new("password-123").with_hardware(hardware());
        let packed = c.pack(b"abc", FileMetadata::new("a.bin", 3, ""), &secret).unwrap();

        let meta = ContainerCodec::peek_metadata(&packed.bytes).unwrap();
        assert_eq!(meta.original_name, "a.bin");
        assert!(meta.has_hardware_key);
    }

    #[test]
    fn test_archive_key_source() {
        let c = codec();
        let secret = EncryptionSecret::new("password-123");
        let archive_key = crate::kdf::DerivedKey::from_bytes([7u8; KEY_SIZE]);

        let packed = c
            .pack_with_key_source(
                b"abc",
                FileMetadata::new("a.bin", 3, ""),
                &secret,
                KeySource::Archive(&archive_key),
            )
            .unwrap();

        let out = c
            .unpack_with_key_source(&packed.bytes, &secret, KeySource::Archive(&archive_key))
            .unwrap();
        assert_eq!(out.data, b"abc");

        // the password path derives a different key
        assert!(matches!(
            c.unpack(&packed.bytes, &secret),
            Err(VaultError::Authentication)
        ));
    }
}
