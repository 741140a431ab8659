//! Cryptographic primitive provider
//!
//! The codecs never call a cipher or hash directly; they go through
//! [`CryptoProvider`] so tests can instrument or replace the primitives.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use vaultpack_core::{VaultError, VaultResult};

use crate::kdf::DerivedKey;
use crate::{IV_SIZE, KEY_SIZE};

/// Primitives the container format is built from.
///
/// Implementations must be safe to call from independent operations
/// concurrently.
pub trait CryptoProvider: Send + Sync {
    /// PBKDF2-HMAC-SHA256 with a 256-bit output
    fn derive_key(&self, secret: &[u8], salt: &[u8], iterations: u32) -> VaultResult<DerivedKey>;

    /// AES-256-GCM; returns ciphertext with the tag appended
    fn encrypt(&self, key: &DerivedKey, iv: &[u8; IV_SIZE], plaintext: &[u8])
        -> VaultResult<Vec<u8>>;

    /// AES-256-GCM; any tag mismatch is [`VaultError::Authentication`]
    fn decrypt(&self, key: &DerivedKey, iv: &[u8; IV_SIZE], ciphertext: &[u8])
        -> VaultResult<Vec<u8>>;

    /// SHA-256
    fn digest(&self, data: &[u8]) -> [u8; 32];

    /// Fill `buf` from a cryptographically secure source
    fn fill_random(&self, buf: &mut [u8]) -> VaultResult<()>;
}

/// Provider backed by the RustCrypto crates and the OS random source
#[derive(Debug, Default, Clone, Copy)]
pub struct RustCryptoProvider;

impl CryptoProvider for RustCryptoProvider {
    fn derive_key(&self, secret: &[u8], salt: &[u8], iterations: u32) -> VaultResult<DerivedKey> {
        if iterations == 0 {
            return Err(VaultError::Provider("PBKDF2 iterations must be at least 1".into()));
        }
        let mut key = [0u8; KEY_SIZE];
        pbkdf2::pbkdf2_hmac::<Sha256>(secret, salt, iterations, &mut key);
        Ok(DerivedKey::from_bytes(key))
    }

    fn encrypt(
        &self,
        key: &DerivedKey,
        iv: &[u8; IV_SIZE],
        plaintext: &[u8],
    ) -> VaultResult<Vec<u8>> {
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| VaultError::Provider(format!("creating AES-256-GCM cipher: {e}")))?;
        cipher
            .encrypt(Nonce::from_slice(iv), plaintext)
            .map_err(|e| VaultError::Provider(format!("encryption failed: {e}")))
    }

    fn decrypt(
        &self,
        key: &DerivedKey,
        iv: &[u8; IV_SIZE],
        ciphertext: &[u8],
    ) -> VaultResult<Vec<u8>> {
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| VaultError::Provider(format!("creating AES-256-GCM cipher: {e}")))?;
        cipher
            .decrypt(Nonce::from_slice(iv), ciphertext)
            .map_err(|_| VaultError::Authentication)
    }

    fn digest(&self, data: &[u8]) -> [u8; 32] {
        Sha256::digest(data).into()
    }

    fn fill_random(&self, buf: &mut [u8]) -> VaultResult<()> {
        rand::thread_rng()
            .try_fill_bytes(buf)
            .map_err(|e| VaultError::Provider(format!("random source failed: {e}")))
    }
}

/// The provider used when a caller does not bring its own
pub fn default_provider() -> Arc<dyn CryptoProvider> {
    Arc::new(RustCryptoProvider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let p = RustCryptoProvider;
        let key = DerivedKey::from_bytes([7u8; KEY_SIZE]);
        let iv = [1u8; IV_SIZE];

        let ct = p.encrypt(&key, &iv, b"hello").unwrap();
        // plaintext (5) + tag (16)
        assert_eq!(ct.len(), 5 + 16);
        assert_eq!(p.decrypt(&key, &iv, &ct).unwrap(), b"hello");
    }

    #[test]
    fn test_decrypt_wrong_key_is_authentication() {
        let p = RustCryptoProvider;
        let iv = [1u8; IV_SIZE];
        let ct = p
            .encrypt(&DerivedKey::from_bytes([1u8; KEY_SIZE]), &iv, b"secret")
            .unwrap();

        let err = p
            .decrypt(&DerivedKey::from_bytes([2u8; KEY_SIZE]), &iv, &ct)
            .unwrap_err();
        assert!(matches!(err, VaultError::Authentication));
    }

    #[test]
    fn test_pbkdf2_known_answer() {
        // RFC 7914 section 11 PBKDF2-HMAC-SHA256 vector, first 32 bytes
        let p = RustCryptoProvider;
        let key = p.derive_key(b"passwd", b"salt", 1).unwrap();
        assert_eq!(
            &key.as_bytes()[..8],
            &[0x55, 0xac, 0x04, 0x6e, 0x56, 0xe3, 0x08, 0x9f]
        );
    }

    #[test]
    fn test_zero_iterations_rejected() {
        assert!(RustCryptoProvider.derive_key(b"pw", b"salt", 0).is_err());
    }

    #[test]
    fn test_digest() {
        let d = RustCryptoProvider.digest(b"abc");
        assert_eq!(&d[..4], &[0xba, 0x78, 0x16, 0xbf]);
    }

    #[test]
    fn test_random_differs() {
        let mut a = [0u8; 16];
        let mut b = [0u8; 16];
        RustCryptoProvider.fill_random(&mut a).unwrap();
        RustCryptoProvider.fill_random(&mut b).unwrap();
        assert_ne!(a, b);
    }
}
