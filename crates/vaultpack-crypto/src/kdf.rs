//! Key derivation: password + salt → 256-bit content key

use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

use vaultpack_core::config::KdfConfig;
use vaultpack_core::{VaultError, VaultResult};

use crate::provider::CryptoProvider;
use crate::{KEY_SIZE, SALT_SIZE};

/// A 256-bit symmetric key.
///
/// Zeroized on drop to prevent secrets lingering in memory.
#[derive(Clone, PartialEq, Eq)]
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// PBKDF2 iteration counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Content key iterations (default: 100000)
    pub iterations: u32,
    /// Filename key iterations for `full` mode (default: 10000)
    pub name_iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: 100_000,
            name_iterations: 10_000,
        }
    }
}

impl From<&KdfConfig> for KdfParams {
    fn from(config: &KdfConfig) -> Self {
        Self {
            iterations: config.iterations,
            name_iterations: config.name_iterations,
        }
    }
}

impl KdfParams {
    pub fn validate(&self) -> VaultResult<()> {
        if self.iterations == 0 || self.name_iterations == 0 {
            return Err(VaultError::Input("KDF iterations must be at least 1".into()));
        }
        Ok(())
    }
}

/// Derive a container key from a password and a per-container salt.
///
/// Deterministic: the same password, salt and params always give the same key.
pub fn derive_key(
    provider: &dyn CryptoProvider,
    password: &SecretString,
    salt: &[u8; SALT_SIZE],
    params: &KdfParams,
) -> VaultResult<DerivedKey> {
    let password = password.expose_secret();
    if password.is_empty() {
        return Err(VaultError::Input("password must not be empty".into()));
    }
    provider.derive_key(password.as_bytes(), salt, params.iterations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::RustCryptoProvider;

    fn fast_params() -> KdfParams {
        KdfParams {
            iterations: 1000,
            name_iterations: 100,
        }
    }

    #[test]
    fn test_kdf_deterministic() {
        let password = SecretString::from("test-passphrase-123");
        let salt = [1u8; SALT_SIZE];

        let key1 = derive_key(&RustCryptoProvider, &password, &salt, &fast_params()).unwrap();
        let key2 = derive_key(&RustCryptoProvider, &password, &salt, &fast_params()).unwrap();

        assert_eq!(key1.as_bytes(), key2.as_bytes(), "KDF must be deterministic");
    }

    #[test]
    fn test_kdf_different_passwords() {
        let salt = [1u8; SALT_SIZE];
        let a = SecretString::from("passphrase-a");
        let b = SecretString::from("passphrase-b");

        let key1 = derive_key(&RustCryptoProvider, &a, &salt, &fast_params()).unwrap();
        let key2 = derive_key(&RustCryptoProvider, &b, &salt, &fast_params()).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_kdf_different_salts() {
        let password = SecretString::from("same-passphrase");

        let key1 = derive_key(&RustCryptoProvider, &password, &[1u8; SALT_SIZE], &fast_params())
            .unwrap();
        let key2 = derive_key(&RustCryptoProvider, &password, &[2u8; SALT_SIZE], &fast_params())
            .unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_empty_password_rejected() {
        let err = derive_key(
            &RustCryptoProvider,
            &SecretString::from(""),
            &[0u8; SALT_SIZE],
            &fast_params(),
        )
        .unwrap_err();
        assert!(matches!(err, VaultError::Input(_)));
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = DerivedKey::from_bytes([0xAB; KEY_SIZE]);
        let dbg = format!("{key:?}");
        assert!(dbg.contains("REDACTED"));
        assert!(!dbg.contains("171"));
    }

    #[test]
    fn test_params_from_config() {
        let params = KdfParams::from(&KdfConfig::default());
        assert_eq!(params, KdfParams::default());
        assert!(KdfParams { iterations: 0, name_iterations: 1 }.validate().is_err());
    }
}
