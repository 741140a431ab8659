//! Hardware-bound key material and its combination with the password key
//!
//! The hardware side is a capability: all the codec can do with a handle is
//! ask it for 256 bits of key material bound to a salt. How the handle came
//! to exist (security key ceremony, key file, test fixture) is invisible here.

use std::path::PathBuf;
use std::sync::Arc;
use zeroize::Zeroizing;

use vaultpack_core::{VaultError, VaultResult};

use crate::kdf::DerivedKey;
use crate::provider::CryptoProvider;
use crate::{KEY_SIZE, SALT_SIZE};

/// An opaque hardware key handle
pub trait HardwareKey: Send + Sync {
    /// Export raw key material for `salt`.
    ///
    /// `salt` is the hardware salt recorded when the secret was established;
    /// it travels in the container so decryption can ask for the same bytes.
    fn export_raw(&self, salt: &[u8]) -> VaultResult<DerivedKey>;
}

/// Handle over fixed key material; ignores the salt
pub struct RawHardwareKey {
    key: DerivedKey,
}

impl RawHardwareKey {
    pub fn new(bytes: [u8; KEY_SIZE]) -> Self {
        Self {
            key: DerivedKey::from_bytes(bytes),
        }
    }
}

impl HardwareKey for RawHardwareKey {
    fn export_raw(&self, _salt: &[u8]) -> VaultResult<DerivedKey> {
        Ok(self.key.clone())
    }
}

/// Handle that stretches authenticator credential bytes with PBKDF2 per salt
pub struct CredentialHardwareKey {
    credential: Zeroizing<Vec<u8>>,
    provider: Arc<dyn CryptoProvider>,
    iterations: u32,
}

impl CredentialHardwareKey {
    pub const DEFAULT_ITERATIONS: u32 = 100_000;

    pub fn new(credential: Vec<u8>, provider: Arc<dyn CryptoProvider>) -> Self {
        Self {
            credential: Zeroizing::new(credential),
            provider,
            iterations: Self::DEFAULT_ITERATIONS,
        }
    }

    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }
}

impl HardwareKey for CredentialHardwareKey {
    fn export_raw(&self, salt: &[u8]) -> VaultResult<DerivedKey> {
        self.provider
            .derive_key(&self.credential, salt, self.iterations)
    }
}

/// Key handle plus the salt it was established with
#[derive(Clone)]
pub struct HardwareSecret {
    pub key: Arc<dyn HardwareKey>,
    pub salt: [u8; SALT_SIZE],
}

impl HardwareSecret {
    pub fn new(key: Arc<dyn HardwareKey>, salt: [u8; SALT_SIZE]) -> Self {
        Self { key, salt }
    }
}

impl std::fmt::Debug for HardwareSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardwareSecret")
            .field("key", &"[REDACTED]")
            .field("salt", &self.salt)
            .finish()
    }
}

/// The external hardware authentication ceremony
pub trait HardwareAuthenticator {
    fn authenticate(&self) -> VaultResult<HardwareSecret>;
}

/// Authenticator reading credential bytes exported from a security key to a file
pub struct CredentialFileAuthenticator {
    path: PathBuf,
    provider: Arc<dyn CryptoProvider>,
}

impl CredentialFileAuthenticator {
    pub fn new(path: impl Into<PathBuf>, provider: Arc<dyn CryptoProvider>) -> Self {
        Self {
            path: path.into(),
            provider,
        }
    }
}

impl HardwareAuthenticator for CredentialFileAuthenticator {
    fn authenticate(&self) -> VaultResult<HardwareSecret> {
        let credential = std::fs::read(&self.path)?;
        if credential.is_empty() {
            return Err(VaultError::Input(format!(
                "hardware credential file is empty: {}",
                self.path.display()
            )));
        }
        let mut salt = [0u8; SALT_SIZE];
        self.provider.fill_random(&mut salt)?;
        let key = CredentialHardwareKey::new(credential, Arc::clone(&self.provider));
        Ok(HardwareSecret::new(Arc::new(key), salt))
    }
}

/// XOR a password-derived key with a hardware-derived key.
///
/// Neither input alone reveals the result, and the order does not matter.
pub fn combine(password_key: &DerivedKey, hardware_key: &DerivedKey) -> DerivedKey {
    let mut out = [0u8; KEY_SIZE];
    for (o, (a, b)) in out
        .iter_mut()
        .zip(password_key.as_bytes().iter().zip(hardware_key.as_bytes()))
    {
        *o = a ^ b;
    }
    DerivedKey::from_bytes(out)
}
