//! Encryption secrets and per-container key resolution

use hkdf::Hkdf;
use secrecy::SecretString;
use sha2::Sha256;

use vaultpack_core::{VaultError, VaultResult};

use crate::hardware::{combine, HardwareSecret};
use crate::kdf::{derive_key, DerivedKey, KdfParams};
use crate::provider::CryptoProvider;
use crate::{KEY_SIZE, SALT_SIZE};

/// Password plus optional hardware secret, held for one operation
pub struct EncryptionSecret {
    password: SecretString,
    hardware: Option<HardwareSecret>,
}

impl EncryptionSecret {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: SecretString::from(password.into()),
            hardware: None,
        }
    }

    pub fn from_secret(password: SecretString) -> Self {
        Self {
            password,
            hardware: None,
        }
    }

    pub fn with_hardware(mut self, hardware: HardwareSecret) -> Self {
        self.hardware = Some(hardware);
        self
    }

    pub fn password(&self) -> &SecretString {
        &self.password
    }

    pub fn hardware(&self) -> Option<&HardwareSecret> {
        self.hardware.as_ref()
    }

    pub fn has_hardware(&self) -> bool {
        self.hardware.is_some()
    }
}

impl std::fmt::Debug for EncryptionSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionSecret")
            .field("password", &"[REDACTED]")
            .field("hardware", &self.hardware)
            .finish()
    }
}

/// Where the password side of a container key comes from
#[derive(Debug, Clone, Copy)]
pub enum KeySource<'a> {
    /// PBKDF2 over the password with the container salt (standalone containers)
    Password,
    /// HKDF re-derivation from an archive-wide key with the container salt
    Archive(&'a DerivedKey),
}

/// Re-derive a per-container key from the archive-wide key via HKDF-SHA256.
pub fn derive_archive_file_key(
    archive_key: &DerivedKey,
    container_salt: &[u8; SALT_SIZE],
) -> VaultResult<DerivedKey> {
    let hkdf = Hkdf::<Sha256>::new(Some(container_salt), archive_key.as_bytes());
    let mut okm = [0u8; KEY_SIZE];
    hkdf.expand(b"vaultpack-archive-file", &mut okm)
        .map_err(|e| VaultError::Provider(format!("HKDF expand failed: {e}")))?;
    Ok(DerivedKey::from_bytes(okm))
}

/// Resolve the final content key for one container.
///
/// `hw_salt` is `Some` exactly when the container is (or will be) sealed with
/// a hardware secret.
pub(crate) fn resolve_container_key(
    provider: &dyn CryptoProvider,
    secret: &EncryptionSecret,
    salt: &[u8; SALT_SIZE],
    hw_salt: Option<&[u8]>,
    source: KeySource<'_>,
    params: &KdfParams,
) -> VaultResult<DerivedKey> {
    let base = match source {
        KeySource::Password => derive_key(provider, secret.password(), salt, params)?,
        KeySource::Archive(archive_key) => derive_archive_file_key(archive_key, salt)?,
    };

    match hw_salt {
        None => Ok(base),
        Some(hw_salt) => {
            let hardware = secret.hardware().ok_or(VaultError::HardwareKeyRequired)?;
            let hw_key = hardware.key.export_raw(hw_salt)?;
            Ok(combine(&base, &hw_key))
        }
    }
}
