//! Stored-name obfuscation
//!
//! Three modes, chosen per archive or file:
//! - `none`: `report.pdf` → `report.pdf.enc`
//! - `partial`: `report.pdf` → `enc_1a2b3c4d_report.enc` (or `.pdf` with
//!   preserved extensions). The hash covers the whole name, extension
//!   included, so `report.pdf` and `report.docx` never share a stored name.
//!   The hash is one-way; revealing a partial name
//!   always yields the caller's fallback (the name carried in the container
//!   metadata). This hides names from casual listing, nothing more.
//! - `full`: AES-256-GCM of the name under a PBKDF2 name key with its own salt,
//!   stored as base64url(`salt‖iv‖ciphertext`) plus `.enc` or the preserved
//!   extension.
//!
//! Revealing never fails: a name that cannot be recovered is logged and
//! replaced by the fallback so content recovery can proceed.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::warn;

use vaultpack_core::types::{split_extension, strip_encrypted_suffix};
use vaultpack_core::{FilenameEncryptionOptions, FilenameMode, VaultError, VaultResult, ENCRYPTED_SUFFIX};

use crate::hex;
use crate::kdf::KdfParams;
use crate::provider::CryptoProvider;
use crate::{IV_SIZE, SALT_SIZE, TAG_SIZE};

/// Number of hex characters of the SHA-256 used in `partial` names
const PARTIAL_HASH_HEX_LEN: usize = 8;

/// Longest stored name, in bytes, that common filesystems accept
pub const MAX_STORED_NAME_LEN: usize = 255;

#[derive(Clone)]
pub struct FilenameObfuscator {
    provider: Arc<dyn CryptoProvider>,
    name_iterations: u32,
}

impl FilenameObfuscator {
    pub fn new(provider: Arc<dyn CryptoProvider>, params: &KdfParams) -> Self {
        Self {
            provider,
            name_iterations: params.name_iterations,
        }
    }

    /// Compute the stored form of `name`.
    ///
    /// Fails with [`VaultError::Input`] when the stored form would be longer
    /// than [`MAX_STORED_NAME_LEN`] bytes.
    pub fn obfuscate(
        &self,
        name: &str,
        password: &SecretString,
        options: &FilenameEncryptionOptions,
    ) -> VaultResult<String> {
        let stored = self.stored_form(name, password, options)?;
        if stored.len() > MAX_STORED_NAME_LEN {
            return Err(VaultError::Input(format!(
                "name {name:?} is too long for {} filename mode: stored form is {} bytes, limit {MAX_STORED_NAME_LEN}",
                options.mode,
                stored.len()
            )));
        }
        Ok(stored)
    }

    fn stored_form(
        &self,
        name: &str,
        password: &SecretString,
        options: &FilenameEncryptionOptions,
    ) -> VaultResult<String> {
        match options.mode {
            FilenameMode::None => Ok(format!("{name}{ENCRYPTED_SUFFIX}")),
            FilenameMode::Partial => {
                let (stem, ext) = split_extension(name);
                let mut input = name.as_bytes().to_vec();
                input.extend_from_slice(password.expose_secret().as_bytes());
                let hash = hex::encode(&self.provider.digest(&input));
                Ok(format!(
                    "{}_{}_{}{}",
                    options.custom_prefix,
                    &hash[..PARTIAL_HASH_HEX_LEN],
                    stem,
                    stored_suffix(ext, options)
                ))
            }
            FilenameMode::Full => {
                let (_, ext) = split_extension(name);
                let sealed = self.seal_name(name, password)?;
                Ok(format!("{sealed}{}", stored_suffix(ext, options)))
            }
        }
    }

    /// Recover the original name, or `fallback` when that is impossible.
    pub fn reveal(
        &self,
        stored: &str,
        password: &SecretString,
        options: &FilenameEncryptionOptions,
        fallback: &str,
    ) -> String {
        match options.mode {
            FilenameMode::None => strip_encrypted_suffix(stored).to_string(),
            FilenameMode::Partial => fallback.to_string(),
            FilenameMode::Full => match self.open_name(stored, password, options) {
                Ok(name) => name,
                Err(e) => {
                    warn!(error = %e, "filename reveal failed, using stored original name");
                    fallback.to_string()
                }
            },
        }
    }

    fn seal_name(&self, name: &str, password: &SecretString) -> VaultResult<String> {
        let mut salt = [0u8; SALT_SIZE];
        let mut iv = [0u8; IV_SIZE];
        self.provider.fill_random(&mut salt)?;
        self.provider.fill_random(&mut iv)?;

        let key = self.provider.derive_key(
            password.expose_secret().as_bytes(),
            &salt,
            self.name_iterations,
        )?;
        let ciphertext = self.provider.encrypt(&key, &iv, name.as_bytes())?;

        let mut combined = Vec::with_capacity(SALT_SIZE + IV_SIZE + ciphertext.len());
        combined.extend_from_slice(&salt);
        combined.extend_from_slice(&iv);
        combined.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(&combined))
    }

    fn open_name(
        &self,
        stored: &str,
        password: &SecretString,
        options: &FilenameEncryptionOptions,
    ) -> VaultResult<String> {
        let encoded = if options.preserve_extensions {
            split_extension(stored).0
        } else {
            strip_encrypted_suffix(stored)
        };
        let combined = URL_SAFE_NO_PAD
            .decode(encoded.trim_end_matches('='))
            .map_err(|e| VaultError::Format(format!("stored name is not base64url: {e}")))?;
        if combined.len() < SALT_SIZE + IV_SIZE + TAG_SIZE {
            return Err(VaultError::Format("stored name too short".into()));
        }

        let (salt, rest) = combined.split_at(SALT_SIZE);
        let (iv, ciphertext) = rest.split_at(IV_SIZE);
        let mut iv_arr = [0u8; IV_SIZE];
        iv_arr.copy_from_slice(iv);

        let key = self.provider.derive_key(
            password.expose_secret().as_bytes(),
            salt,
            self.name_iterations,
        )?;
        let plain = self.provider.decrypt(&key, &iv_arr, ciphertext)?;
        String::from_utf8(plain)
            .map_err(|e| VaultError::Format(format!("decrypted name is not UTF-8: {e}")))
    }
}

/// `.enc` unless the extension is preserved (possibly empty)
fn stored_suffix<'a>(ext: &'a str, options: &FilenameEncryptionOptions) -> &'a str {
    if options.preserve_extensions {
        ext
    } else {
        ENCRYPTED_SUFFIX
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::RustCryptoProvider;

    fn obfuscator() -> FilenameObfuscator {
        FilenameObfuscator::new(
            Arc::new(RustCryptoProvider),
            &KdfParams {
                iterations: 1000,
                name_iterations: 100,
            },
        )
    }

    fn pw(s: &str) -> SecretString {
        SecretString::from(s)
    }

    #[test]
    fn test_none_mode_roundtrip() {
        let o = obfuscator();
        let opts = FilenameEncryptionOptions::new(FilenameMode::None);

        let stored = o.obfuscate("report.pdf", &pw("password"), &opts).unwrap();
        assert_eq!(stored, "report.pdf.enc");
        assert_eq!(o.reveal(&stored, &pw("anything"), &opts, "fallback"), "report.pdf");
    }

    #[test]
    fn test_partial_mode_shape() {
        let o = obfuscator();
        let opts = FilenameEncryptionOptions::new(FilenameMode::Partial);

        let stored = o.obfuscate("report.pdf", &pw("password"), &opts).unwrap();
        let parts: Vec<&str> = stored.splitn(3, '_').collect();
        assert_eq!(parts[0], "enc");
        assert_eq!(parts[1].len(), 8);
        assert!(parts[1].chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(parts[2], "report.enc");
    }

    #[test]
    fn test_partial_hash_matches_sha256_of_name_and_password() {
        let o = obfuscator();
        let opts = FilenameEncryptionOptions::new(FilenameMode::Partial)
            .with_preserved_extensions(true)
            .with_prefix("x");

        let stored = o.obfuscate("notes.txt", &pw("pw"), &opts).unwrap();
        let expected = hex::encode(&RustCryptoProvider.digest(b"notes.txtpw"));
        assert_eq!(stored, format!("x_{}_notes.txt", &expected[..8]));
    }

    #[test]
    fn test_partial_same_stem_names_differ() {
        let o = obfuscator();
        let opts = FilenameEncryptionOptions::new(FilenameMode::Partial);

        let pdf = o.obfuscate("report.pdf", &pw("password"), &opts).unwrap();
        let docx = o.obfuscate("report.docx", &pw("password"), &opts).unwrap();
        assert_ne!(pdf, docx);
        assert!(pdf.ends_with("_report.enc") && docx.ends_with("_report.enc"));
    }

    #[test]
    fn test_stored_name_length_limit() {
        let o = obfuscator();
        let full = FilenameEncryptionOptions::new(FilenameMode::Full);

        let fits = format!("{}.txt", "b".repeat(96));
        assert!(o.obfuscate(&fits, &pw("password"), &full).unwrap().len() <= MAX_STORED_NAME_LEN);

        let long = format!("{}.txt", "b".repeat(196));
        let err = o.obfuscate(&long, &pw("password"), &full).unwrap_err();
        assert!(matches!(err, VaultError::Input(_)));

        let none = FilenameEncryptionOptions::new(FilenameMode::None);
        assert!(o.obfuscate(&"c".repeat(252), &pw("password"), &none).is_err());
        assert!(o.obfuscate(&"c".repeat(251), &pw("password"), &none).is_ok());
    }

    #[test]
    fn test_partial_reveal_always_fallback() {
        let o = obfuscator();
        let opts = FilenameEncryptionOptions::new(FilenameMode::Partial);
        let stored = o.obfuscate("report.pdf", &pw("password"), &opts).unwrap();

        assert_eq!(o.reveal(&stored, &pw("password"), &opts, "report.pdf"), "report.pdf");
        assert_eq!(o.reveal(&stored, &pw("password"), &opts, "other"), "other");
    }

    #[test]
    fn test_full_mode_roundtrip() {
        let o = obfuscator();
        let opts = FilenameEncryptionOptions::new(FilenameMode::Full);

        let stored = o.obfuscate("quarterly report.pdf", &pw("password"), &opts).unwrap();
        assert!(stored.ends_with(".enc"));
        assert!(!stored.contains("quarterly"));
        assert!(!stored.contains('/') && !stored.contains('+') && !stored.contains('='));

        assert_eq!(
            o.reveal(&stored, &pw("password"), &opts, "fallback"),
            "quarterly report.pdf"
        );
    }

    #[test]
    fn test_full_mode_preserved_extension() {
        let o = obfuscator();
        let opts = FilenameEncryptionOptions::new(FilenameMode::Full).with_preserved_extensions(true);

        let stored = o.obfuscate("photo.jpeg", &pw("password"), &opts).unwrap();
        assert!(stored.ends_with(".jpeg"));
        assert_eq!(o.reveal(&stored, &pw("password"), &opts, "x"), "photo.jpeg");

        // no extension to preserve
        let bare = o.obfuscate("Makefile", &pw("password"), &opts).unwrap();
        assert!(!bare.contains('.'));
        assert_eq!(o.reveal(&bare, &pw("password"), &opts, "x"), "Makefile");
    }

    #[test]
    fn test_full_mode_wrong_password_falls_back() {
        let o = obfuscator();
        let opts = FilenameEncryptionOptions::new(FilenameMode::Full);
        let stored = o.obfuscate("secret.txt", &pw("password"), &opts).unwrap();

        assert_eq!(o.reveal(&stored, &pw("wrong"), &opts, "fallback.txt"), "fallback.txt");
    }

    #[test]
    fn test_full_mode_garbled_falls_back() {
        let o = obfuscator();
        let opts = FilenameEncryptionOptions::new(FilenameMode::Full);
        assert_eq!(o.reveal("!!!.enc", &pw("password"), &opts, "fb"), "fb");
        assert_eq!(o.reveal("AAAA.enc", &pw("password"), &opts, "fb"), "fb");
    }

    #[test]
    fn test_full_mode_is_randomized() {
        let o = obfuscator();
        let opts = FilenameEncryptionOptions::new(FilenameMode::Full);
        let a = o.obfuscate("same.txt", &pw("password"), &opts).unwrap();
        let b = o.obfuscate("same.txt", &pw("password"), &opts).unwrap();
        assert_ne!(a, b, "fresh salt and iv per name");
    }
}
