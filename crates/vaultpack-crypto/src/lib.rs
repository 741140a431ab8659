//! vaultpack-crypto: password-sealed file containers
//!
//! Container layout (all lengths little-endian `u32`):
//! ```text
//! salt[16] | iv[12] | hwSaltLen | hwSalt[hwSaltLen] | metadataLen | metadataJSON | AES-256-GCM ciphertext+tag
//! ```
//!
//! Key derivation:
//! ```text
//! content key = PBKDF2-HMAC-SHA256(password, salt, 100k)          (standalone containers)
//!             | HKDF-SHA256(archive key, salt)                    (enhanced archives)
//!   XOR hardware key (exported from the hardware handle for hwSalt), when one was used
//! name key    = PBKDF2-HMAC-SHA256(password, name salt, 10k)      (`full` filename mode)
//! ```

pub mod container;
pub mod hardware;
pub mod hex;
pub mod kdf;
pub mod keys;
pub mod names;
pub mod provider;

pub use container::{ContainerCodec, ContainerLayout, PackedContainer, UnpackedContainer};
pub use hardware::{
    combine, CredentialFileAuthenticator, CredentialHardwareKey, HardwareAuthenticator,
    HardwareKey, HardwareSecret, RawHardwareKey,
};
pub use kdf::{derive_key, DerivedKey, KdfParams};
pub use keys::{derive_archive_file_key, EncryptionSecret, KeySource};
pub use names::{FilenameObfuscator, MAX_STORED_NAME_LEN};
pub use provider::{default_provider, CryptoProvider, RustCryptoProvider};

/// Size of a derived key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of a PBKDF2 salt
pub const SALT_SIZE: usize = 16;

/// Size of an AES-GCM nonce (96-bit)
pub const IV_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;
