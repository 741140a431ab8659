//! Optional zstd pass over container payloads
//!
//! Payloads are compressed before encryption (ciphertext does not compress).
//! Whether zstd works at all is probed once per codec instead of assumed.

use tracing::{debug, warn};

use vaultpack_core::{CompressionMethod, CompressionSettings, PayloadCompression, VaultError, VaultResult};

const PROBE: &[u8] = &[1, 2, 3, 4, 5];

/// Result of probing the zstd backend with a tiny round trip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionCapability {
    available: bool,
}

impl CompressionCapability {
    pub fn probe() -> Self {
        let available = zstd::encode_all(PROBE, 1)
            .and_then(|packed| zstd::decode_all(packed.as_slice()))
            .map(|out| out == PROBE)
            .unwrap_or(false);
        if !available {
            warn!("zstd self-test failed, payload compression disabled");
        }
        debug!(available, "compression capability probed");
        Self { available }
    }

    pub fn available() -> Self {
        Self { available: true }
    }

    pub fn unavailable() -> Self {
        Self { available: false }
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Compress `data` per `settings`.
    ///
    /// Returns `None` when the settings ask for no pass, or when the backend
    /// is unavailable (with a warning); the caller stores the payload as is.
    pub fn compress(
        &self,
        data: &[u8],
        settings: &CompressionSettings,
    ) -> VaultResult<Option<(Vec<u8>, PayloadCompression)>> {
        if !settings.compresses_payload() {
            return Ok(None);
        }
        if !self.available {
            warn!("payload compression requested but unavailable, storing uncompressed");
            return Ok(None);
        }

        let packed = zstd::encode_all(data, i32::from(settings.level))
            .map_err(|e| VaultError::Format(format!("zstd compress: {e}")))?;
        let marker = PayloadCompression {
            method: CompressionMethod::Zstd,
            level: settings.level,
            compressed_size: packed.len() as u64,
        };
        Ok(Some((packed, marker)))
    }

    /// Undo [`Self::compress`], checking the recorded sizes.
    pub fn decompress(
        &self,
        data: &[u8],
        marker: &PayloadCompression,
        original_size: u64,
    ) -> VaultResult<Vec<u8>> {
        if marker.method != CompressionMethod::Zstd {
            return Err(VaultError::Format(format!(
                "unsupported payload compression {:?}",
                marker.method
            )));
        }
        if !self.available {
            return Err(VaultError::Format(
                "payload is compressed but compression is unavailable".into(),
            ));
        }
        if data.len() as u64 != marker.compressed_size {
            return Err(VaultError::Format(format!(
                "compressed payload is {} bytes, metadata says {}",
                data.len(),
                marker.compressed_size
            )));
        }

        let out = zstd::decode_all(data)
            .map_err(|e| VaultError::Format(format!("zstd decompress: {e}")))?;
        if out.len() as u64 != original_size {
            return Err(VaultError::Format(format!(
                "decompressed payload is {} bytes, metadata says {original_size}",
                out.len()
            )));
        }
        Ok(out)
    }
}
