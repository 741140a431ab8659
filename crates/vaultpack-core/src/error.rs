use thiserror::Error;

pub type VaultResult<T> = Result<T, VaultError>;

#[derive(Debug, Error)]
pub enum VaultError {
    /// Bad caller input; the operation never started.
    #[error("invalid input: {0}")]
    Input(String),

    /// The container or archive was sealed with a hardware secret and none was supplied.
    #[error("hardware key authentication required for this file")]
    HardwareKeyRequired,

    /// Wrong password, wrong hardware secret, or corrupted data. Deliberately not split.
    #[error("invalid password or corrupted file")]
    Authentication,

    #[error("format error: {0}")]
    Format(String),

    #[error("crypto provider error: {0}")]
    Provider(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VaultError {
    /// True for failures the caller can fix by re-authenticating with a hardware key.
    pub fn is_hardware_key_required(&self) -> bool {
        matches!(self, VaultError::HardwareKeyRequired)
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(e: serde_json::Error) -> Self {
        VaultError::Format(format!("json: {e}"))
    }
}
