//! Lowercase hex helpers shared by name hashing and archive manifests

use vaultpack_core::{VaultError, VaultResult};

pub fn encode(data: &[u8]) -> String {
    let mut s = String::with_capacity(data.len() * 2);
    for byte in data {
        s.push_str(&format!("{:02x}", byte));
    }
    s
}

pub fn decode(s: &str) -> VaultResult<Vec<u8>> {
    if !s.is_ascii() || s.len() % 2 != 0 {
        return Err(VaultError::Format(format!("{s:?} is not a hex string")));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&s[i..i + 2], 16)
                .map_err(|e| VaultError::Format(format!("invalid hex: {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_is_lowercase() {
        assert_eq!(encode(&[0x00, 0xAB, 0x7f]), "00ab7f");
        assert_eq!(decode("00AB7f").unwrap(), vec![0x00, 0xAB, 0x7f]);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(decode("abc").is_err());
        assert!(decode("zz").is_err());
        assert!(decode("äb").is_err());
        assert!(decode("").unwrap().is_empty());
    }
}
