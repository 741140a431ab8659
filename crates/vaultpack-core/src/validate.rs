//! Input checks run before an operation starts

use crate::error::{VaultError, VaultResult};

/// Minimum password length when no config overrides it
pub const DEFAULT_MIN_PASSWORD_LEN: usize = 8;

/// Check a password (and its confirmation, when the caller collected one).
///
/// Length is counted in characters, not bytes.
pub fn validate_password(
    password: &str,
    confirmation: Option<&str>,
    min_len: usize,
) -> VaultResult<()> {
    if password.is_empty() {
        return Err(VaultError::Input("please enter a password".into()));
    }
    if password.chars().count() < min_len {
        return Err(VaultError::Input(format!(
            "password must be at least {min_len} characters long"
        )));
    }
    if let Some(confirm) = confirmation {
        if confirm != password {
            return Err(VaultError::Input("passwords do not match".into()));
        }
    }
    Ok(())
}

/// Check that a restored relative path stays inside the output directory.
///
/// Rejects absolute paths, NUL bytes, empty segments and `.`/`..` components.
/// `:` and `\` are ordinary file name characters on Unix; they are only
/// rejected on Windows, where they name drives and separate components.
pub fn validate_relative_path(path: &str) -> VaultResult<()> {
    let bad = |why: &str| Err(VaultError::Format(format!("unsafe path {path:?}: {why}")));

    if path.is_empty() {
        return bad("empty");
    }
    if path.starts_with('/') {
        return bad("absolute");
    }
    if path.contains('\0') {
        return bad("embedded NUL");
    }
    if cfg!(windows) && (path.contains('\\') || path.contains(':')) {
        return bad("drive prefix or backslash");
    }
    for segment in path.split('/') {
        match segment {
            "" => return bad("empty segment"),
            "." | ".." => return bad("relative traversal"),
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_password() {
        assert!(matches!(
            validate_password("", None, 8),
            Err(VaultError::Input(_))
        ));
    }

    #[test]
    fn test_short_password() {
        assert!(validate_password("short", None, 8).is_err());
        assert!(validate_password("long-enough", None, 8).is_ok());
    }

    #[test]
    fn test_length_counts_chars() {
        // 4 chars, 8 bytes
        assert!(validate_password("ääää", None, 5).is_err());
        assert!(validate_password("ääää", None, 4).is_ok());
    }

    #[test]
    fn test_mismatched_confirmation() {
        let err = validate_password("correct-horse", Some("correct-hose"), 8).unwrap_err();
        assert!(err.to_string().contains("do not match"));
        assert!(validate_password("correct-horse", Some("correct-horse"), 8).is_ok());
    }

    #[test]
    fn test_relative_paths() {
        assert!(validate_relative_path("docs/a.txt").is_ok());
        assert!(validate_relative_path("a.txt").is_ok());
        assert!(validate_relative_path("../etc/passwd").is_err());
        assert!(validate_relative_path("docs/../../x").is_err());
        assert!(validate_relative_path("/etc/passwd").is_err());
        assert!(validate_relative_path("docs//a").is_err());
        assert!(validate_relative_path("docs/./a").is_err());
        assert!(validate_relative_path("a\0b").is_err());
        assert!(validate_relative_path("").is_err());
    }

    #[cfg(not(windows))]
    #[test]
    fn test_unix_names_with_colon_and_backslash() {
        assert!(validate_relative_path("meeting 10:30.txt").is_ok());
        assert!(validate_relative_path("notes/a\\b.md").is_ok());
        assert!(validate_relative_path("C:/x").is_ok());
    }

    #[cfg(windows)]
    #[test]
    fn test_windows_rejects_drive_and_backslash() {
        assert!(validate_relative_path("C:/x").is_err());
        assert!(validate_relative_path("docs\\..\\x").is_err());
    }
}
