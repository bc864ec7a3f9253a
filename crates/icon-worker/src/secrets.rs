//! Secret resolution for credentials supplied through the environment.
//!
//! Secrets are resolved in priority order:
//!
//! 1. **Direct value** - e.g. `DB_PASSWORD=postgres`
//! 2. **File reference** - Docker/Kubernetes secrets pattern, e.g.
//!    `DB_PASSWORD_FILE=/run/secrets/db_password`
//! 3. **Default** - the local-development value, when the caller has one

use secrecy::SecretString;
use std::fs;

/// Error type for secret resolution failures.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source provided (need a direct value or a file path)")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for secret resolution.
pub type Result<T> = std::result::Result<T, SecretError>;

/// Resolves a secret from a direct value or a file, in that order.
///
/// Empty strings count as "not provided". File contents are trimmed so a
/// trailing newline written by `echo` does not end up in the credential.
///
/// # Examples
///
/// ```ignore
/// use icon_worker::secrets::resolve_secret;
///
/// // Direct value takes priority
/// let secret = resolve_secret(Some("postgres"), Some("/run/secrets/db_password"))?;
///
/// // File path used if no direct value
/// let secret = resolve_secret(None, Some("~/.secrets/db_password"))?;
/// ```
pub fn resolve_secret(direct: Option<&str>, file_path: Option<&str>) -> Result<SecretString> {
    // Priority 1: Direct value
    if let Some(value) = direct {
        if !value.is_empty() {
            return Ok(SecretString::from(value.to_string()));
        }
    }

    // Priority 2: File
    if let Some(path) = file_path {
        if !path.is_empty() {
            let expanded = expand_home(path);
            return match fs::read_to_string(&expanded) {
                Ok(content) => Ok(SecretString::from(content.trim().to_string())),
                Err(e) => Err(SecretError::FileReadError {
                    path: expanded,
                    source: e,
                }),
            };
        }
    }

    Err(SecretError::NoSourceProvided)
}

/// Resolves a secret, falling back to `default` when neither source is set.
///
/// An unreadable file is still an error, never a fallback to `default`.
pub fn resolve_secret_or(
    direct: Option<&str>,
    file_path: Option<&str>,
    default: &str,
) -> Result<SecretString> {
    match resolve_secret(direct, file_path) {
        Ok(secret) => Ok(secret),
        Err(SecretError::NoSourceProvided) => Ok(SecretString::from(default.to_string())),
        Err(e) => Err(e),
    }
}

/// Expands `~` to the user's home directory.
///
/// Only `~` and `~/path` are supported, not `~user/path`.
fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
            if path == "~" {
                return home.to_string_lossy().into_owned();
            }
            return path.replacen("~", &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}
