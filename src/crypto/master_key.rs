//! Master key handling
//!
//! The master key is a secret string kept in a protected file. It is never
//! used as an AES key directly; every file gets a key derived from it (see
//! `kdf`). Providers hand out a fresh copy on every call so a rotated key
//! file is picked up by the next file in a batch.

use std::fs;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use secrecy::{ExposeSecret, SecretVec};
use zeroize::Zeroize;

use super::random_bytes;
use crate::error::{CryptError, Result};

/// Random bytes behind a generated master key (256 bits)
pub const GENERATED_KEY_BYTES: usize = 32;

/// The master secret, already stripped of surrounding whitespace
pub struct MasterKey(SecretVec<u8>);

impl MasterKey {
    /// # Errors
    /// `CryptError::Config` if `bytes` is empty.
    pub fn new(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(CryptError::config("master key is empty"));
        }
        Ok(Self(SecretVec::new(bytes)))
    }

    /// Read the key file, trimming surrounding whitespace (a trailing newline
    /// left by an editor is not part of the key)
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut raw = fs::read(path).map_err(|e| {
            CryptError::config(format!("cannot read key file {}: {}", path.display(), e))
        })?;

        let key = trim_ascii_whitespace(&raw).to_vec();
        raw.zeroize();

        if key.is_empty() {
            return Err(CryptError::config(format!(
                "key file {} is empty",
                path.display()
            )));
        }

        warn_if_exposed(path);
        Self::new(key)
    }

    pub fn expose(&self) -> &[u8] {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey([REDACTED])")
    }
}

/// Source of the master key for each file operation
pub trait KeyProvider {
    fn master_key(&self) -> Result<MasterKey>;
}

/// Reads the master key from disk on every request
#[derive(Debug, Clone)]
pub struct KeyFile {
    path: PathBuf,
}

impl KeyFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl KeyProvider for KeyFile {
    fn master_key(&self) -> Result<MasterKey> {
        tracing::trace!(keyfile = %self.path.display(), "reading master key");
        MasterKey::from_file(&self.path)
    }
}

/// An in-memory key, for embedding callers that manage the secret themselves
impl KeyProvider for MasterKey {
    fn master_key(&self) -> Result<MasterKey> {
        MasterKey::new(self.expose().to_vec())
    }
}

/// Generate a new master key: 32 random bytes as unpadded URL-safe base64
/// (43 characters, safe to paste into a key file)
pub fn generate_master_key() -> String {
    let mut bytes = random_bytes(GENERATED_KEY_BYTES);
    let encoded = URL_SAFE_NO_PAD.encode(&bytes);
    bytes.zeroize();
    encoded
}

fn trim_ascii_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}

#[cfg(unix)]
fn warn_if_exposed(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Ok(meta) = fs::metadata(path) {
        if meta.permissions().mode() & 0o077 != 0 {
            tracing::warn!(
                keyfile = %path.display(),
                "key file is readable by group or others; consider chmod 600"
            );
        }
    }
}

#[cfg(not(unix))]
fn warn_if_exposed(_path: &Path) {}
