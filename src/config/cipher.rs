//! Engine tunables

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::crypto::{DEFAULT_ITERATIONS, DEFAULT_SALT_LEN, MAX_NONCE_LEN, MIN_NONCE_LEN, STANDARD_NONCE_LEN};
use crate::error::{CryptError, Result};

pub const DEFAULT_KEYFILE: &str = "mykey";
pub const DEFAULT_CHUNK_SIZE_KBYTES: usize = 64;
pub const DEFAULT_KEY_SIZE_BYTES: usize = 32;
/// Largest accepted chunk (64 MiB); the whole chunk is held in memory
pub const MAX_CHUNK_SIZE_KBYTES: usize = 64 * 1024;

const MIN_SALT_LEN: usize = 8;
const MAX_SALT_LEN: usize = 64;

/// Per-process cipher configuration
///
/// Salt and nonce sizes are not recorded in the container, so a file can
/// only be decrypted with the configuration it was encrypted under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CipherConfig {
    /// File holding the master key; relative paths are resolved against the
    /// directory of the config file
    pub keyfile: PathBuf,
    /// Read/write granularity of the stream
    pub chunk_size_kbytes: usize,
    /// Derived key length: 16, 24 or 32 (AES-128/192/256)
    pub key_size_bytes: usize,
    pub nonce_size_bytes: usize,
    pub salt_size_bytes: usize,
    pub kdf_iterations: u32,
}

impl Default for CipherConfig {
    fn default() -> Self {
        Self {
            keyfile: PathBuf::from(DEFAULT_KEYFILE),
            chunk_size_kbytes: DEFAULT_CHUNK_SIZE_KBYTES,
            key_size_bytes: DEFAULT_KEY_SIZE_BYTES,
            nonce_size_bytes: STANDARD_NONCE_LEN,
            salt_size_bytes: DEFAULT_SALT_LEN,
            kdf_iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl CipherConfig {
    pub fn with_keyfile(mut self, keyfile: impl Into<PathBuf>) -> Self {
        self.keyfile = keyfile.into();
        self
    }

    /// Check every field; called on load and before building a cipher
    pub fn validate(&self) -> Result<()> {
        if self.keyfile.as_os_str().is_empty() {
            return Err(CryptError::config("keyfile must be set"));
        }
        if self.chunk_size_kbytes == 0 {
            return Err(CryptError::config("chunk_size_kbytes must be at least 1"));
        }
        if self.chunk_size_kbytes > MAX_CHUNK_SIZE_KBYTES {
            return Err(CryptError::config(format!(
                "chunk_size_kbytes must be at most {}, got {}",
                MAX_CHUNK_SIZE_KBYTES, self.chunk_size_kbytes
            )));
        }
        if !matches!(self.key_size_bytes, 16 | 24 | 32) {
            return Err(CryptError::config(format!(
                "key_size_bytes must be 16, 24 or 32, got {}",
                self.key_size_bytes
            )));
        }
        if !(MIN_NONCE_LEN..=MAX_NONCE_LEN).contains(&self.nonce_size_bytes) {
            return Err(CryptError::config(format!(
                "nonce_size_bytes must be between {} and {}, got {}",
                MIN_NONCE_LEN, MAX_NONCE_LEN, self.nonce_size_bytes
            )));
        }
        if !(MIN_SALT_LEN..=MAX_SALT_LEN).contains(&self.salt_size_bytes) {
            return Err(CryptError::config(format!(
                "salt_size_bytes must be between {} and {}, got {}",
                MIN_SALT_LEN, MAX_SALT_LEN, self.salt_size_bytes
            )));
        }
        if self.kdf_iterations == 0 {
            return Err(CryptError::config("kdf_iterations must be at least 1"));
        }
        Ok(())
    }

    /// Chunk size in bytes
    pub fn chunk_size(&self) -> usize {
        self.chunk_size_kbytes * 1024
    }
}

impl fmt::Display for CipherConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<20} {}", "keyfile", self.keyfile.display())?;
        writeln!(f, "{:<20} {}", "chunk_size_kbytes", self.chunk_size_kbytes)?;
        writeln!(f, "{:<20} {}", "key_size_bytes", self.key_size_bytes)?;
        writeln!(f, "{:<20} {}", "nonce_size_bytes", self.nonce_size_bytes)?;
        writeln!(f, "{:<20} {}", "salt_size_bytes", self.salt_size_bytes)?;
        write!(f, "{:<20} {}", "kdf_iterations", self.kdf_iterations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CipherConfig::default();

        config.validate().unwrap();
        assert_eq!(config.chunk_size(), 64 * 1024);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: CipherConfig =
            serde_json::from_str(r#"{ "keyfile": "/etc/backup/key", "chunk_size_kbytes": 128 }"#)
                .unwrap();

        assert_eq!(config.keyfile, PathBuf::from("/etc/backup/key"));
        assert_eq!(config.chunk_size_kbytes, 128);
        assert_eq!(config.key_size_bytes, DEFAULT_KEY_SIZE_BYTES);
        assert_eq!(config.kdf_iterations, DEFAULT_ITERATIONS);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = serde_json::from_str::<CipherConfig>(r#"{ "chunk_size_kb": 64 }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let cases = [
            CipherConfig {
                chunk_size_kbytes: 0,
                ..Default::default()
            },
            CipherConfig {
                chunk_size_kbytes: MAX_CHUNK_SIZE_KBYTES + 1,
                ..Default::default()
            },
            CipherConfig {
                chunk_size_kbytes: usize::MAX,
                ..Default::default()
            },
            CipherConfig {
                key_size_bytes: 20,
                ..Default::default()
            },
            CipherConfig {
                nonce_size_bytes: 4,
                ..Default::default()
            },
            CipherConfig {
                salt_size_bytes: 0,
                ..Default::default()
            },
            CipherConfig {
                kdf_iterations: 0,
                ..Default::default()
            },
            CipherConfig::default().with_keyfile(""),
        ];

        for config in cases {
            assert!(
                matches!(config.validate(), Err(CryptError::Config(_))),
                "{:?}",
                config
            );
        }
    }

    #[test]
    fn test_largest_chunk_accepted() {
        let config = CipherConfig {
            chunk_size_kbytes: MAX_CHUNK_SIZE_KBYTES,
            ..Default::default()
        };

        config.validate().unwrap();
        assert_eq!(config.chunk_size(), 64 * 1024 * 1024);
    }

    #[test]
    fn test_display_lists_every_field() {
        let rendered = CipherConfig::default().to_string();
        for field in [
            "keyfile",
            "chunk_size_kbytes",
            "key_size_bytes",
            "nonce_size_bytes",
            "salt_size_bytes",
            "kdf_iterations",
        ] {
            assert!(rendered.contains(field), "{}", field);
        }
    }
}
