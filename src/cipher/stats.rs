//! Per-file diagnostics, rendered only at debug level

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use zeroize::Zeroizing;

/// Parameters and sizes of one encrypt/decrypt run
///
/// The derived key is only captured when debug logging is enabled, and
/// `Debug` never prints it. `report` does; it is meant for `debug!` only.
#[derive(Default, Clone)]
pub struct FileStats {
    pub salt: String,
    pub nonce: String,
    pub tag: String,
    pub key: Option<Zeroizing<String>>,
    pub infile_size: u64,
    pub outfile_size: u64,
}

impl FileStats {
    pub(crate) fn record_parameters(&mut self, salt: &[u8], nonce: &[u8], key: &[u8]) {
        self.salt = STANDARD.encode(salt);
        self.nonce = STANDARD.encode(nonce);
        if tracing::enabled!(tracing::Level::DEBUG) {
            self.key = Some(Zeroizing::new(STANDARD.encode(key)));
        }
    }

    pub(crate) fn record_tag(&mut self, tag: &[u8]) {
        self.tag = STANDARD.encode(tag);
    }

    /// Multi-line report including the derived key
    pub fn report(&self) -> String {
        let rule = "=".repeat(76);
        let key = self.key.as_ref().map_or("-", |k| k.as_str());
        format!(
            "\n{rule}\n{:<15} {}\n{:<15} {}\n{:<15} {}\n{:<15} {}\n{:<15} {}\n{:<15} {}\n{rule}",
            "salt",
            self.salt,
            "nonce",
            self.nonce,
            "key",
            key,
            "tag",
            self.tag,
            "infile_size",
            self.infile_size,
            "outfile_size",
            self.outfile_size,
        )
    }
}

impl fmt::Debug for FileStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStats")
            .field("salt", &self.salt)
            .field("nonce", &self.nonce)
            .field("tag", &self.tag)
            .field("key", &self.key.as_ref().map(|_| "[REDACTED]"))
            .field("infile_size", &self.infile_size)
            .field("outfile_size", &self.outfile_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats_with_key() -> FileStats {
        FileStats {
            salt: "c2FsdA==".into(),
            key: Some(Zeroizing::new("c2VjcmV0LWtleQ==".into())),
            infile_size: 10,
            outfile_size: 54,
            ..Default::default()
        }
    }

    #[test]
    fn test_debug_redacts_key() {
        let rendered = format!("{:?}", stats_with_key());

        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("c2VjcmV0LWtleQ=="));
    }

    #[test]
    fn test_report_lists_everything() {
        let report = stats_with_key().report();

        assert!(report.contains("c2VjcmV0LWtleQ=="));
        assert!(report.contains("infile_size"));
        assert!(report.contains("54"));
    }

    #[test]
    fn test_key_not_captured_without_debug_subscriber() {
        let mut stats = FileStats::default();
        stats.record_parameters(b"salt", b"nonce", b"key");

        assert_eq!(stats.salt, "c2FsdA==");
        assert!(stats.key.is_none());
    }
}
