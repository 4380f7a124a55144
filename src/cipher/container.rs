//! Container layout and naming
//!
//! ```text
//! [16 bytes: auth tag][salt_size_bytes: salt][nonce_size_bytes: nonce][ciphertext]
//! ```
//!
//! The tag comes first but is only known once the whole plaintext has been
//! processed, so the writer reserves it with zeros and patches it in place.

use std::ffi::{OsStr, OsString};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::crypto::TAG_LEN;
use crate::error::{CryptError, Result};

/// Suffix appended to encrypted files
pub const ENCRYPTED_SUFFIX: &str = ".enc";

/// `<source>.enc`
pub fn encrypted_path(source: &Path) -> PathBuf {
    let mut name = OsString::from(source.as_os_str());
    name.push(ENCRYPTED_SUFFIX);
    PathBuf::from(name)
}

/// `<source>` without its `.enc` suffix
///
/// # Errors
/// `CryptError::Format` if the name does not end in `.enc` or nothing is
/// left of the file name once the suffix is removed.
pub fn decrypted_path(source: &Path) -> Result<PathBuf> {
    let unrecognized = || {
        CryptError::format(format!(
            "unrecognized extension, expected '{}': {}",
            ENCRYPTED_SUFFIX,
            source.display()
        ))
    };

    // Compared on the raw name: a file name need not be valid UTF-8
    let suffix = OsStr::new(&ENCRYPTED_SUFFIX[1..]);
    if source.extension() != Some(suffix) {
        return Err(unrecognized());
    }
    match source.file_stem() {
        Some(stem) if stem != "." && stem != ".." => Ok(source.with_extension("")),
        _ => Err(unrecognized()),
    }
}

/// Field sizes of the container header, fixed per process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub salt_len: usize,
    pub nonce_len: usize,
}

impl Layout {
    pub fn header_len(&self) -> usize {
        TAG_LEN + self.salt_len + self.nonce_len
    }
}

/// A parsed container header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub tag: [u8; TAG_LEN],
    pub salt: Vec<u8>,
    pub nonce: Vec<u8>,
}

impl Header {
    /// Write the zero tag placeholder followed by salt and nonce
    pub fn write_placeholder<W: Write>(writer: &mut W, salt: &[u8], nonce: &[u8]) -> Result<()> {
        writer.write_all(&[0u8; TAG_LEN])?;
        writer.write_all(salt)?;
        writer.write_all(nonce)?;
        Ok(())
    }

    /// Read a header laid out as `layout`
    ///
    /// # Errors
    /// `CryptError::Format` if the input ends before the header does.
    pub fn read_from<R: Read>(reader: &mut R, layout: Layout) -> Result<Self> {
        let mut tag = [0u8; TAG_LEN];
        let mut salt = vec![0u8; layout.salt_len];
        let mut nonce = vec![0u8; layout.nonce_len];

        read_field(reader, &mut tag, layout)?;
        read_field(reader, &mut salt, layout)?;
        read_field(reader, &mut nonce, layout)?;

        Ok(Self { tag, salt, nonce })
    }
}

fn read_field<R: Read>(reader: &mut R, buf: &mut [u8], layout: Layout) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => CryptError::format(format!(
            "file is shorter than the {}-byte container header",
            layout.header_len()
        )),
        _ => CryptError::Io(e),
    })
}
