//! `backup-crypt encrypt`

use std::path::PathBuf;

use crate::cipher::{encrypted_path, FileCipher, ProgressSink};
use crate::crypto::KeyProvider;
use crate::error::Result;

use super::{run_batch, FileProgress};

pub fn run<K: KeyProvider>(cipher: &FileCipher<K>, files: &[PathBuf], progress: bool) -> Result<()> {
    run_batch(
        files,
        |file| Some(encrypted_path(file)),
        |file| {
            if progress {
                let mut bar = FileProgress::new(file);
                let sink: &mut dyn ProgressSink = &mut bar;
                cipher.encrypt_file(file, Some(sink))
            } else {
                cipher.encrypt_file(file, None)
            }
        },
    )
}
