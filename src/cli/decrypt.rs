//! `backup-crypt decrypt`

use std::path::PathBuf;

use crate::cipher::{decrypted_path, FileCipher, ProgressSink};
use crate::crypto::KeyProvider;
use crate::error::Result;

use super::{run_batch, FileProgress};

/// Names without the `.enc` suffix have no target; they fail individually
/// with a format error once the batch reaches them.
pub fn run<K: KeyProvider>(cipher: &FileCipher<K>, files: &[PathBuf], progress: bool) -> Result<()> {
    run_batch(
        files,
        |file| decrypted_path(file).ok(),
        |file| {
            if progress {
                let mut bar = FileProgress::new(file);
                let sink: &mut dyn ProgressSink = &mut bar;
                cipher.decrypt_file(file, Some(sink))
            } else {
                cipher.decrypt_file(file, None)
            }
        },
    )
}
