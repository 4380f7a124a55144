//! Streaming file encryption engine
//!
//! `FileCipher` turns a plaintext file into an authenticated container and
//! back. Memory use is bounded by the configured chunk size regardless of
//! file size. Each invocation derives its own key under a fresh salt and
//! nonce; nothing but the read-only configuration and key provider is
//! shared, so distinct files may be processed from different threads.

mod container;
mod progress;
mod stage;
mod stats;

pub use container::{decrypted_path, encrypted_path, Header, Layout, ENCRYPTED_SUFFIX};
pub use progress::ProgressSink;
pub use stage::Stage;
pub use stats::FileStats;

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use zeroize::Zeroizing;

use crate::config::CipherConfig;
use crate::crypto::{
    derive_key, derive_key_random_salt, random_bytes, DerivedKey, GcmDecryptor, GcmEncryptor,
    KeyFile, KeyProvider,
};
use crate::error::{CryptError, Result};
use stage::StageTracker;

/// A finished encrypt or decrypt
#[derive(Debug)]
pub struct CipherOutput {
    pub output: PathBuf,
    pub stats: FileStats,
}

/// The file encryption engine
pub struct FileCipher<K = KeyFile> {
    config: CipherConfig,
    keys: K,
}

impl FileCipher<KeyFile> {
    /// Engine reading the master key from `config.keyfile`
    pub fn from_config(config: CipherConfig) -> Result<Self> {
        let keys = KeyFile::new(config.keyfile.clone());
        Self::new(config, keys)
    }
}

impl<K: KeyProvider> FileCipher<K> {
    pub fn new(config: CipherConfig, keys: K) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, keys })
    }

    pub fn config(&self) -> &CipherConfig {
        &self.config
    }

    pub fn layout(&self) -> Layout {
        Layout {
            salt_len: self.config.salt_size_bytes,
            nonce_len: self.config.nonce_size_bytes,
        }
    }

    /// Encrypt `source` into `<source>.enc`
    ///
    /// The key is derived before the destination is created, so a bad key
    /// file leaves nothing behind. The destination is created exclusively;
    /// an existing file fails with `TargetExists` and is left untouched.
    /// After any other failure the destination is incomplete and must be
    /// discarded by the caller.
    pub fn encrypt_file(
        &self,
        source: &Path,
        progress: Option<&mut dyn ProgressSink>,
    ) -> Result<CipherOutput> {
        let destination = encrypted_path(source);
        let span = tracing::debug_span!("encrypt", file = %source.display());
        let _guard = span.enter();

        let mut stage = StageTracker::new();
        let result = self.encrypt_file_inner(source, &destination, progress, &mut stage);
        conclude("encrypted", destination, &mut stage, result)
    }

    /// Decrypt `<name>.enc` into `<name>`
    ///
    /// Returns only after the whole stream has been authenticated. On
    /// `Integrity` the destination holds unauthenticated bytes and must be
    /// discarded by the caller.
    pub fn decrypt_file(
        &self,
        source: &Path,
        progress: Option<&mut dyn ProgressSink>,
    ) -> Result<CipherOutput> {
        let destination = decrypted_path(source)?;
        let span = tracing::debug_span!("decrypt", file = %source.display());
        let _guard = span.enter();

        let mut stage = StageTracker::new();
        let result = self.decrypt_file_inner(source, &destination, progress, &mut stage);
        conclude("decrypted", destination, &mut stage, result)
    }

    /// Encrypt everything `reader` yields into a container written to `writer`,
    /// starting at the writer's current position
    pub fn encrypt_stream<R: Read, W: Write + Seek>(
        &self,
        mut reader: R,
        mut writer: W,
        progress: Option<&mut dyn ProgressSink>,
    ) -> Result<FileStats> {
        let mut stage = StageTracker::new();
        let result = self.encrypt_stream_inner(&mut reader, &mut writer, progress, &mut stage);
        conclude("encrypted", PathBuf::new(), &mut stage, result).map(|out| out.stats)
    }

    /// Authenticate and decrypt a container read from `reader`
    pub fn decrypt_stream<R: Read, W: Write>(
        &self,
        mut reader: R,
        mut writer: W,
        progress: Option<&mut dyn ProgressSink>,
    ) -> Result<FileStats> {
        let mut stage = StageTracker::new();
        let result = self.decrypt_stream_inner(&mut reader, &mut writer, progress, &mut stage);
        conclude("decrypted", PathBuf::new(), &mut stage, result).map(|out| out.stats)
    }

    fn encrypt_file_inner(
        &self,
        source: &Path,
        destination: &Path,
        progress: Option<&mut dyn ProgressSink>,
        stage: &mut StageTracker,
    ) -> Result<FileStats> {
        stage.enter(Stage::KeyDerivation);
        let (key, nonce) = self.fresh_key()?;

        let mut input = File::open(source)?;
        let total = input.metadata()?.len();
        let mut output = create_target(destination)?;

        let stats = self.seal(&key, &nonce, &mut input, &mut output, total, progress, stage)?;
        output.sync_all()?;
        Ok(stats)
    }

    fn decrypt_file_inner(
        &self,
        source: &Path,
        destination: &Path,
        progress: Option<&mut dyn ProgressSink>,
        stage: &mut StageTracker,
    ) -> Result<FileStats> {
        let mut input = File::open(source)?;
        let body_len = input
            .metadata()?
            .len()
            .saturating_sub(self.layout().header_len() as u64);
        let header = Header::read_from(&mut input, self.layout())?;

        stage.enter(Stage::KeyDerivation);
        let key = self.rederive(&header)?;
        let mut output = create_target(destination)?;

        let stats = self.open(&header, &key, &mut input, &mut output, body_len, progress, stage)?;
        output.sync_all()?;
        Ok(stats)
    }

    fn encrypt_stream_inner<R: Read, W: Write + Seek>(
        &self,
        reader: &mut R,
        writer: &mut W,
        progress: Option<&mut dyn ProgressSink>,
        stage: &mut StageTracker,
    ) -> Result<FileStats> {
        stage.enter(Stage::KeyDerivation);
        let (key, nonce) = self.fresh_key()?;
        self.seal(&key, &nonce, reader, writer, 0, progress, stage)
    }

    fn decrypt_stream_inner<R: Read, W: Write>(
        &self,
        reader: &mut R,
        writer: &mut W,
        progress: Option<&mut dyn ProgressSink>,
        stage: &mut StageTracker,
    ) -> Result<FileStats> {
        let header = Header::read_from(reader, self.layout())?;
        stage.enter(Stage::KeyDerivation);
        let key = self.rederive(&header)?;
        self.open(&header, &key, reader, writer, 0, progress, stage)
    }

    /// Fresh salt and nonce, then a key derived from the current master key
    fn fresh_key(&self) -> Result<(DerivedKey, Vec<u8>)> {
        let nonce = random_bytes(self.config.nonce_size_bytes);
        let master = self.keys.master_key()?;
        let key = derive_key_random_salt(
            master.expose(),
            self.config.salt_size_bytes,
            self.config.kdf_iterations,
            self.config.key_size_bytes,
        )?;
        Ok((key, nonce))
    }

    fn rederive(&self, header: &Header) -> Result<DerivedKey> {
        let master = self.keys.master_key()?;
        derive_key(
            master.expose(),
            &header.salt,
            self.config.kdf_iterations,
            self.config.key_size_bytes,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn seal<R: Read, W: Write + Seek>(
        &self,
        key: &DerivedKey,
        nonce: &[u8],
        reader: &mut R,
        writer: &mut W,
        total: u64,
        progress: Option<&mut dyn ProgressSink>,
        stage: &mut StageTracker,
    ) -> Result<FileStats> {
        let mut stats = FileStats::default();
        stats.record_parameters(&key.salt, nonce, &key.key);

        let start = writer.stream_position()?;
        Header::write_placeholder(writer, &key.salt, nonce)?;
        let mut gcm = GcmEncryptor::new(&key.key, nonce)?;

        stage.enter(Stage::Streaming);
        let processed = self.pump(reader, writer, total, progress, |chunk| gcm.update(chunk))?;

        stage.enter(Stage::Finalizing);
        let tag = gcm.finalize();

        // Single writer: the handle is exclusively ours for the seek-back
        let end = writer.stream_position()?;
        writer.seek(SeekFrom::Start(start))?;
        writer.write_all(&tag)?;
        writer.seek(SeekFrom::Start(end))?;
        writer.flush()?;

        stats.record_tag(&tag);
        stats.infile_size = processed;
        stats.outfile_size = end - start;
        Ok(stats)
    }

    #[allow(clippy::too_many_arguments)]
    fn open<R: Read, W: Write>(
        &self,
        header: &Header,
        key: &DerivedKey,
        reader: &mut R,
        writer: &mut W,
        total: u64,
        progress: Option<&mut dyn ProgressSink>,
        stage: &mut StageTracker,
    ) -> Result<FileStats> {
        let mut stats = FileStats::default();
        stats.record_parameters(&header.salt, &header.nonce, &key.key);
        stats.record_tag(&header.tag);

        let mut gcm = GcmDecryptor::new(&key.key, &header.nonce, &header.tag)?;

        stage.enter(Stage::Streaming);
        let processed = self.pump(reader, writer, total, progress, |chunk| gcm.update(chunk))?;
        writer.flush()?;

        stage.enter(Stage::Finalizing);
        gcm.finalize()?;

        stats.infile_size = self.layout().header_len() as u64 + processed;
        stats.outfile_size = processed;
        Ok(stats)
    }

    /// Move the stream through `transform` one chunk at a time
    fn pump<R: Read, W: Write>(
        &self,
        reader: &mut R,
        writer: &mut W,
        total: u64,
        mut progress: Option<&mut dyn ProgressSink>,
        mut transform: impl FnMut(&mut [u8]) -> Result<()>,
    ) -> Result<u64> {
        let mut buf = Zeroizing::new(vec![0u8; self.config.chunk_size()]);
        let mut processed = 0u64;

        if let Some(sink) = progress.as_deref_mut() {
            sink.start(total);
        }

        loop {
            let n = read_chunk(reader, &mut buf)?;
            if n == 0 {
                break;
            }

            transform(&mut buf[..n])?;
            writer.write_all(&buf[..n])?;
            processed += n as u64;

            if let Some(sink) = progress.as_deref_mut() {
                sink.advance(processed, total);
            }
            if n < buf.len() {
                break;
            }
        }

        if let Some(sink) = progress {
            sink.finish();
        }
        Ok(processed)
    }
}

fn conclude(
    verb: &str,
    output: PathBuf,
    stage: &mut StageTracker,
    result: Result<FileStats>,
) -> Result<CipherOutput> {
    match result {
        Ok(stats) => {
            stage.enter(Stage::Done);
            tracing::debug!("{}", stats.report());
            tracing::info!(
                output = %output.display(),
                bytes_in = stats.infile_size,
                bytes_out = stats.outfile_size,
                "{}",
                verb
            );
            Ok(CipherOutput { output, stats })
        }
        Err(e) => {
            tracing::debug!(stage = %stage.current(), error = %e, "failed");
            stage.enter(Stage::Failed);
            Err(e)
        }
    }
}

/// Create `path`, refusing to replace an existing file
fn create_target(path: &Path) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => CryptError::TargetExists(path.to_path_buf()),
            _ => CryptError::Io(e),
        })
}

/// Fill `buf` unless the reader runs dry first; returns the bytes read
fn read_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
