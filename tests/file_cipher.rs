use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use proptest::prelude::*;
use tempfile::TempDir;

use backup_crypt::cipher::encrypted_path;
use backup_crypt::crypto::{derive_key, KeyFile, MasterKey, TAG_LEN};
use backup_crypt::{CipherConfig, CryptError, FileCipher, ProgressSink};

const KEY: &str = "correct-horse-battery-staple";

/// Workspace with a key file and a fast configuration
struct Fixture {
    dir: TempDir,
    cipher: FileCipher<KeyFile>,
}

impl Fixture {
    fn new() -> Self {
        Self::with_config(|c| {
            c.chunk_size_kbytes = 1;
            c.kdf_iterations = 1_000;
        })
    }

    fn with_config(tweak: impl FnOnce(&mut CipherConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let keyfile = dir.path().join("mykey");
        fs::write(&keyfile, format!("{}\n", KEY)).unwrap();

        let mut config = CipherConfig::default().with_keyfile(&keyfile);
        tweak(&mut config);
        let cipher = FileCipher::from_config(config).unwrap();
        Self { dir, cipher }
    }

    fn file(&self, name: &str, data: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, data).unwrap();
        path
    }

    fn header_len(&self) -> usize {
        self.cipher.layout().header_len()
    }

    /// Encrypt `data`, then move the plaintext away so it can be restored
    fn encrypt(&self, name: &str, data: &[u8]) -> PathBuf {
        let source = self.file(name, data);
        let out = self.cipher.encrypt_file(&source, None).unwrap();
        fs::remove_file(&source).unwrap();
        out.output
    }
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 256) as u8).collect()
}

fn flip_bit(path: &Path, offset: usize) {
    let mut bytes = fs::read(path).unwrap();
    bytes[offset] ^= 0x01;
    fs::write(path, bytes).unwrap();
}

#[test]
fn test_roundtrip_sizes() {
    let fx = Fixture::new();
    let chunk = fx.cipher.config().chunk_size();

    for len in [0, 1, chunk - 1, chunk, chunk + 1, 3 * chunk, 5 * chunk + 17] {
        let data = pattern(len);
        let name = format!("data-{}.bin", len);
        let encrypted = fx.encrypt(&name, &data);

        assert_eq!(
            fs::metadata(&encrypted).unwrap().len() as usize,
            fx.header_len() + len
        );

        let out = fx.cipher.decrypt_file(&encrypted, None).unwrap();
        assert_eq!(out.output, fx.dir.path().join(&name));
        assert_eq!(fs::read(&out.output).unwrap(), data, "length {}", len);
    }
}

#[test]
fn test_backup_archive_scenario() {
    let fx = Fixture::with_config(|_| {});
    let data = pattern(200 * 1024);

    let source = fx.file("photos.tar", &data);
    let out = fx.cipher.encrypt_file(&source, None).unwrap();

    assert_eq!(out.output, fx.dir.path().join("photos.tar.enc"));
    assert_eq!(fs::metadata(&out.output).unwrap().len(), 16 + 16 + 12 + 204_800);
    assert_eq!(out.stats.infile_size, 204_800);
    assert_eq!(out.stats.outfile_size, 204_844);

    fs::remove_file(&source).unwrap();
    fx.cipher.decrypt_file(&out.output, None).unwrap();
    assert_eq!(fs::read(&source).unwrap(), data);
}

#[test]
fn test_container_is_standard_aes_gcm() {
    let fx = Fixture::new();
    let data = pattern(2500);
    let container = fs::read(fx.encrypt("interop.bin", &data)).unwrap();

    let (tag, rest) = container.split_at(TAG_LEN);
    let (salt, rest) = rest.split_at(16);
    let (nonce, ciphertext) = rest.split_at(12);

    let key = derive_key(KEY.as_bytes(), salt, 1_000, 32).unwrap();
    let aead = Aes256Gcm::new_from_slice(&key.key).unwrap();

    let mut sealed = ciphertext.to_vec();
    sealed.extend_from_slice(tag);
    let plain = aead.decrypt(Nonce::from_slice(nonce), sealed.as_slice()).unwrap();

    assert_eq!(plain, data);
}

#[test]
fn test_tampering_is_detected_anywhere() {
    let fx = Fixture::new();
    let data = pattern(3000);
    let header = fx.header_len();

    // tag, salt, nonce, first ciphertext byte, last ciphertext byte
    for offset in [0, 16, 32, header, header + data.len() - 1] {
        let name = format!("tamper-{}.bin", offset);
        let encrypted = fx.encrypt(&name, &data);
        flip_bit(&encrypted, offset);

        let result = fx.cipher.decrypt_file(&encrypted, None);
        assert!(
            matches!(result, Err(CryptError::Integrity)),
            "offset {}: {:?}",
            offset,
            result
        );
    }
}

#[test]
fn test_wrong_master_key_is_integrity_error() {
    let fx = Fixture::new();
    let encrypted = fx.encrypt("secret.txt", b"attack at dawn");

    let config = fx.cipher.config().clone();
    let other = FileCipher::new(config, MasterKey::new(b"a different key".to_vec()).unwrap()).unwrap();

    let result = other.decrypt_file(&encrypted, None);
    assert!(matches!(result, Err(CryptError::Integrity)));
}

#[test]
fn test_same_input_never_produces_same_container() {
    let fx = Fixture::new();
    let data = b"identical plaintext".to_vec();

    let mut first = Cursor::new(Vec::new());
    let mut second = Cursor::new(Vec::new());
    fx.cipher.encrypt_stream(data.as_slice(), &mut first, None).unwrap();
    fx.cipher.encrypt_stream(data.as_slice(), &mut second, None).unwrap();

    let (a, b) = (first.into_inner(), second.into_inner());
    assert_ne!(a[..16], b[..16], "tag");
    assert_ne!(a[16..32], b[16..32], "salt");
    assert_ne!(a[32..44], b[32..44], "nonce");
    assert_ne!(a[44..], b[44..], "ciphertext");
}

#[test]
fn test_empty_key_file_fails_before_output_exists() {
    let fx = Fixture::new();
    fs::write(fx.dir.path().join("mykey"), "  \n").unwrap();
    let source = fx.file("notes.txt", b"hello");

    let result = fx.cipher.encrypt_file(&source, None);

    assert!(matches!(result, Err(CryptError::Config(_))));
    assert!(!encrypted_path(&source).exists());
}

#[test]
fn test_missing_key_file_is_config_error() {
    let fx = Fixture::new();
    fs::remove_file(fx.dir.path().join("mykey")).unwrap();
    let source = fx.file("notes.txt", b"hello");

    assert!(matches!(
        fx.cipher.encrypt_file(&source, None),
        Err(CryptError::Config(_))
    ));
}

#[test]
fn test_rotated_key_file_is_picked_up() {
    let fx = Fixture::new();
    let encrypted = fx.encrypt("a.txt", b"old key");

    fs::write(fx.dir.path().join("mykey"), "new-master-key").unwrap();
    assert!(matches!(
        fx.cipher.decrypt_file(&encrypted, None),
        Err(CryptError::Integrity)
    ));
}

#[test]
fn test_decrypt_requires_enc_suffix() {
    let fx = Fixture::new();

    // The file does not exist: the name alone is rejected
    let result = fx.cipher.decrypt_file(&fx.dir.path().join("archive.tar"), None);
    assert!(matches!(result, Err(CryptError::Format(_))));
}

#[test]
fn test_truncated_container_is_format_error() {
    let fx = Fixture::new();
    let short = fx.file("short.enc", &[0u8; 20]);

    let result = fx.cipher.decrypt_file(&short, None);
    assert!(matches!(result, Err(CryptError::Format(_))));
    assert!(!fx.dir.path().join("short").exists());
}

#[test]
fn test_existing_target_is_never_overwritten() {
    let fx = Fixture::new();
    let source = fx.file("report.pdf", b"new data");
    let target = fx.file("report.pdf.enc", b"precious");

    let result = fx.cipher.encrypt_file(&source, None);

    assert!(matches!(result, Err(CryptError::TargetExists(ref p)) if p == &target));
    assert_eq!(fs::read(&target).unwrap(), b"precious");
}

#[test]
fn test_progress_reaches_total() {
    let fx = Fixture::new();
    let data = pattern(4 * 1024 + 100);
    let source = fx.file("big.bin", &data);

    let mut seen = Vec::new();
    {
        let mut record = |processed: u64, total: u64| seen.push((processed, total));
        let sink: &mut dyn ProgressSink = &mut record;
        fx.cipher.encrypt_file(&source, Some(sink)).unwrap();
    }

    assert_eq!(seen.len(), 5);
    assert!(seen.windows(2).all(|w| w[0].0 < w[1].0));
    assert_eq!(seen.last(), Some(&(data.len() as u64, data.len() as u64)));
}

#[test]
fn test_non_standard_parameters_roundtrip() {
    let fx = Fixture::with_config(|c| {
        c.chunk_size_kbytes = 1;
        c.kdf_iterations = 10;
        c.key_size_bytes = 16;
        c.nonce_size_bytes = 16;
        c.salt_size_bytes = 32;
    });
    let data = pattern(1500);
    let encrypted = fx.encrypt("odd.bin", &data);

    assert_eq!(fs::metadata(&encrypted).unwrap().len() as usize, 16 + 32 + 16 + 1500);

    let out = fx.cipher.decrypt_file(&encrypted, None).unwrap();
    assert_eq!(fs::read(out.output).unwrap(), data);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_stream_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..6000), chunk_kb in 1usize..4) {
        let config = CipherConfig {
            chunk_size_kbytes: chunk_kb,
            kdf_iterations: 1,
            ..Default::default()
        };
        let cipher = FileCipher::new(config, MasterKey::new(b"prop".to_vec()).unwrap()).unwrap();

        let mut container = Cursor::new(Vec::new());
        cipher.encrypt_stream(data.as_slice(), &mut container, None).unwrap();
        let container = container.into_inner();
        prop_assert_eq!(container.len(), 44 + data.len());

        let mut plain = Vec::new();
        cipher.decrypt_stream(container.as_slice(), &mut plain, None).unwrap();
        prop_assert_eq!(plain, data);
    }
}

// Some filesystems (APFS) reject names that are not valid UTF-8
#[cfg(target_os = "linux")]
#[test]
fn test_non_utf8_file_name_roundtrip() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let fx = Fixture::new();
    let source = fx.dir.path().join(OsStr::from_bytes(b"photo\xff.jpg"));
    fs::write(&source, b"raw bytes in the name").unwrap();

    let encrypted = fx.cipher.encrypt_file(&source, None).unwrap().output;
    fs::remove_file(&source).unwrap();

    let out = fx.cipher.decrypt_file(&encrypted, None).unwrap();
    assert_eq!(out.output, source);
    assert_eq!(fs::read(&source).unwrap(), b"raw bytes in the name");
}
