//! Backup Crypt - streaming authenticated file encryption for backups
//!
//! This crate provides:
//! - Per-file keys derived from a master key file with PBKDF2-HMAC-SHA256
//! - AES-GCM encryption in bounded-memory chunks, with one tag per file
//! - A self-describing `.enc` container: `tag || salt || nonce || ciphertext`
//! - A JSON configuration file and a command line front end

pub mod cipher;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod error;

pub use cipher::{CipherOutput, FileCipher, FileStats, ProgressSink, Stage};
pub use config::CipherConfig;
pub use error::{CryptError, Result};
