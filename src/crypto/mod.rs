//! Cryptographic primitives for backup-crypt
//!
//! This module provides:
//! - PBKDF2-HMAC-SHA256 for per-file key derivation
//! - Incremental AES-GCM for authenticated streaming encryption
//! - Master key loading and generation
//! - Secure memory handling with automatic zeroing

mod gcm;
mod kdf;
mod master_key;
mod secure_bytes;

pub use gcm::{
    GcmDecryptor, GcmEncryptor, MAX_NONCE_LEN, MIN_NONCE_LEN, STANDARD_NONCE_LEN, TAG_LEN,
};
pub use kdf::{derive_key, derive_key_random_salt, DerivedKey, DEFAULT_ITERATIONS, DEFAULT_SALT_LEN};
pub use master_key::{generate_master_key, KeyFile, KeyProvider, MasterKey, GENERATED_KEY_BYTES};
pub use secure_bytes::SecureBytes;

use rand::rngs::OsRng;
use rand::RngCore;

/// `len` bytes from the operating system RNG
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes
}
