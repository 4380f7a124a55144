//! PBKDF2-HMAC-SHA256 Key Derivation
//!
//! Every file gets its own AES key: the master key is stretched together
//! with a fresh random salt. The salt travels in the container header, so
//! decryption can re-derive exactly the same key.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroize;

use super::{random_bytes, SecureBytes};
use crate::error::{CryptError, Result};

/// Iteration count used by containers written with the default configuration
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Default salt length in bytes (128 bits)
pub const DEFAULT_SALT_LEN: usize = 16;

/// A derived encryption key with its associated salt
pub struct DerivedKey {
    /// The derived key material
    pub key: SecureBytes,
    /// The salt used for derivation
    pub salt: Vec<u8>,
}

impl Zeroize for DerivedKey {
    fn zeroize(&mut self) {
        self.key.zeroize();
        self.salt.zeroize();
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.zeroize();
    }
}

/// Derive a `key_len`-byte key from the master key and `salt`
///
/// # Errors
/// Returns `CryptError::Config` if the iteration count or key length is zero.
pub fn derive_key(
    master_key: &[u8],
    salt: &[u8],
    iterations: u32,
    key_len: usize,
) -> Result<DerivedKey> {
    if iterations == 0 {
        return Err(CryptError::config("KDF iteration count must be at least 1"));
    }
    if key_len == 0 {
        return Err(CryptError::config("derived key length must be at least 1 byte"));
    }

    let mut key = SecureBytes::zeroed(key_len);
    pbkdf2_hmac::<Sha256>(master_key, salt, iterations, key.as_mut_slice());

    Ok(DerivedKey {
        key,
        salt: salt.to_vec(),
    })
}

/// Derive a key under a freshly generated random salt of `salt_len` bytes
pub fn derive_key_random_salt(
    master_key: &[u8],
    salt_len: usize,
    iterations: u32,
    key_len: usize,
) -> Result<DerivedKey> {
    let salt = random_bytes(salt_len);
    derive_key(master_key, &salt, iterations, key_len)
}
