//! Configuration management for backup-crypt
//!
//! Handles:
//! - Cipher tunables (chunk size, key/nonce/salt sizes, KDF iterations)
//! - Locating, loading and writing the JSON config file
//! - Writing generated master key files

mod cipher;
mod storage;

pub use cipher::{
    CipherConfig, DEFAULT_CHUNK_SIZE_KBYTES, DEFAULT_KEYFILE, DEFAULT_KEY_SIZE_BYTES,
    MAX_CHUNK_SIZE_KBYTES,
};
pub use storage::{
    config_to_json, default_config_path, load_config, resolve_config_path, save_config,
    write_key_file, CONFIG_ENV,
};
