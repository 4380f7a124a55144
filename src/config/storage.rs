//! Config and key files on disk
//!
//! The config is a small JSON document. Both it and generated key files are
//! created with 0600 permissions on Unix and are never overwritten unless
//! the caller asks for it.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{CryptError, Result};

use super::CipherConfig;

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "BACKUP_CRYPT_CONFIG";

const APP_DIR: &str = "backup-crypt";
const CONFIG_FILE: &str = "config.json";

/// `<platform config dir>/backup-crypt/config.json`
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
        .ok_or_else(|| CryptError::config("cannot determine the user config directory"))
}

/// Explicit path if given, otherwise the platform default
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => default_config_path(),
    }
}

/// Load and validate the config; a relative `keyfile` is resolved against
/// the config file's directory
pub fn load_config(path: &Path) -> Result<CipherConfig> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(CryptError::config(format!(
                "config file {} not found; run 'backup-crypt config init' first",
                path.display()
            )));
        }
        Err(e) => return Err(e.into()),
    };

    let mut config: CipherConfig = serde_json::from_str(&content)?;
    if config.keyfile.is_relative() {
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.keyfile = base.join(&config.keyfile);
    }

    config.validate()?;
    tracing::debug!(config = %path.display(), "loaded configuration");
    Ok(config)
}

/// Serialize the config as pretty JSON
pub fn config_to_json(config: &CipherConfig) -> Result<String> {
    Ok(serde_json::to_string_pretty(config)?)
}

/// Write the config to `path`, creating parent directories
pub fn save_config(path: &Path, config: &CipherConfig, force: bool) -> Result<()> {
    config.validate()?;
    let mut json = config_to_json(config)?;
    json.push('\n');
    write_private(path, json.as_bytes(), force)
}

/// Write a master key to `path` with owner-only permissions
pub fn write_key_file(path: &Path, key: &str, force: bool) -> Result<()> {
    let mut contents = key.to_string();
    contents.push('\n');
    let result = write_private(path, contents.as_bytes(), force);
    zeroize::Zeroize::zeroize(&mut contents);
    result
}

fn write_private(path: &Path, contents: &[u8], force: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut file = open_for_write(path, force)?;
    file.write_all(contents)?;
    file.sync_all()?;

    // Set restrictive permissions on Unix
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

fn open_for_write(path: &Path, force: bool) -> Result<File> {
    let mut options = OpenOptions::new();
    options.write(true);
    if force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    options.open(path).map_err(|e| match e.kind() {
        ErrorKind::AlreadyExists => CryptError::TargetExists(path.to_path_buf()),
        _ => CryptError::Io(e),
    })
}
