//! `backup-crypt config`

use std::path::Path;

use colored::Colorize;

use crate::config::{config_to_json, load_config, save_config, CipherConfig};
use crate::error::Result;

/// Write the default configuration to `path`, or print it
pub fn init(path: &Path, force: bool, stdout: bool) -> Result<()> {
    let defaults = CipherConfig::default();

    if stdout {
        println!("{}", config_to_json(&defaults)?);
        return Ok(());
    }

    save_config(path, &defaults, force)?;
    println!("{} Configuration written to {}", "Done:".green().bold(), path.display());

    let keyfile = path
        .parent()
        .map(|dir| dir.join(&defaults.keyfile))
        .unwrap_or_else(|| defaults.keyfile.clone());
    if !keyfile.exists() {
        println!();
        println!(
            "Create the master key with {}",
            format!("backup-crypt genkey --output {}", keyfile.display()).cyan()
        );
    }
    Ok(())
}

/// Print the effective configuration
pub fn show(path: &Path) -> Result<()> {
    let config = load_config(path)?;

    println!("{} {}", "Configuration:".cyan().bold(), path.display());
    println!("{}", "─".repeat(60).dimmed());
    println!("{}", config);
    println!("{}", "─".repeat(60).dimmed());
    Ok(())
}
