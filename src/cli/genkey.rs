//! Master key generation

use std::path::Path;

use colored::Colorize;
use zeroize::Zeroize;

use crate::config::write_key_file;
use crate::crypto::generate_master_key;
use crate::error::Result;

/// Print a new master key, or store it in `output` with owner-only permissions
pub fn run(output: Option<&Path>, force: bool) -> Result<()> {
    let mut key = generate_master_key();

    let result = match output {
        Some(path) => write_key_file(path, &key, force).map(|()| {
            println!("{} Master key written to {}", "Done:".green().bold(), path.display());
            println!(
                "{}",
                "Keep a copy somewhere safe: files encrypted with it cannot be recovered without it."
                    .yellow()
            );
        }),
        None => {
            println!("{}", key);
            Ok(())
        }
    };

    key.zeroize();
    result
}
