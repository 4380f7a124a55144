//! Command implementations

pub mod config;
pub mod decrypt;
pub mod encrypt;
pub mod genkey;
mod progress;

pub use progress::FileProgress;

use std::path::{Path, PathBuf};

use colored::Colorize;

use crate::cipher::CipherOutput;
use crate::error::{CryptError, Result};

/// Verbosity of the stderr log
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Install the global subscriber; `RUST_LOG` wins over `level`
pub fn init_logging(level: LogLevel) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

/// Run `process` over every file
///
/// Nothing is touched if any target already exists. Afterwards a failing
/// file does not stop the batch; its incomplete output is removed and the
/// failure counted.
pub(crate) fn run_batch<T, P>(files: &[PathBuf], target: T, mut process: P) -> Result<()>
where
    T: Fn(&Path) -> Option<PathBuf>,
    P: FnMut(&Path) -> Result<CipherOutput>,
{
    let existing: Vec<PathBuf> = files
        .iter()
        .filter_map(|file| target(file))
        .filter(|t| t.exists())
        .collect();

    if let Some(first) = existing.first() {
        for path in &existing {
            eprintln!("{} {} already exists", "Refusing:".yellow().bold(), path.display());
        }
        return Err(CryptError::TargetExists(first.clone()));
    }

    let mut failed = 0;
    for file in files {
        let destination = target(file);
        let existed = destination.as_deref().is_some_and(Path::exists);

        match process(file) {
            Ok(out) => {
                println!("{} {} -> {}", "ok".green().bold(), file.display(), out.output.display());
            }
            Err(e) => {
                failed += 1;
                eprintln!("{} {}: {}", "failed".red().bold(), file.display(), e);

                // TargetExists: the file at the destination belongs to someone else
                if matches!(e, CryptError::TargetExists(_)) {
                    continue;
                }
                if let Some(partial) = destination.filter(|p| !existed && p.exists()) {
                    remove_partial(&partial);
                }
            }
        }
    }

    if failed > 0 {
        return Err(CryptError::BatchFailed {
            failed,
            total: files.len(),
        });
    }
    Ok(())
}

fn remove_partial(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(file = %path.display(), "removed incomplete output"),
        Err(e) => tracing::warn!(file = %path.display(), error = %e, "cannot remove incomplete output"),
    }
}
