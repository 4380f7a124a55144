use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use backup_crypt::cli::{self, LogLevel};
use backup_crypt::config;
use backup_crypt::{FileCipher, Result};

#[derive(Parser)]
#[command(name = "backup-crypt")]
#[command(author = "Oleg")]
#[command(version)]
#[command(about = "Streaming AES-GCM encryption for backup files", long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/backup-crypt/config.json)
    #[arg(long, global = true, env = config::CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Shorthand for --loglevel debug; prints per-file parameters
    #[arg(long, global = true)]
    debug: bool,

    /// Log verbosity; RUST_LOG takes precedence
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Warn)]
    loglevel: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt files into <file>.enc
    Encrypt {
        /// Show a progress bar per file
        #[arg(long)]
        progress: bool,

        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Decrypt <file>.enc files
    Decrypt {
        /// Show a progress bar per file
        #[arg(long)]
        progress: bool,

        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Generate a new master key
    Genkey {
        /// Write the key to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing key file
        #[arg(long, requires = "output")]
        force: bool,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a default configuration
    Init {
        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,

        /// Print to stdout instead of writing the file
        #[arg(long, conflicts_with = "force")]
        stdout: bool,
    },
    /// Show the effective configuration
    Show,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.debug { LogLevel::Debug } else { cli.loglevel };
    cli::init_logging(level);

    let result = run(cli);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config_path = config::resolve_config_path(cli.config.as_deref())?;

    match cli.command {
        Commands::Encrypt { progress, files } => {
            let cipher = load_cipher(&config_path)?;
            cli::encrypt::run(&cipher, &files, progress)
        }
        Commands::Decrypt { progress, files } => {
            let cipher = load_cipher(&config_path)?;
            cli::decrypt::run(&cipher, &files, progress)
        }
        Commands::Genkey { output, force } => cli::genkey::run(output.as_deref(), force),
        Commands::Config { action } => match action {
            ConfigCommands::Init { force, stdout } => cli::config::init(&config_path, force, stdout),
            ConfigCommands::Show => cli::config::show(&config_path),
        },
    }
}

fn load_cipher(config_path: &Path) -> Result<FileCipher> {
    let config = config::load_config(config_path)?;
    FileCipher::from_config(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::ffi::OsStr;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_config_flag_reads_environment() {
        let cmd = Cli::command();
        let arg = cmd
            .get_arguments()
            .find(|a| a.get_id() == "config")
            .unwrap();

        assert_eq!(arg.get_env(), Some(OsStr::new(config::CONFIG_ENV)));
    }
}
