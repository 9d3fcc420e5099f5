// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Command-Line Interface Module
//!
//! Bootstrap-layer CLI handling with security-first design.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  1. parse()                          │  Parse CLI with clap
//! └─────────────────┬───────────────────┘
//!                   ↓
//! ┌─────────────────────────────────────┐
//! │  2. validate_cli()                   │  Security validation
//! └─────────────────┬───────────────────┘
//!                   ↓
//! ┌─────────────────────────────────────┐
//! │  3. ValidatedCli                     │  Safe, validated config
//! └─────────────────────────────────────┘
//! ```

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(name = "upload-engine", version, about = "Resumable, chunked large-file upload engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a layered configuration file (TOML).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the concurrency hint the Config Advisor would otherwise pick.
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload one or more files to a target endpoint.
    Upload {
        /// Files to upload.
        files: Vec<PathBuf>,
        /// Base URL of the upload endpoint.
        #[arg(long)]
        target: String,
        /// Override the chunk size, in MiB.
        #[arg(long)]
        chunk_size_mb: Option<usize>,
        /// Directory used for the local (non-durable) resume ledger when no
        /// host-native KV store is available.
        #[arg(long)]
        ledger_dir: Option<PathBuf>,
    },
    /// Resume any uploads left incomplete by a prior run. Files are
    /// re-submitted through the same fingerprint/ledger lookup as `upload`;
    /// chunks the ledger already has recorded are skipped automatically.
    Resume {
        /// Files to resume (must match the ones originally uploaded).
        files: Vec<PathBuf>,
        #[arg(long)]
        target: String,
        #[arg(long)]
        ledger_dir: Option<PathBuf>,
    },
    /// Run the Resume Ledger's garbage collector once and exit.
    Gc {
        #[arg(long)]
        ledger_dir: Option<PathBuf>,
    },
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid value for --{arg}: {reason}")]
    InvalidValue { arg: String, reason: String },
    #[error("path does not exist: {0}")]
    PathNotFound(PathBuf),
    #[error("path failed security validation: {0}")]
    UnsafePath(String),
}

/// Rejects path traversal and shell-metacharacter patterns before a string
/// ever reaches a file-system or process call.
fn validate_argument(value: &str) -> Result<(), ParseError> {
    const DANGEROUS: [&str; 6] = ["../", "..\\", "$(", "`", "|", ";"];
    for pattern in DANGEROUS {
        if value.contains(pattern) {
            return Err(ParseError::UnsafePath(format!("argument contains disallowed sequence {pattern:?}: {value}")));
        }
    }
    Ok(())
}

fn validate_existing_path(path: &Path) -> Result<PathBuf, ParseError> {
    validate_argument(&path.to_string_lossy())?;
    path.canonicalize().map_err(|_| ParseError::PathNotFound(path.to_path_buf()))
}

#[derive(Debug, Clone)]
pub struct ValidatedCli {
    pub command: ValidatedCommand,
    pub verbose: bool,
    pub config: Option<PathBuf>,
    pub concurrency: Option<usize>,
}

#[derive(Debug, Clone)]
pub enum ValidatedCommand {
    Upload { files: Vec<PathBuf>, target: String, chunk_size_mb: Option<usize>, ledger_dir: Option<PathBuf> },
    Resume { files: Vec<PathBuf>, target: String, ledger_dir: Option<PathBuf> },
    Gc { ledger_dir: Option<PathBuf> },
}

/// Parses CLI arguments with clap, then applies security validation.
pub fn parse_and_validate() -> Result<ValidatedCli, ParseError> {
    let cli = Cli::parse();
    validate_cli(cli)
}

fn validate_cli(cli: Cli) -> Result<ValidatedCli, ParseError> {
    let config = match cli.config {
        Some(path) => Some(validate_existing_path(&path)?),
        None => None,
    };

    if let Some(c) = cli.concurrency {
        if c == 0 || c > 128 {
            return Err(ParseError::InvalidValue { arg: "concurrency".to_string(), reason: "must be between 1 and 128".into() });
        }
    }

    let command = match cli.command {
        Commands::Upload { files, target, chunk_size_mb, ledger_dir } => {
            validate_argument(&target)?;
            let mut validated_files = Vec::with_capacity(files.len());
            for file in &files {
                validated_files.push(validate_existing_path(file)?);
            }
            if let Some(size) = chunk_size_mb {
                if size == 0 || size > 10 {
                    return Err(ParseError::InvalidValue {
                        arg: "chunk-size-mb".to_string(),
                        reason: "must be between 1 and 10 MiB".into(),
                    });
                }
            }
            if let Some(ref dir) = ledger_dir {
                validate_argument(&dir.to_string_lossy())?;
            }
            ValidatedCommand::Upload { files: validated_files, target, chunk_size_mb, ledger_dir }
        }
        Commands::Resume { files, target, ledger_dir } => {
            validate_argument(&target)?;
            let mut validated_files = Vec::with_capacity(files.len());
            for file in &files {
                validated_files.push(validate_existing_path(file)?);
            }
            ValidatedCommand::Resume { files: validated_files, target, ledger_dir }
        }
        Commands::Gc { ledger_dir } => ValidatedCommand::Gc { ledger_dir },
    };

    Ok(ValidatedCli { command, verbose: cli.verbose, config, concurrency: cli.concurrency })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_path_traversal_sequences() {
        assert!(validate_argument("../../etc/passwd").is_err());
        assert!(validate_argument("normal-name.bin").is_ok());
    }

    #[test]
    fn rejects_shell_metacharacters() {
        assert!(validate_argument("https://example.com`whoami`").is_err());
    }

    #[test]
    fn concurrency_out_of_range_is_rejected() {
        let cli = Cli {
            command: Commands::Gc { ledger_dir: None },
            verbose: false,
            config: None,
            concurrency: Some(0),
        };
        assert!(validate_cli(cli).is_err());
    }
}
