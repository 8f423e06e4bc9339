//! CLI argument definitions for bytecheck
//!
//! Uses clap for argument parsing. This module defines all subcommands
//! and their options.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// bytecheck - attested integrity manifests for directory trees
///
/// Generates, verifies, and manages per-directory manifest files that
/// chain a whole tree together through checksums over child manifests.
#[derive(Parser, Debug)]
#[command(name = "bytecheck")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate and write manifest files recursively
    #[command(after_help = "EXAMPLES:
    # Attest the current directory tree, unsigned
    bytecheck generate

    # Reuse manifests newer than one hour
    bytecheck generate --freshness-interval 1h ./data

    # Seal manifests with a signing key bound to a GitHub identity
    bytecheck generate --private-key ~/.ssh/id_ed25519 --auditor-reference github:alice ./data
")]
    Generate(GenerateArgs),

    /// Verify manifest files recursively
    #[command(after_help = "EXAMPLES:
    # Verify the current directory tree
    bytecheck verify

    # Skip directories whose manifests are newer than ten minutes
    bytecheck verify --freshness-interval 10m ./data
")]
    Verify(VerifyArgs),

    /// Remove all manifest files recursively
    #[command(after_help = "EXAMPLES:
    # Remove every manifest under the current directory
    bytecheck clean

    # Remove manifests under a specific tree
    bytecheck clean ./data
")]
    Clean(CleanArgs),

    /// Generate an ed25519 signing key pair in OpenSSH format
    #[command(after_help = "EXAMPLES:
    # Write ./id_ed25519 and ./id_ed25519.pub
    bytecheck keygen

    # Pick a path and overwrite an existing key
    bytecheck keygen --output ~/.config/bytecheck/signing-key --force
")]
    Keygen(KeygenArgs),
}

#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Directory to attest (defaults to the current directory)
    pub directory: Option<PathBuf>,

    /// Reuse manifests not older than this interval (e.g. 5s, 10m, 24h)
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub freshness_interval: Option<Duration>,

    /// Path to an ed25519 private key; enables auditor-sealed manifests
    #[arg(long, value_name = "PATH", requires = "auditor_reference")]
    pub private_key: Option<PathBuf>,

    /// Auditor identity reference, e.g. 'github:alice' or 'custom:build-bot'
    #[arg(long, value_name = "SCHEME:ID")]
    pub auditor_reference: Option<String>,
}

#[derive(Parser, Debug)]
pub struct VerifyArgs {
    /// Directory to verify (defaults to the current directory)
    pub directory: Option<PathBuf>,

    /// Skip directories whose manifest is not older than this interval
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub freshness_interval: Option<Duration>,
}

#[derive(Parser, Debug)]
pub struct CleanArgs {
    /// Directory to clean (defaults to the current directory)
    pub directory: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct KeygenArgs {
    /// Private key output path; the public key lands at '<path>.pub'
    #[arg(long, value_name = "PATH", default_value = "id_ed25519")]
    pub output: PathBuf,

    /// Comment embedded in the public key file
    #[arg(long, value_name = "TEXT", default_value = "")]
    pub comment: String,

    /// Overwrite existing key files
    #[arg(long)]
    pub force: bool,
}
