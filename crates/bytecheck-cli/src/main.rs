//! bytecheck CLI - generate, verify, and manage attested directory
//! manifests.

mod cli;
mod output;
mod progress;

use bytecheck::{
    BytecheckError, Config, Generator, MultiSourceVerifier, Result, Scanner, ScannerOptions,
    Signer, SignerError, Verifier,
};
use clap::Parser;
use cli::{CleanArgs, Cli, Commands, GenerateArgs, KeygenArgs, VerifyArgs};
use progress::ProgressMonitor;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Capacity of the progress snapshot channel; producers drop on full.
const PROGRESS_BUFFER: usize = 10;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            error!("{}", err);
            eprintln!("bytecheck: {err}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Generate(args) => run_generate(args).map(|()| 0),
        Commands::Verify(args) => run_verify(args),
        Commands::Clean(args) => run_clean(args),
        Commands::Keygen(args) => run_keygen(args).map(|()| 0),
    }
}

fn target_directory(directory: Option<PathBuf>) -> PathBuf {
    directory.unwrap_or_else(|| PathBuf::from("."))
}

/// Resolve the signer from CLI flags. No key selects the no-op signer
/// and with it the unsigned pipeline. A security-key `.pub` beside the
/// private key selects the `ssh-keygen`-delegating signer; anything else
/// is loaded as a plain ed25519 key file.
fn load_signer(
    private_key: Option<&Path>,
    auditor_reference: Option<&str>,
) -> std::result::Result<Box<dyn Signer>, SignerError> {
    let Some(key_path) = private_key else {
        return Ok(Box::new(bytecheck::NoopSigner::new()));
    };
    let reference = auditor_reference.ok_or_else(|| {
        SignerError::Failure("an auditor reference is required when signing".to_string())
    })?;

    match bytecheck::SshKeygenSigner::new(key_path, reference) {
        Ok(signer) => Ok(Box::new(signer)),
        Err(_) => Ok(Box::new(bytecheck::Ed25519Signer::from_openssh_file(
            key_path, reference,
        )?)),
    }
}

fn run_generate(args: GenerateArgs) -> Result<()> {
    let config = Config::from_env();
    let target = target_directory(args.directory);
    let signer = load_signer(args.private_key.as_deref(), args.auditor_reference.as_deref())?;

    let (sender, receiver) = mpsc::sync_channel(PROGRESS_BUFFER);
    let scanner = Scanner::new(ScannerOptions {
        freshness_limit: args.freshness_interval,
        progress: Some(sender),
        ..ScannerOptions::default()
    });
    let monitor = ProgressMonitor::spawn(receiver);

    let mut generator = Generator::new(&scanner, signer.as_ref(), &config.hmac_key);
    let result = generator.run(&target);
    monitor.finish();
    result?;

    output::print_generate_summary(&scanner.stats().snapshot(), generator.generated());
    Ok(())
}

fn run_verify(args: VerifyArgs) -> Result<i32> {
    let config = Config::from_env();
    let target = target_directory(args.directory);
    let trust = MultiSourceVerifier::with_default_sources(&config);

    let (sender, receiver) = mpsc::sync_channel(PROGRESS_BUFFER);
    let scanner = Scanner::new(ScannerOptions {
        freshness_limit: args.freshness_interval,
        progress: Some(sender),
        ..ScannerOptions::default()
    });
    let monitor = ProgressMonitor::spawn(receiver);

    let verifier = Verifier::new(&scanner, &trust, &config.hmac_key);
    let result = verifier.run(&target);
    monitor.finish();
    let report = result?;

    output::print_verify_report(&report);
    Ok(if report.all_valid() { 0 } else { 1 })
}

fn run_clean(args: CleanArgs) -> Result<i32> {
    let target = target_directory(args.directory);
    let cancel = bytecheck::CancelFlag::new();
    let mut removed: u64 = 0;
    let mut errors: u64 = 0;

    bytecheck::walk_post_order(&target, &cancel, &mut |dir| {
        let manifest_path = dir.join(bytecheck::DEFAULT_MANIFEST_NAME);
        match std::fs::remove_file(&manifest_path) {
            Ok(()) => {
                println!("removed: {}", manifest_path.display());
                removed += 1;
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                eprintln!("could not remove {}: {err}", manifest_path.display());
                errors += 1;
            }
        }
        Ok(())
    })?;

    output::print_clean_summary(removed, errors);
    Ok(if errors == 0 { 0 } else { 1 })
}

fn run_keygen(args: KeygenArgs) -> Result<()> {
    let pub_path = bytecheck::signing::openssh::public_key_path(&args.output);
    if !args.force && (args.output.exists() || pub_path.exists()) {
        return Err(BytecheckError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!(
                "key file {} already exists (use --force to overwrite)",
                args.output.display()
            ),
        )));
    }

    bytecheck::signing::openssh::generate_keypair(&args.output, &args.comment)?;
    output::print_success(&format!(
        "wrote {} and {}",
        args.output.display(),
        pub_path.display()
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_signer_without_key_is_noop() {
        let signer = load_signer(None, None).unwrap();
        assert!(matches!(
            signer.sign(b"probe"),
            Err(SignerError::NotImplemented)
        ));
    }

    #[test]
    fn load_signer_requires_reference() {
        let result = load_signer(Some(Path::new("/tmp/key")), None);
        assert!(matches!(result, Err(SignerError::Failure(_))));
    }

    #[test]
    fn load_signer_with_plain_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("id_ed25519");
        bytecheck::signing::openssh::generate_keypair(&key_path, "").unwrap();

        let signer = load_signer(Some(&key_path), Some("github:alice")).unwrap();
        assert_eq!(signer.reference(), "github:alice");
        assert_eq!(signer.sign(b"data").unwrap().len(), 64);
    }

    #[test]
    fn target_directory_defaults_to_cwd() {
        assert_eq!(target_directory(None), PathBuf::from("."));
        assert_eq!(
            target_directory(Some(PathBuf::from("/data"))),
            PathBuf::from("/data")
        );
    }
}
