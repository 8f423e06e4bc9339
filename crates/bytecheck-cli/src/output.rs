//! CLI output styling for bytecheck

use bytecheck::{StatsSnapshot, TrustOutcome, VerifyReport};
use colored::Colorize;
use std::path::Path;

/// Print a success line: `ok - <message>`.
pub fn print_success(message: &str) {
    println!("{} - {message}", "ok".green());
}

/// Print a warning line: `warning - <message>`.
pub fn print_warning(message: &str) {
    println!("{} - {message}", "warning".yellow());
}

/// Print an error line: `error - <message>`.
pub fn print_error(message: &str) {
    println!("{} - {message}", "error".red());
}

/// `"s"` when a count reads as plural.
#[must_use]
pub fn plural_suffix(count: u64) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

/// Human-readable byte count, binary units.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{bytes} B");
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let units = ["KB", "MB", "GB", "TB", "PB"];
    format!("{:.1} {}", bytes as f64 / div as f64, units[exp])
}

/// Summary line after generation.
pub fn print_generate_summary(stats: &StatsSnapshot, generated: &[std::path::PathBuf]) {
    let total = stats.dirs_processed + stats.cached_processed;
    if total == 0 {
        print_warning("no directories processed");
        return;
    }
    println!(
        "processed {total} director{} ({} cached, {} in {:.1}s)",
        if total == 1 { "y" } else { "ies" },
        stats.cached_processed,
        format_bytes(stats.bytes_processed),
        stats.elapsed.as_secs_f64(),
    );
    for path in generated {
        println!("manifest '{}' generated", path.display());
    }
}

/// Full verification report: failures with differences, the summary
/// line, and per-issuer trust outcomes.
pub fn print_verify_report(report: &VerifyReport) {
    let found = report.directories.len() as u64;
    let skipped = report
        .directories
        .iter()
        .filter(|s| s.manifest.skipped)
        .count() as u64;
    let verified = report
        .directories
        .iter()
        .filter(|s| s.manifest.valid)
        .count() as u64;

    for status in &report.directories {
        if status.manifest.valid || status.manifest.skipped {
            continue;
        }
        println!("{} {}", status.path.display(), "fail".red());
        for difference in &status.differences {
            let describe = |entity: &Option<bytecheck::Entity>| match entity {
                Some(e) if e.is_dir => format!("dir {}", &e.checksum[..12.min(e.checksum.len())]),
                Some(e) => format!("file {}", &e.checksum[..12.min(e.checksum.len())]),
                None => "absent".to_string(),
            };
            println!(
                "  {}: {} (manifest: {}, disk: {})",
                difference.name.bold(),
                difference.kind,
                describe(&difference.expected),
                describe(&difference.actual),
            );
        }
        println!();
    }

    if found == 0 {
        print_warning("no manifests found");
        return;
    }

    if report.all_valid() {
        print_success(&format!(
            "verified {verified} manifest{} ({skipped} skipped)",
            plural_suffix(verified)
        ));
    } else {
        print_error(&format!(
            "{}/{} manifests valid",
            verified,
            found - skipped
        ));
    }

    if !report.issuers.is_empty() {
        println!("\nauditors:");
        for (reference, outcome) in &report.issuers {
            let label = match outcome {
                TrustOutcome::Trusted => "trusted".green(),
                TrustOutcome::Fishy { .. } => "fishy".red(),
                TrustOutcome::Error { .. } => "error".yellow(),
                TrustOutcome::Unsupported => "unsupported".yellow(),
            };
            match outcome {
                TrustOutcome::Fishy { detail } | TrustOutcome::Error { detail } => {
                    println!("  {reference}: {label} ({detail})");
                }
                _ => println!("  {reference}: {label}"),
            }
        }
    }
}

/// Summary after cleaning.
pub fn print_clean_summary(removed: u64, errors: u64) {
    if removed == 0 && errors == 0 {
        print_warning("no manifests found to clean");
    } else if errors == 0 {
        print_success(&format!(
            "removed {removed} manifest{}",
            plural_suffix(removed)
        ));
    } else {
        print_error(&format!(
            "removed {removed} manifest{}, {errors} error{}",
            plural_suffix(removed),
            plural_suffix(errors)
        ));
    }
}

/// Shorten a path for single-line progress display.
#[must_use]
pub fn truncate_path(path: &Path, max_len: usize) -> String {
    let text = path.display().to_string();
    if text.len() <= max_len {
        return text;
    }
    let tail: String = text
        .chars()
        .rev()
        .take(max_len.saturating_sub(3))
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.0 GB");
    }

    #[test]
    fn truncate_path_keeps_tail() {
        let path = Path::new("/very/long/path/to/some/deeply/nested/file.txt");
        let short = truncate_path(path, 20);
        assert!(short.starts_with("..."));
        assert!(short.ends_with("file.txt"));
        assert!(short.len() <= 20);
    }

    #[test]
    fn truncate_path_short_passthrough() {
        let path = Path::new("/tmp/x");
        assert_eq!(truncate_path(path, 20), "/tmp/x");
    }

    #[test]
    fn plural_suffix_basic() {
        assert_eq!(plural_suffix(1), "");
        assert_eq!(plural_suffix(2), "s");
        assert_eq!(plural_suffix(0), "s");
    }
}
