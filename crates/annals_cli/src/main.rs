//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `annals_core` linkage with deterministic output.
//! - Optionally load a record file or depot directory and print its index.
//! - Log depot loads under `$ANNALS_LOG_DIR`, or `<temp>/annals-logs`.

use annals_core::depot::loader;
use annals_core::time::calendar::format_tick;
use annals_core::LoaderOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const LOG_DIR_ENV: &str = "ANNALS_LOG_DIR";
const DEFAULT_LOG_SUBDIR: &str = "annals-logs";

fn log_dir() -> PathBuf {
    match std::env::var_os(LOG_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => std::env::temp_dir().join(DEFAULT_LOG_SUBDIR),
    }
}

fn main() -> ExitCode {
    println!("annals_core ping={}", annals_core::ping());
    println!("annals_core version={}", annals_core::core_version());

    let Some(target) = std::env::args().nth(1) else {
        return ExitCode::SUCCESS;
    };

    let log_dir = log_dir();
    if let Err(err) = annals_core::init_logging(
        annals_core::default_log_level(),
        &log_dir.to_string_lossy(),
    ) {
        eprintln!("logging disabled: {err}");
    }

    let report = loader::load_paths(&[Path::new(&target)], &LoaderOptions::default());
    println!(
        "loaded files={}/{} records={}",
        report.succeeded,
        report.attempted,
        report.records.len()
    );
    for index in loader::index(&report.records) {
        println!(
            "{} {} .. {} {}",
            index.uuid(),
            format_tick(index.since(), true, false),
            format_tick(index.until(), true, false),
            index.abstract_text()
        );
    }

    if report.is_complete() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::{log_dir, DEFAULT_LOG_SUBDIR, LOG_DIR_ENV};

    #[test]
    fn log_dir_defaults_under_temp() {
        if std::env::var_os(LOG_DIR_ENV).is_none() {
            assert_eq!(log_dir(), std::env::temp_dir().join(DEFAULT_LOG_SUBDIR));
        }
    }
}
