//! Core library entry for the `clank` CLI.
//!
//! `clank` finds "imposter commits": commit hashes pinned in GitHub Actions
//! workflows that are not reachable from any branch or tag of the
//! repository they claim to come from.

pub mod adapters;
pub mod cache;
pub mod cancel;
pub mod cassette;
pub mod checker;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod ports;
pub mod reference;
pub mod report;
pub mod workflow;

use clap::Parser;

pub use report::Summary;

/// Run the CLI with the provided arguments.
///
/// # Errors
///
/// Returns an error string when argument parsing fails or the scan cannot
/// run. A scan with findings is `Ok` with a non-clean [`Summary`].
pub fn run<I, T>(args: I) -> Result<Summary, String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = cli::Cli::try_parse_from(args).map_err(|err| err.to_string())?;
    commands::dispatch(&cli)
}

#[cfg(test)]
mod tests {
    use super::run;

    #[test]
    fn run_errors_without_targets() {
        assert!(run(["clank"]).is_err());
    }

    #[test]
    fn run_reports_missing_path_as_finding() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nothing-here");
        let summary = run(["clank", missing.to_str().unwrap()]).unwrap();
        assert_eq!(summary.files, 1);
        assert!(!summary.is_clean());
    }
}
