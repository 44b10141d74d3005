//! Resolved run configuration.

use std::path::PathBuf;

use crate::cli::{Cli, SourceKind};

/// Configuration the rest of the crate consumes, resolved from the CLI,
/// the environment, and `.env`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Targets in command-line order.
    pub targets: Vec<String>,
    /// Which repository source answers reachability questions.
    pub source: SourceKind,
    /// Mirror directory; `None` means a temporary one for this run.
    pub mirror_dir: Option<PathBuf>,
    /// Maximum verifications in flight.
    pub jobs: usize,
    /// Hosting API base URL, without a trailing slash.
    pub api_url: String,
    /// Clone base URL, without a trailing slash.
    pub git_url: String,
    /// Access token, if one was provided.
    pub token: Option<String>,
}

impl Config {
    /// Validates and normalizes parsed arguments.
    ///
    /// # Errors
    ///
    /// Returns an error string if a base URL is not usable.
    pub fn from_cli(cli: &Cli) -> Result<Self, String> {
        let api_url = base_url("--api-url", &cli.api_url, &["http://", "https://"])?;
        let git_url = base_url("--git-url", &cli.git_url, &["http://", "https://", "file://"])?;
        let token = cli.token.as_deref().map(str::trim).filter(|t| !t.is_empty()).map(String::from);

        Ok(Self {
            targets: cli.targets.clone(),
            source: cli.source,
            mirror_dir: cli.mirror_dir.clone(),
            jobs: usize::from(cli.jobs.max(1)),
            api_url,
            git_url,
            token,
        })
    }
}

fn base_url(flag: &str, value: &str, schemes: &[&str]) -> Result<String, String> {
    let trimmed = value.trim().trim_end_matches('/');
    if schemes.iter().any(|scheme| trimmed.starts_with(scheme) && trimmed.len() > scheme.len()) {
        Ok(trimmed.to_string())
    } else {
        Err(format!("{flag} must be a URL starting with one of {}: {value:?}", schemes.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    fn config(args: &[&str]) -> Result<Config, String> {
        let mut argv = vec!["clank"];
        argv.extend_from_slice(args);
        argv.push("wf");
        Config::from_cli(&Cli::try_parse_from(argv).unwrap())
    }

    #[test]
    fn trims_trailing_slashes() {
        let config =
            config(&["--api-url", "https://ghe.example.com/api/v3/", "--git-url", "https://ghe/"])
                .unwrap();
        assert_eq!(config.api_url, "https://ghe.example.com/api/v3");
        assert_eq!(config.git_url, "https://ghe");
    }

    #[test]
    fn blank_token_is_no_token() {
        assert!(config(&["--token", "  "]).unwrap().token.is_none());
        assert_eq!(config(&["--token", "abc"]).unwrap().token.as_deref(), Some("abc"));
    }

    #[test]
    fn rejects_unusable_urls() {
        assert!(config(&["--api-url", "api.github.com"]).is_err());
        assert!(config(&["--api-url", "file:///tmp"]).is_err());
        assert!(config(&["--git-url", "file:///srv/git"]).is_ok());
    }
}
