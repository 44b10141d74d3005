//! CLI argument definitions.

use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

use crate::adapters::live::github::DEFAULT_API_URL;

/// Where reachability answers come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// The hosting provider's compare API.
    Remote,
    /// Local `git` mirrors cloned on demand.
    Local,
}

/// Top-level CLI parser for `clank`.
#[derive(Debug, Parser)]
#[command(
    name = "clank",
    version,
    about = "Detect imposter commits pinned in GitHub Actions workflows"
)]
pub struct Cli {
    /// Workflow directories, files, or `https://` repository URLs.
    #[arg(value_name = "TARGET", required = true)]
    pub targets: Vec<String>,

    /// How to check whether a pinned commit belongs to its repository.
    #[arg(long, value_enum, env = "CLANK_SOURCE", default_value_t = SourceKind::Remote)]
    pub source: SourceKind,

    /// Directory for local mirrors (default: a temporary directory).
    #[arg(long, env = "CLANK_MIRROR_DIR")]
    pub mirror_dir: Option<PathBuf>,

    /// Maximum verifications in flight.
    #[arg(
        long,
        env = "CLANK_JOBS",
        default_value_t = 4,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub jobs: u16,

    /// Base URL of the hosting API.
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Base URL mirrors are cloned from.
    #[arg(long, env = "CLANK_GIT_URL", default_value = "https://github.com")]
    pub git_url: String,

    /// Access token for API calls and https clones.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}
