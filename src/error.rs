//! Error types for reachability checks and workflow scanning.

use std::path::PathBuf;

use thiserror::Error;

/// Failure talking to a repository source: the hosting API or a `git`
/// subprocess.
///
/// A transport failure says nothing about whether a commit is reachable,
/// so it is never folded into an "unreachable" finding.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The HTTP request could not be completed.
    #[error("request to {url} failed: {source}")]
    Http {
        /// Request URL (never carries credentials).
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The API answered with an unexpected status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message reported by the API, or the raw body.
        message: String,
    },

    /// Credentials were missing, invalid, or lacked access.
    #[error("not authorized ({status}): {message}")]
    Unauthorized {
        /// HTTP status code.
        status: u16,
        /// Message reported by the API.
        message: String,
    },

    /// The API quota is exhausted; the call may succeed later.
    #[error("API rate limit exceeded{}", .reset.map_or_else(String::new, |r| format!(" (resets at unix time {r})")))]
    RateLimited {
        /// Unix timestamp at which the quota resets, when reported.
        reset: Option<u64>,
    },

    /// A `git` subprocess exited with an unexpected status.
    #[error("`{command}` failed with exit code {code:?}: {stderr}")]
    Command {
        /// Short description of the command (no credentials).
        command: String,
        /// Exit code, `None` when killed by a signal.
        code: Option<i32>,
        /// Trimmed standard error.
        stderr: String,
    },

    /// A reused mirror could not be refreshed and lacks the commit, so its
    /// absence proves nothing.
    #[error("commit {revision} is missing from a mirror that could not be refreshed")]
    StaleMirror {
        /// Revision that was looked up.
        revision: String,
    },

    /// A subprocess could not be started.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        /// Short description of the command.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The API answered with a payload we could not understand.
    #[error("unexpected response payload: {0}")]
    Decode(String),

    /// A replayed session had no answer for the requested call.
    #[error("no recorded interaction: {0}")]
    Replay(String),

    /// A failure captured in a recorded session, replayed verbatim.
    #[error("{0}")]
    Recorded(String),

    /// The run was cancelled while the call was in flight.
    #[error("operation cancelled")]
    Cancelled,
}

impl TransportError {
    /// Returns `true` if repeating the same call later could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Http { source, .. } => source.is_timeout() || source.is_connect(),
            _ => false,
        }
    }
}

/// Outcome of checking a single action reference, when it is not "reachable".
#[derive(Debug, Error)]
pub enum CheckError {
    /// The reference string does not parse into owner, repository, and commit.
    #[error("malformed reference {reference:?}: {reason}")]
    MalformedReference {
        /// The reference as extracted from the workflow.
        reference: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// Every branch and tag was searched and none contains the commit.
    #[error("SHA not present in repo")]
    UnreachableCommit,

    /// Listing refs or testing containment failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// No local mirror could be created for the repository.
    #[error("could not create mirror of {owner}/{repo}: {}", .attempts.join("; "))]
    MirrorAcquisition {
        /// Repository owner.
        owner: String,
        /// Repository name.
        repo: String,
        /// One message per clone attempt, in the order they were tried.
        attempts: Vec<String>,
    },
}

/// Failure processing a scan target or workflow file.
#[derive(Debug, Error)]
pub enum ScanError {
    /// A file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A directory could not be traversed.
    #[error("failed to walk {}: {source}", .path.display())]
    Walk {
        /// Root being walked.
        path: PathBuf,
        /// Underlying traversal error.
        #[source]
        source: walkdir::Error,
    },

    /// A workflow file is not valid YAML.
    #[error("unable to parse workflow: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A target looked like a URL but does not name a repository.
    #[error("invalid repository URL {0:?}")]
    InvalidUrl(String),

    /// Workflow files could not be downloaded for a URL target.
    #[error("could not get content of {owner}/{repo}: {source}")]
    Fetch {
        /// Repository owner.
        owner: String,
        /// Repository name.
        repo: String,
        /// Underlying transport failure.
        #[source]
        source: TransportError,
    },

    /// Downloaded content could not be written to scratch space.
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        /// Destination path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
