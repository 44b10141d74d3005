//! Workflow fetcher port for repository URL targets.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use crate::error::ScanError;

/// Boxed future returned by [`WorkflowFetcher::fetch_workflows`].
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<PathBuf, ScanError>> + Send + 'a>>;

/// Downloads a repository's workflow definitions to local disk.
pub trait WorkflowFetcher: Send + Sync {
    /// Writes every file under `.github/workflows` of `owner/repo` below
    /// `dest`, preserving repository-relative paths, and returns the local
    /// workflow directory.
    ///
    /// # Errors
    ///
    /// Returns an error if listing, downloading, or writing fails.
    fn fetch_workflows<'a>(&'a self, owner: &'a str, repo: &'a str, dest: &'a Path)
        -> FetchFuture<'a>;
}
