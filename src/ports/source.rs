//! Repository source port: branch/tag listing and ancestry queries.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::{CheckError, TransportError};

/// Boxed future returned by [`RepositorySource`] methods, keeping the trait
/// dyn-compatible.
pub type SourceFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'a>>;

/// Boxed future returned by [`SourceProvider::open`].
pub type OpenFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Arc<dyn RepositorySource>, CheckError>> + Send + 'a>>;

/// Answers reachability questions about one repository.
///
/// Implementations: the hosting API ([`GitHubSource`]), a local mirror
/// ([`MirrorSource`]), and an in-memory commit graph ([`MemorySource`]).
/// Recording and replaying wrappers exist for cassette sessions.
///
/// [`GitHubSource`]: crate::adapters::live::github::GitHubSource
/// [`MirrorSource`]: crate::adapters::live::mirror::MirrorSource
/// [`MemorySource`]: crate::adapters::memory::MemorySource
pub trait RepositorySource: Send + Sync {
    /// Lists branch names (without the `refs/heads/` prefix), in the
    /// order the source reports them.
    ///
    /// # Errors
    ///
    /// Returns an error if the branches cannot be listed.
    fn list_branches(&self) -> SourceFuture<'_, Vec<String>>;

    /// Lists tag names (without the `refs/tags/` prefix).
    ///
    /// # Errors
    ///
    /// Returns an error if the tags cannot be listed.
    fn list_tags(&self) -> SourceFuture<'_, Vec<String>>;

    /// Returns `true` iff `target` is `base_ref` itself or one of its
    /// ancestors.
    ///
    /// The mere presence of `target` in an object store is not enough: a
    /// commit that exists but is not in the history of `base_ref` is not
    /// contained.
    ///
    /// # Errors
    ///
    /// Returns an error if the relationship could not be determined. Absence
    /// of a common ancestor is an answer (`false`), not an error.
    fn contains<'a>(&'a self, base_ref: &'a str, target: &'a str) -> SourceFuture<'a, bool>;
}

/// Creates the [`RepositorySource`] for a repository.
pub trait SourceProvider: Send + Sync {
    /// Opens (and, for local mirrors, materializes) the source for
    /// `owner/repo`.
    ///
    /// # Errors
    ///
    /// Returns [`CheckError::MirrorAcquisition`] when a mirror cannot be
    /// created, or a transport error.
    fn open<'a>(&'a self, owner: &'a str, repo: &'a str) -> OpenFuture<'a>;
}

/// Fully-qualified ref for a branch name.
#[must_use]
pub fn branch_ref(name: &str) -> String {
    format!("refs/heads/{name}")
}

/// Fully-qualified ref for a tag name.
#[must_use]
pub fn tag_ref(name: &str) -> String {
    format!("refs/tags/{name}")
}
