//! Reachability checker: branch-then-tag scan with memoized results.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::stream::{self, StreamExt};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::cache::ReachabilityCache;
use crate::cancel::CancellationToken;
use crate::error::{CheckError, TransportError};
use crate::ports::source::{branch_ref, tag_ref, RepositorySource, SourceProvider};
use crate::reference::ActionRef;

/// Outcome of checking one reference.
#[derive(Debug)]
pub struct CheckResult {
    /// The reference string as extracted.
    pub reference: String,
    /// 1-based source lines the reference occurs on.
    pub lines: Vec<usize>,
    /// Whether the commit is reachable from a branch or tag.
    pub reachable: bool,
    /// Why the reference is not reachable, when it is not.
    pub error: Option<CheckError>,
}

impl CheckResult {
    /// A result for a reference that could not be checked at all.
    #[must_use]
    pub fn failed(reference: impl Into<String>, lines: Vec<usize>, error: CheckError) -> Self {
        Self { reference: reference.into(), lines, reachable: false, error: Some(error) }
    }

    /// Returns `true` for a reachable reference.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.reachable && self.error.is_none()
    }
}

type SourceCell = Arc<OnceCell<Arc<dyn RepositorySource>>>;

/// Decides, for each action reference, whether its commit belongs to the
/// history of the repository it names.
///
/// Repository sources are opened once per `(owner, repo)` and shared by
/// every reference to that repository; concurrent first requests wait on
/// the same open, which also serializes mirror clones. Results go through
/// the injected [`ReachabilityCache`].
pub struct ReachabilityChecker {
    provider: Arc<dyn SourceProvider>,
    cache: Arc<ReachabilityCache>,
    cancel: CancellationToken,
    sources: Mutex<HashMap<(String, String), SourceCell>>,
}

impl ReachabilityChecker {
    /// Creates a checker opening sources through `provider`.
    #[must_use]
    pub fn new(
        provider: Arc<dyn SourceProvider>,
        cache: Arc<ReachabilityCache>,
        cancel: CancellationToken,
    ) -> Self {
        Self { provider, cache, cancel, sources: Mutex::new(HashMap::new()) }
    }

    /// The cache results are stored in.
    #[cfg(test)]
    #[must_use]
    pub fn cache(&self) -> &ReachabilityCache {
        &self.cache
    }

    /// Returns the shared source for `owner/repo`, opening it on first use.
    ///
    /// A failed open is not remembered; the next reference retries it.
    ///
    /// # Errors
    ///
    /// Returns the provider's error, or a cancellation.
    pub async fn source(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Arc<dyn RepositorySource>, CheckError> {
        let cell = {
            let mut sources = self.sources.lock().expect("source lock poisoned");
            Arc::clone(sources.entry((owner.to_string(), repo.to_string())).or_default())
        };
        let opened = cell
            .get_or_try_init(|| async {
                debug!(owner, repo, "opening repository source");
                tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => Err(TransportError::Cancelled.into()),
                    source = self.provider.open(owner, repo) => source,
                }
            })
            .await?;
        Ok(Arc::clone(opened))
    }

    /// Runs the uncached scan: every branch, then every tag, stopping at the
    /// first one whose history contains `sha`.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be opened or any listing or
    /// containment call fails before a match is found.
    pub async fn verify(&self, owner: &str, repo: &str, sha: &str) -> Result<bool, CheckError> {
        let source = self.source(owner, repo).await?;

        let branches = self.cancel.guard(source.list_branches()).await?;
        debug!(owner, repo, sha, count = branches.len(), "scanning branches");
        for branch in &branches {
            if self.cancel.guard(source.contains(&branch_ref(branch), sha)).await? {
                debug!(owner, repo, sha, branch = %branch, "found on branch");
                return Ok(true);
            }
        }

        let tags = self.cancel.guard(source.list_tags()).await?;
        debug!(owner, repo, sha, count = tags.len(), "scanning tags");
        for tag in &tags {
            if self.cancel.guard(source.contains(&tag_ref(tag), sha)).await? {
                debug!(owner, repo, sha, tag = %tag, "found on tag");
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Checks one reference, consulting the cache first.
    ///
    /// Never fails: every problem is reported in the result.
    pub async fn check(&self, action: &ActionRef) -> CheckResult {
        let key = action.key();
        let outcome = self
            .cache
            .get_or_compute(&key, || self.verify(action.owner(), action.repo(), action.sha()))
            .await;

        let (reachable, error) = match outcome {
            Ok(true) => (true, None),
            Ok(false) => {
                info!(%key, "commit not reachable from any branch or tag");
                (false, Some(CheckError::UnreachableCommit))
            }
            Err(e) => {
                warn!(%key, error = %e, "verification failed");
                (false, Some(e))
            }
        };
        CheckResult {
            reference: action.raw().to_string(),
            lines: action.lines().to_vec(),
            reachable,
            error,
        }
    }

    /// Checks every reference with at most `jobs` verifications in flight,
    /// returning results in input order.
    pub async fn check_all(&self, refs: &[ActionRef], jobs: usize) -> Vec<CheckResult> {
        stream::iter(refs.iter().map(|action| self.check(action)))
            .buffered(jobs.max(1))
            .collect()
            .await
    }
}
