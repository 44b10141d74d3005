//! In-memory repository source backed by an explicit commit graph.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{CheckError, TransportError};
use crate::ports::source::{OpenFuture, RepositorySource, SourceFuture, SourceProvider};

/// A repository modeled as a commit DAG plus branch and tag pointers.
///
/// Counts every call so tests can assert how much verification work was
/// done. Failures can be injected per operation.
#[derive(Debug, Default)]
pub struct MemorySource {
    parents: HashMap<String, Vec<String>>,
    branches: Vec<(String, String)>,
    tags: Vec<(String, String)>,
    fail_listing: bool,
    fail_contains: bool,
    list_calls: AtomicUsize,
    contains_calls: AtomicUsize,
}

impl MemorySource {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a commit with the given parents.
    #[must_use]
    pub fn commit(mut self, id: &str, parents: &[&str]) -> Self {
        self.parents.insert(id.to_string(), parents.iter().map(ToString::to_string).collect());
        self
    }

    /// Points a branch at a commit. Branches are listed in insertion order.
    #[must_use]
    pub fn branch(mut self, name: &str, tip: &str) -> Self {
        self.branches.push((name.to_string(), tip.to_string()));
        self
    }

    /// Points a tag at a commit.
    #[must_use]
    pub fn tag(mut self, name: &str, target: &str) -> Self {
        self.tags.push((name.to_string(), target.to_string()));
        self
    }

    /// Makes branch and tag listing fail with a server error.
    #[must_use]
    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    /// Makes every containment test fail with a server error.
    #[must_use]
    pub fn failing_contains(mut self) -> Self {
        self.fail_contains = true;
        self
    }

    /// Number of `list_branches`/`list_tags` calls so far.
    #[must_use]
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of `contains` calls so far.
    #[must_use]
    pub fn contains_calls(&self) -> usize {
        self.contains_calls.load(Ordering::SeqCst)
    }

    fn resolve(&self, base_ref: &str) -> Option<&str> {
        fn lookup<'r>(refs: &'r [(String, String)], name: &str) -> Option<&'r str> {
            refs.iter().find(|(n, _)| n == name).map(|(_, tip)| tip.as_str())
        }
        if let Some(name) = base_ref.strip_prefix("refs/heads/") {
            lookup(&self.branches, name)
        } else if let Some(name) = base_ref.strip_prefix("refs/tags/") {
            lookup(&self.tags, name)
        } else {
            self.parents.get_key_value(base_ref).map(|(id, _)| id.as_str())
        }
    }

    fn is_ancestor(&self, target: &str, tip: &str) -> bool {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([tip]);
        while let Some(commit) = queue.pop_front() {
            if commit == target {
                return true;
            }
            if !seen.insert(commit) {
                continue;
            }
            if let Some(parents) = self.parents.get(commit) {
                queue.extend(parents.iter().map(String::as_str));
            }
        }
        false
    }

    fn names(&self, refs: &[(String, String)]) -> Result<Vec<String>, TransportError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing {
            return Err(TransportError::Api { status: 503, message: "listing unavailable".into() });
        }
        Ok(refs.iter().map(|(name, _)| name.clone()).collect())
    }
}

impl RepositorySource for MemorySource {
    fn list_branches(&self) -> SourceFuture<'_, Vec<String>> {
        let result = self.names(&self.branches);
        Box::pin(async move { result })
    }

    fn list_tags(&self) -> SourceFuture<'_, Vec<String>> {
        let result = self.names(&self.tags);
        Box::pin(async move { result })
    }

    fn contains<'a>(&'a self, base_ref: &'a str, target: &'a str) -> SourceFuture<'a, bool> {
        Box::pin(async move {
            self.contains_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_contains {
                return Err(TransportError::Api {
                    status: 500,
                    message: "comparison unavailable".into(),
                });
            }
            // An unknown base behaves like the hosting API's 404: no common ancestor.
            Ok(self.resolve(base_ref).is_some_and(|tip| self.is_ancestor(target, tip)))
        })
    }
}

/// Serves [`MemorySource`]s keyed by `owner/repo`.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    repos: HashMap<(String, String), Arc<MemorySource>>,
    opens: AtomicUsize,
}

impl MemoryProvider {
    /// Creates a provider with no repositories.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a repository.
    #[must_use]
    pub fn with_repo(mut self, owner: &str, repo: &str, source: MemorySource) -> Self {
        self.repos.insert((owner.to_string(), repo.to_string()), Arc::new(source));
        self
    }

    /// Returns the registered source for `owner/repo`.
    #[must_use]
    pub fn source(&self, owner: &str, repo: &str) -> Option<Arc<MemorySource>> {
        self.repos.get(&(owner.to_string(), repo.to_string())).cloned()
    }

    /// Number of `open` calls so far.
    #[must_use]
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl SourceProvider for MemoryProvider {
    fn open<'a>(&'a self, owner: &'a str, repo: &'a str) -> OpenFuture<'a> {
        Box::pin(async move {
            self.opens.fetch_add(1, Ordering::SeqCst);
            match self.source(owner, repo) {
                Some(source) => Ok(source as Arc<dyn RepositorySource>),
                None => Err(CheckError::Transport(TransportError::Api {
                    status: 404,
                    message: format!("repository {owner}/{repo} not found"),
                })),
            }
        })
    }
}
