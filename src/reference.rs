//! Action references pinned in workflows and their parsed form.

use std::fmt;

use crate::error::CheckError;

/// Scheme prefix of action references produced by the workflow extractor.
pub const ACTIONS_SCHEME: &str = "actions://";

/// An `actions://owner/repo[/path]@rev` reference split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRef {
    /// Account owning the repository.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Sub-action path inside the repository, if any.
    pub path: Option<String>,
    /// Pinned revision, normally a full commit hash.
    pub sha: String,
}

/// Parse an `actions://` reference string.
///
/// Exactly one `@` separates the locator from the revision. The locator
/// must name at least an owner and a repository. Extra segments are a sub-action path and do not change which
/// repository the commit must belong to.
///
/// # Errors
///
/// Returns [`CheckError::MalformedReference`] when the string does not have
/// that shape, or when a component could be mistaken for a command-line
/// option or a relative path.
pub fn parse_reference(reference: &str) -> Result<ParsedRef, CheckError> {
    let malformed =
        |reason| CheckError::MalformedReference { reference: reference.to_string(), reason };

    let rest = reference
        .strip_prefix(ACTIONS_SCHEME)
        .ok_or_else(|| malformed("missing actions:// prefix"))?;
    let mut parts = rest.split('@');
    let (locator, sha) = match (parts.next(), parts.next(), parts.next()) {
        (Some(locator), Some(sha), None) => (locator, sha),
        (_, None, _) => return Err(malformed("missing @revision")),
        _ => return Err(malformed("more than one @")),
    };
    if sha.is_empty() {
        return Err(malformed("empty revision"));
    }
    if sha.starts_with('-') || sha.chars().any(char::is_whitespace) {
        return Err(malformed("invalid revision"));
    }

    let mut segments = locator.split('/');
    let owner = segments.next().unwrap_or_default();
    let repo = segments.next().unwrap_or_default();
    if owner.is_empty() || repo.is_empty() {
        return Err(malformed("expected owner/repo"));
    }
    for segment in [owner, repo] {
        if segment == "." || segment == ".." || segment.starts_with('-') {
            return Err(malformed("invalid owner or repository name"));
        }
    }

    let path: Vec<&str> = segments.collect();
    let path = if path.is_empty() { None } else { Some(path.join("/")) };

    Ok(ParsedRef { owner: owner.to_string(), repo: repo.to_string(), path, sha: sha.to_string() })
}

/// Memoization key for a reachability result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Revision being verified.
    pub sha: String,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repo, self.sha)
    }
}

/// A pinned action reference together with every line it appears on.
///
/// Immutable once built; `lines` is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRef {
    raw: String,
    parsed: ParsedRef,
    lines: Vec<usize>,
}

impl ActionRef {
    /// Parse `reference` and attach the 1-based source lines it occurs on.
    ///
    /// # Errors
    ///
    /// Returns [`CheckError::MalformedReference`] if the reference does not
    /// parse or if no source line is given.
    pub fn new(reference: &str, lines: Vec<usize>) -> Result<Self, CheckError> {
        if lines.is_empty() {
            return Err(CheckError::MalformedReference {
                reference: reference.to_string(),
                reason: "no source location",
            });
        }
        let parsed = parse_reference(reference)?;
        Ok(Self { raw: reference.to_string(), parsed, lines })
    }

    /// The reference exactly as it was extracted.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Repository owner.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.parsed.owner
    }

    /// Repository name.
    #[must_use]
    pub fn repo(&self) -> &str {
        &self.parsed.repo
    }

    /// Pinned revision.
    #[must_use]
    pub fn sha(&self) -> &str {
        &self.parsed.sha
    }

    /// Source lines, in document order.
    #[must_use]
    pub fn lines(&self) -> &[usize] {
        &self.lines
    }

    /// Key under which this reference's reachability is cached.
    #[must_use]
    pub fn key(&self) -> CacheKey {
        CacheKey {
            owner: self.owner().to_string(),
            repo: self.repo().to_string(),
            sha: self.sha().to_string(),
        }
    }
}
