//! Live adapter for the GitHub REST API.
//!
//! Implements the remote [`RepositorySource`] on top of the compare
//! endpoint, and the [`WorkflowFetcher`] on top of the contents endpoint.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use base64::Engine as _;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::error::{CheckError, ScanError, TransportError};
use crate::ports::source::{OpenFuture, RepositorySource, SourceFuture, SourceProvider};
use crate::ports::workflows::{FetchFuture, WorkflowFetcher};

/// Default API root for github.com.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const PER_PAGE: usize = 100;
const WORKFLOWS_DIR: &str = ".github/workflows";

/// How the head revision of a comparison relates to its base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareStatus {
    /// Head has commits the base lacks.
    Ahead,
    /// Head is a strict ancestor of the base.
    Behind,
    /// Head and base are the same commit.
    Identical,
    /// Both sides have commits the other lacks.
    Diverged,
}

impl CompareStatus {
    /// Returns `true` when the head is contained in the base's history.
    #[must_use]
    pub fn is_contained(self) -> bool {
        matches!(self, Self::Behind | Self::Identical)
    }
}

#[derive(Deserialize)]
struct CompareResponse {
    status: CompareStatus,
}

#[derive(Deserialize)]
struct NamedRef {
    name: String,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// One entry of a contents listing, or a single file.
#[derive(Deserialize)]
struct ContentEntry {
    #[serde(rename = "type")]
    kind: String,
    path: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ContentsResponse {
    Directory(Vec<ContentEntry>),
    File(ContentEntry),
}

/// Shared, rate-limited GitHub API client.
///
/// All repositories in a run share one client, so the semaphore bounds the
/// total number of requests in flight against the API quota.
pub struct GitHubClient {
    http: Client,
    api_url: String,
    token: Option<String>,
    permits: Semaphore,
}

impl GitHubClient {
    /// Creates a client for `api_url`, authenticating with `token` when set.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        api_url: &str,
        token: Option<String>,
        max_in_flight: usize,
    ) -> Result<Self, TransportError> {
        let http = Client::builder()
            .user_agent(concat!("clank/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| TransportError::Http { url: api_url.to_string(), source })?;
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
            permits: Semaphore::new(max_in_flight.max(1)),
        })
    }

    /// Sends a GET for `path` (relative to the API root) and returns the
    /// response, whatever its status.
    async fn get(&self, path: &str) -> Result<Response, TransportError> {
        let url = format!("{}{path}", self.api_url);
        let _permit = self.permits.acquire().await.map_err(|_| TransportError::Cancelled)?;

        let mut request = self.http.get(&url).header(ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        debug!(%url, "GET");
        request.send().await.map_err(|source| TransportError::Http { url, source })
    }

    /// Reads and decodes a successful JSON response, or turns any other
    /// status into the matching [`TransportError`].
    async fn json<T: serde::de::DeserializeOwned>(
        response: Response,
    ) -> Result<T, TransportError> {
        let status = response.status();
        let url = response.url().to_string();
        if !status.is_success() {
            return Err(Self::failure(response).await);
        }
        let body =
            response.text().await.map_err(|source| TransportError::Http { url, source })?;
        serde_json::from_str(&body).map_err(|e| TransportError::Decode(e.to_string()))
    }

    /// Classifies a non-success response.
    async fn failure(response: Response) -> TransportError {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|e| e.message)
            .unwrap_or(body);
        classify(status, &headers, message)
    }

    /// Lists every `branches` or `tags` name, following pagination.
    async fn list_names(
        &self,
        owner: &str,
        repo: &str,
        kind: &str,
    ) -> Result<Vec<String>, TransportError> {
        let mut names = Vec::new();
        for page in 1.. {
            let response = self
                .get(&format!("/repos/{owner}/{repo}/{kind}?per_page={PER_PAGE}&page={page}"))
                .await?;
            let batch: Vec<NamedRef> = Self::json(response).await?;
            let done = batch.len() < PER_PAGE;
            names.extend(batch.into_iter().map(|r| r.name));
            if done {
                break;
            }
        }
        debug!(owner, repo, kind, count = names.len(), "listed refs");
        Ok(names)
    }

    /// Compares `head` against `base`.
    ///
    /// Returns `None` when the API answers 404, which it does for unknown
    /// revisions and for some divergent or cross-fork comparisons with no
    /// common ancestor.
    ///
    /// # Errors
    ///
    /// Returns an error for transport failures and any other non-success
    /// status.
    pub async fn compare(
        &self,
        owner: &str,
        repo: &str,
        base: &str,
        head: &str,
    ) -> Result<Option<CompareStatus>, TransportError> {
        let path = format!(
            "/repos/{owner}/{repo}/compare/{}...{}?per_page=1",
            encode_revision(base),
            encode_revision(head)
        );
        let response = self.get(&path).await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(owner, repo, base, head, "compare returned 404, no common ancestor");
            return Ok(None);
        }
        let compared: CompareResponse = Self::json(response).await?;
        debug!(owner, repo, base, head, status = ?compared.status, "compared revisions");
        Ok(Some(compared.status))
    }

    /// Downloads every file below `path` in `owner/repo` into `dest`.
    async fn download_tree(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        dest: &Path,
    ) -> Result<(), ScanError> {
        let fetch_err =
            |source| ScanError::Fetch { owner: owner.to_string(), repo: repo.to_string(), source };

        let mut pending = vec![path.to_string()];
        while let Some(current) = pending.pop() {
            let response = self
                .get(&format!("/repos/{owner}/{repo}/contents/{current}"))
                .await
                .map_err(fetch_err)?;
            match Self::json::<ContentsResponse>(response).await.map_err(fetch_err)? {
                ContentsResponse::File(file) => write_entry(&file, dest)?,
                // Listings omit file content; each file is fetched on its own.
                ContentsResponse::Directory(entries) => pending.extend(
                    entries
                        .into_iter()
                        .filter(|entry| matches!(entry.kind.as_str(), "dir" | "file"))
                        .map(|entry| entry.path),
                ),
            }
        }
        Ok(())
    }
}

/// Maps a non-success status to a transport error.
fn classify(status: StatusCode, headers: &HeaderMap, message: String) -> TransportError {
    fn header<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
        headers.get(name).and_then(|v| v.to_str().ok())
    }
    let exhausted = header(headers, "x-ratelimit-remaining") == Some("0");
    let retry_after = header(headers, "retry-after").is_some();
    let reset = header(headers, "x-ratelimit-reset").and_then(|v| v.parse().ok());

    match status {
        StatusCode::TOO_MANY_REQUESTS => TransportError::RateLimited { reset },
        StatusCode::FORBIDDEN if exhausted || retry_after => TransportError::RateLimited { reset },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            TransportError::Unauthorized { status: status.as_u16(), message }
        }
        _ => TransportError::Api { status: status.as_u16(), message },
    }
}

/// Escapes characters that would otherwise end the path of a compare URL.
/// Slashes are kept: the API accepts fully-qualified refs verbatim.
fn encode_revision(revision: &str) -> String {
    let mut out = String::with_capacity(revision.len());
    for c in revision.chars() {
        match c {
            '%' => out.push_str("%25"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            ' ' => out.push_str("%20"),
            _ => out.push(c),
        }
    }
    out
}

/// Decodes a file entry's base64 content and writes it below `dest`.
fn write_entry(entry: &ContentEntry, dest: &Path) -> Result<(), ScanError> {
    let path = dest.join(&entry.path);
    let invalid = |message: String| ScanError::Write {
        path: path.clone(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, message),
    };

    if Path::new(&entry.path).components().any(|c| !matches!(c, Component::Normal(_))) {
        return Err(invalid(format!("refusing to write unsafe path {:?}", entry.path)));
    }
    let encoded: String = entry
        .content
        .as_deref()
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let data = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| invalid(format!("invalid base64 content: {e}")))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|source| ScanError::Write { path: parent.to_path_buf(), source })?;
    }
    std::fs::write(&path, data).map_err(|source| ScanError::Write { path, source })
}

/// Remote repository source backed by the compare endpoint.
pub struct GitHubSource {
    client: Arc<GitHubClient>,
    owner: String,
    repo: String,
}

impl RepositorySource for GitHubSource {
    fn list_branches(&self) -> SourceFuture<'_, Vec<String>> {
        Box::pin(self.client.list_names(&self.owner, &self.repo, "branches"))
    }

    fn list_tags(&self) -> SourceFuture<'_, Vec<String>> {
        Box::pin(self.client.list_names(&self.owner, &self.repo, "tags"))
    }

    fn contains<'a>(&'a self, base_ref: &'a str, target: &'a str) -> SourceFuture<'a, bool> {
        Box::pin(async move {
            let status = self.client.compare(&self.owner, &self.repo, base_ref, target).await?;
            Ok(status.is_some_and(CompareStatus::is_contained))
        })
    }
}

/// Opens [`GitHubSource`]s sharing one client.
pub struct GitHubProvider {
    client: Arc<GitHubClient>,
}

impl GitHubProvider {
    /// Creates a provider around a shared client.
    #[must_use]
    pub fn new(client: Arc<GitHubClient>) -> Self {
        Self { client }
    }
}

impl SourceProvider for GitHubProvider {
    fn open<'a>(&'a self, owner: &'a str, repo: &'a str) -> OpenFuture<'a> {
        Box::pin(async move {
            let source = GitHubSource {
                client: Arc::clone(&self.client),
                owner: owner.to_string(),
                repo: repo.to_string(),
            };
            Ok::<_, CheckError>(Arc::new(source) as Arc<dyn RepositorySource>)
        })
    }
}

impl WorkflowFetcher for GitHubClient {
    fn fetch_workflows<'a>(
        &'a self,
        owner: &'a str,
        repo: &'a str,
        dest: &'a Path,
    ) -> FetchFuture<'a> {
        Box::pin(async move {
            self.download_tree(owner, repo, WORKFLOWS_DIR, dest).await?;
            Ok::<PathBuf, ScanError>(dest.join(WORKFLOWS_DIR))
        })
    }
}
