//! Scanning targets: expand them to workflow files, check every pinned
//! reference, and report per file.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::checker::{CheckResult, ReachabilityChecker};
use crate::context::ServiceContext;
use crate::error::ScanError;
use crate::reference::ActionRef;
use crate::report::{write_file_error, write_file_report, Summary};
use crate::workflow::parse_workflow;

/// A command-line target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A workflow file, or a directory walked for workflow files.
    Path(PathBuf),
    /// A hosted repository whose `.github/workflows` is fetched first.
    Repository {
        /// Repository owner.
        owner: String,
        /// Repository name, without a `.git` suffix.
        repo: String,
    },
}

impl Target {
    /// Classifies a raw argument. `https://` arguments must name a
    /// repository as `https://<host>/<owner>/<repo>[.git][/...]`.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidUrl`] for a URL without owner and repo.
    pub fn parse(raw: &str) -> Result<Self, ScanError> {
        let Some(rest) = raw.strip_prefix("https://") else {
            return Ok(Self::Path(PathBuf::from(raw)));
        };
        let mut segments = rest.split('/').skip(1).filter(|s| !s.is_empty());
        let owner = segments.next();
        let repo = segments.next().map(|r| r.strip_suffix(".git").unwrap_or(r));
        match (owner, repo) {
            (Some(owner), Some(repo)) if !repo.is_empty() => {
                Ok(Self::Repository { owner: owner.to_string(), repo: repo.to_string() })
            }
            _ => Err(ScanError::InvalidUrl(raw.to_string())),
        }
    }
}

/// Whether `path` looks like a workflow definition.
fn is_workflow_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "yml" || ext == "yaml")
}

/// Workflow files under `root`, in sorted order. A file root is returned
/// as-is.
///
/// # Errors
///
/// Returns an error if `root` does not exist or cannot be traversed.
pub fn workflow_files(root: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let metadata = std::fs::metadata(root)
        .map_err(|source| ScanError::Read { path: root.to_path_buf(), source })?;
    if metadata.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|source| ScanError::Walk { path: root.to_path_buf(), source })?;
        if entry.file_type().is_file() && is_workflow_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Drives a scan over all targets, writing reports to `out`.
pub struct Scanner<'a> {
    ctx: &'a ServiceContext,
    checker: &'a ReachabilityChecker,
    jobs: usize,
    summary: Summary,
}

impl<'a> Scanner<'a> {
    /// Creates a scanner checking at most `jobs` references at once.
    #[must_use]
    pub fn new(ctx: &'a ServiceContext, checker: &'a ReachabilityChecker, jobs: usize) -> Self {
        Self { ctx, checker, jobs, summary: Summary::default() }
    }

    /// Scans every target in order; a failing target or file is reported
    /// and the scan moves on.
    ///
    /// # Errors
    ///
    /// Returns an error only if writing the report fails.
    pub async fn run(
        mut self,
        targets: &[String],
        out: &mut dyn Write,
    ) -> Result<Summary, String> {
        for raw in targets {
            self.scan_target(raw, out).await.map_err(|e| format!("Failed to write report: {e}"))?;
        }
        info!(
            files = self.summary.files,
            references = self.summary.references,
            failures = self.summary.failures,
            "scan finished"
        );
        Ok(self.summary)
    }

    async fn scan_target(&mut self, raw: &str, out: &mut dyn Write) -> std::io::Result<()> {
        // The scratch guard keeps downloaded files alive until they are scanned.
        let (files, _scratch) = match self.expand(raw).await {
            Ok(expanded) => expanded,
            Err(e) => {
                self.summary.record_failure();
                return write_file_error(out, raw, &e);
            }
        };
        if files.is_empty() {
            debug!(input = raw, "no workflow files found");
        }
        for file in &files {
            self.scan_file(file, out).await?;
        }
        Ok(())
    }

    /// Resolves a target to workflow files, downloading them first for a
    /// repository URL. The returned directory guard owns downloaded files.
    async fn expand(
        &self,
        raw: &str,
    ) -> Result<(Vec<PathBuf>, Option<tempfile::TempDir>), ScanError> {
        match Target::parse(raw)? {
            Target::Path(path) => Ok((workflow_files(&path)?, None)),
            Target::Repository { owner, repo } => {
                let scratch = tempfile::Builder::new()
                    .prefix("clank-workflows-")
                    .tempdir()
                    .map_err(|source| ScanError::Write { path: std::env::temp_dir(), source })?;
                info!(%owner, %repo, "fetching workflows");
                let dir = self.ctx.fetcher.fetch_workflows(&owner, &repo, scratch.path()).await?;
                Ok((workflow_files(&dir)?, Some(scratch)))
            }
        }
    }

    async fn scan_file(&mut self, path: &Path, out: &mut dyn Write) -> std::io::Result<()> {
        let display = path.display().to_string();
        match self.check_file(path).await {
            Ok(results) => {
                self.summary.record_results(&results);
                write_file_report(out, &display, &results)
            }
            Err(e) => {
                self.summary.record_failure();
                write_file_error(out, &display, &e)
            }
        }
    }

    /// Extracts and checks every reference in one file, keeping document
    /// order. Malformed references become failed results; they do not stop
    /// the file.
    async fn check_file(&self, path: &Path) -> Result<Vec<CheckResult>, ScanError> {
        let source = std::fs::read_to_string(path)
            .map_err(|source| ScanError::Read { path: path.to_path_buf(), source })?;
        let extracted = parse_workflow(&source)?;
        debug!(path = %path.display(), count = extracted.len(), "extracted references");

        let mut parsed = Vec::new();
        let mut slots: Vec<Option<CheckResult>> = Vec::with_capacity(extracted.len());
        for found in extracted {
            match ActionRef::new(&found.reference, found.lines.clone()) {
                Ok(action) => {
                    parsed.push(action);
                    slots.push(None);
                }
                Err(e) => slots.push(Some(CheckResult::failed(found.reference, found.lines, e))),
            }
        }

        let mut checked = self.checker.check_all(&parsed, self.jobs).await.into_iter();
        Ok(slots.into_iter().filter_map(|slot| slot.or_else(|| checked.next())).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::adapters::memory::{MemoryProvider, MemorySource};
    use crate::cache::ReachabilityCache;
    use crate::cancel::CancellationToken;
    use crate::ports::{FetchFuture, SourceProvider, WorkflowFetcher};

    const TIP: &str = "deadbeef";

    /// Serves a fixed workflow file for any repository.
    struct StaticFetcher(&'static str);

    impl WorkflowFetcher for StaticFetcher {
        fn fetch_workflows<'a>(
            &'a self,
            _owner: &'a str,
            _repo: &'a str,
            dest: &'a Path,
        ) -> FetchFuture<'a> {
            let body = self.0;
            Box::pin(async move {
                let dir = dest.join(".github").join("workflows");
                std::fs::create_dir_all(&dir)
                    .map_err(|source| ScanError::Write { path: dir.clone(), source })?;
                std::fs::write(dir.join("ci.yml"), body)
                    .map_err(|source| ScanError::Write { path: dir.clone(), source })?;
                Ok::<PathBuf, ScanError>(dir)
            })
        }
    }

    fn provider() -> Arc<MemoryProvider> {
        Arc::new(MemoryProvider::new().with_repo(
            "acme",
            "tool",
            MemorySource::new()
                .commit("root", &[])
                .commit(TIP, &["root"])
                .commit("0rphan", &[])
                .branch("main", TIP),
        ))
    }

    fn workflow(uses: &[&str]) -> String {
        let steps: Vec<String> = uses.iter().map(|u| format!("      - uses: {u}\n")).collect();
        let header = "on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n    steps:\n";
        format!("{header}{}", steps.concat())
    }

    async fn scan(
        provider: &Arc<MemoryProvider>,
        targets: &[String],
        fetched: &'static str,
    ) -> (Summary, String) {
        let ctx = ServiceContext::new(
            Arc::clone(provider) as Arc<dyn SourceProvider>,
            Arc::new(StaticFetcher(fetched)),
        );
        let checker = ReachabilityChecker::new(
            Arc::clone(&ctx.sources),
            Arc::new(ReachabilityCache::new()),
            CancellationToken::new(),
        );
        let mut out = Vec::new();
        let summary = Scanner::new(&ctx, &checker, 4).run(targets, &mut out).await.unwrap();
        (summary, String::from_utf8(out).unwrap())
    }

    fn write(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path.display().to_string()
    }

    #[tokio::test]
    async fn reachable_pin_is_reported_ok() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), "ci.yml", &workflow(&["acme/tool@deadbeef"]));
        let (summary, out) = scan(&provider(), &[file.clone()], "").await;

        assert!(summary.is_clean());
        assert!(out.starts_with(&format!("{file}\n")));
        assert!(out.contains("| actions://acme/tool@deadbeef | OK     | [6]   |"));
    }

    #[tokio::test]
    async fn orphan_pin_is_reported_as_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), "ci.yml", &workflow(&["acme/tool@0rphan"]));
        let (summary, out) = scan(&provider(), &[file], "").await;

        assert_eq!(summary.failures, 1);
        assert!(out.contains("| actions://acme/tool@0rphan | ERROR  |"));
        assert!(out.contains("SHA not present in repo"));
    }

    #[tokio::test]
    async fn shared_pin_across_files_is_verified_once() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.yml", &workflow(&["acme/tool@deadbeef"]));
        write(dir.path(), "b.yaml", &workflow(&["acme/tool@deadbeef"]));
        write(dir.path(), "notes.txt", "uses: acme/tool@0rphan");
        let provider = provider();
        let target = dir.path().display().to_string();
        let (summary, out) = scan(&provider, &[target], "").await;

        assert!(summary.is_clean());
        assert_eq!(summary.files, 2);
        assert_eq!(summary.references, 2);
        assert_eq!(provider.opens(), 1);
        assert_eq!(provider.source("acme", "tool").unwrap().contains_calls(), 1);
        let a = out.find("a.yml").unwrap();
        let b = out.find("b.yaml").unwrap();
        assert!(a < b);
        assert!(!out.contains("notes.txt"));
    }

    #[tokio::test]
    async fn malformed_reference_does_not_stop_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(
            dir.path(),
            "ci.yml",
            &workflow(&["onlyOneSegment@abc", "acme/tool@deadbeef"]),
        );
        let (summary, out) = scan(&provider(), &[file], "").await;

        assert_eq!(summary.references, 2);
        assert_eq!(summary.failures, 1);
        let malformed = out.lines().find(|l| l.contains("onlyOneSegment")).unwrap();
        assert!(malformed.contains("ERROR"));
        assert!(out.lines().any(|l| l.contains("acme/tool@deadbeef") && l.contains("OK")));
        // Document order is kept.
        assert!(out.find("onlyOneSegment").unwrap() < out.find("acme/tool@deadbeef").unwrap());
    }

    #[tokio::test]
    async fn bad_targets_are_reported_and_scanning_continues() {
        let dir = tempfile::tempdir().unwrap();
        let good = write(dir.path(), "ok.yml", &workflow(&["acme/tool@deadbeef"]));
        let broken = write(dir.path(), "broken.yml", "jobs: [unclosed");
        let missing = dir.path().join("missing").display().to_string();
        let targets = vec![missing.clone(), broken.clone(), "https://github.com/".into(), good];
        let (summary, out) = scan(&provider(), &targets, "").await;

        assert_eq!(summary.failures, 3);
        assert_eq!(summary.references, 1);
        assert!(out.contains(&format!("{missing}\nERROR: failed to read")));
        assert!(out.contains(&format!("{broken}\nERROR: unable to parse workflow")));
        assert!(out.contains("ERROR: invalid repository URL"));
        assert!(out.contains("| OK "));
    }

    #[tokio::test]
    async fn repository_url_scans_fetched_workflows() {
        let body = "jobs:\n  a:\n    steps:\n      - uses: acme/tool@deadbeef\n";
        let targets = vec!["https://github.com/acme/tool.git".to_string()];
        let (summary, out) = scan(&provider(), &targets, body).await;

        assert!(summary.is_clean());
        assert_eq!(summary.files, 1);
        assert!(out.contains("ci.yml\n"));
        assert!(out.contains("| actions://acme/tool@deadbeef | OK     | [4]   |"));
    }

    #[test]
    fn classifies_targets() {
        assert_eq!(Target::parse("wf").unwrap(), Target::Path(PathBuf::from("wf")));
        assert_eq!(
            Target::parse("https://github.com/acme/tool.git").unwrap(),
            Target::Repository { owner: "acme".into(), repo: "tool".into() }
        );
        assert_eq!(
            Target::parse("https://github.com/acme/tool/tree/main").unwrap(),
            Target::Repository { owner: "acme".into(), repo: "tool".into() }
        );
        assert!(Target::parse("https://github.com/acme").is_err());
    }
}
