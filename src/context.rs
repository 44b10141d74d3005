//! Service context bundling the port trait objects for one run.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use crate::adapters::live::github::{GitHubClient, GitHubProvider};
use crate::adapters::live::mirror::MirrorProvider;
use crate::adapters::recording::{RecordingProvider, SharedRecorder};
use crate::adapters::replaying::ReplayingProvider;
use crate::cassette::format::Cassette;
use crate::cassette::recorder::CassetteRecorder;
use crate::cassette::replayer::CassetteReplayer;
use crate::cli::SourceKind;
use crate::config::Config;
use crate::ports::{SourceProvider, WorkflowFetcher};

/// Name of the cassette file written inside a recording directory.
pub const CASSETTE_FILE: &str = "source.cassette.yaml";

/// Bundles the port trait objects a scan needs.
///
/// Constructors wire up different adapter implementations (live,
/// recording, replaying). Temporary directories owned by the context live
/// as long as it does.
pub struct ServiceContext {
    /// Opens a repository source per `(owner, repo)`.
    pub sources: Arc<dyn SourceProvider>,
    /// Downloads workflows for repository URL targets.
    pub fetcher: Arc<dyn WorkflowFetcher>,
    recorder: Option<SharedRecorder>,
    scratch: Option<TempDir>,
}

impl ServiceContext {
    /// Creates a context from explicit adapters.
    #[must_use]
    pub fn new(sources: Arc<dyn SourceProvider>, fetcher: Arc<dyn WorkflowFetcher>) -> Self {
        Self { sources, fetcher, recorder: None, scratch: None }
    }

    /// Creates a live context: the hosting API or local mirrors, per config.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or the temporary mirror
    /// directory cannot be created.
    pub fn live(config: &Config) -> Result<Self, String> {
        let client = Arc::new(
            GitHubClient::new(&config.api_url, config.token.clone(), config.jobs)
                .map_err(|e| e.to_string())?,
        );

        let (sources, scratch): (Arc<dyn SourceProvider>, Option<TempDir>) = match config.source {
            SourceKind::Remote => (Arc::new(GitHubProvider::new(Arc::clone(&client))), None),
            SourceKind::Local => {
                let (root, scratch) = match &config.mirror_dir {
                    Some(dir) => (dir.clone(), None),
                    None => {
                        let dir = tempfile::Builder::new()
                            .prefix("clank-mirrors-")
                            .tempdir()
                            .map_err(|e| format!("Failed to create mirror directory: {e}"))?;
                        (dir.path().to_path_buf(), Some(dir))
                    }
                };
                let provider = MirrorProvider::new(root, &config.git_url, config.token.clone());
                (Arc::new(provider), scratch)
            }
        };

        Ok(Self { sources, fetcher: client, recorder: None, scratch })
    }

    /// Creates a live context whose source calls are recorded to
    /// `<dir>/source.cassette.yaml` when [`finish`](Self::finish) runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the live context cannot be created.
    pub fn recording(config: &Config, dir: &Path) -> Result<Self, String> {
        let live = Self::live(config)?;
        let recorder: SharedRecorder = Arc::new(Mutex::new(CassetteRecorder::new(
            dir.join(CASSETTE_FILE),
            "clank-session",
        )));
        Ok(Self {
            sources: Arc::new(RecordingProvider::new(live.sources, Arc::clone(&recorder))),
            fetcher: live.fetcher,
            recorder: Some(recorder),
            scratch: live.scratch,
        })
    }

    /// Creates a context whose source calls are answered from a cassette.
    /// Workflow fetches for URL targets still go to the live API.
    ///
    /// # Errors
    ///
    /// Returns an error if the cassette cannot be read or parsed, or the
    /// HTTP client cannot be created.
    pub fn replaying(config: &Config, cassette: &Path) -> Result<Self, String> {
        let cassette = Cassette::load(cassette)?;
        let client = GitHubClient::new(&config.api_url, config.token.clone(), config.jobs)
            .map_err(|e| e.to_string())?;
        Ok(Self::new(
            Arc::new(ReplayingProvider::new(CassetteReplayer::new(&cassette))),
            Arc::new(client),
        ))
    }

    /// Ends the run: writes the cassette when recording and removes
    /// temporary directories. Returns the cassette path, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the cassette cannot be written.
    pub fn finish(self) -> Result<Option<PathBuf>, String> {
        let Self { sources, fetcher, recorder, scratch } = self;
        // Adapters hold clones of the recorder.
        drop(sources);
        drop(fetcher);
        drop(scratch);

        let Some(recorder) = recorder else {
            return Ok(None);
        };
        let recorder = Arc::try_unwrap(recorder)
            .map_err(|_| "cassette recorder is still in use".to_string())?
            .into_inner()
            .map_err(|_| "cassette recorder lock poisoned".to_string())?;
        recorder.finish().map(Some).map_err(|e| format!("Failed to write cassette: {e}"))
    }
}
