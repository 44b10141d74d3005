//! Recording adapter for the repository source port.

use std::sync::Arc;

use serde::Serialize;

use super::{record_result, SharedRecorder};
use crate::ports::source::{OpenFuture, RepositorySource, SourceFuture, SourceProvider};

/// Port name under which source calls are recorded.
pub(crate) const PORT: &str = "source";

/// Input of a recorded source call.
#[derive(Debug, Serialize)]
pub(crate) struct SourceCall<'a> {
    pub owner: &'a str,
    pub repo: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<&'a str>,
}

/// Wraps a provider so every source it opens records its calls.
///
/// Opening is recorded too, so a repository that could not be opened
/// fails the same way on replay.
pub struct RecordingProvider {
    inner: Arc<dyn SourceProvider>,
    recorder: SharedRecorder,
}

impl RecordingProvider {
    /// Creates a recording provider delegating to `inner`.
    pub fn new(inner: Arc<dyn SourceProvider>, recorder: SharedRecorder) -> Self {
        Self { inner, recorder }
    }
}

impl SourceProvider for RecordingProvider {
    fn open<'a>(&'a self, owner: &'a str, repo: &'a str) -> OpenFuture<'a> {
        Box::pin(async move {
            let result = self.inner.open(owner, repo).await;
            let call = SourceCall { owner, repo, base: None, target: None };
            record_result(&self.recorder, PORT, "open", &call, &result.as_ref().map(|_| ()));
            let inner = result?;
            Ok(Arc::new(RecordingSource {
                inner,
                owner: owner.to_string(),
                repo: repo.to_string(),
                recorder: Arc::clone(&self.recorder),
            }) as Arc<dyn RepositorySource>)
        })
    }
}

/// Records source calls while delegating to an inner implementation.
pub struct RecordingSource {
    inner: Arc<dyn RepositorySource>,
    owner: String,
    repo: String,
    recorder: SharedRecorder,
}

impl RecordingSource {
    fn call<'a>(&'a self, base: Option<&'a str>, target: Option<&'a str>) -> SourceCall<'a> {
        SourceCall { owner: &self.owner, repo: &self.repo, base, target }
    }
}

impl RepositorySource for RecordingSource {
    fn list_branches(&self) -> SourceFuture<'_, Vec<String>> {
        Box::pin(async move {
            let result = self.inner.list_branches().await;
            record_result(&self.recorder, PORT, "list_branches", &self.call(None, None), &result);
            result
        })
    }

    fn list_tags(&self) -> SourceFuture<'_, Vec<String>> {
        Box::pin(async move {
            let result = self.inner.list_tags().await;
            record_result(&self.recorder, PORT, "list_tags", &self.call(None, None), &result);
            result
        })
    }

    fn contains<'a>(&'a self, base_ref: &'a str, target: &'a str) -> SourceFuture<'a, bool> {
        Box::pin(async move {
            let result = self.inner.contains(base_ref, target).await;
            let input = self.call(Some(base_ref), Some(target));
            record_result(&self.recorder, PORT, "contains", &input, &result);
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::adapters::memory::{MemoryProvider, MemorySource};
    use crate::cassette::format::Cassette;
    use crate::cassette::recorder::CassetteRecorder;

    #[tokio::test]
    async fn records_each_call_with_its_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("source.cassette.yaml");
        let recorder = Arc::new(Mutex::new(CassetteRecorder::new(&path, "test")));

        let memory = MemoryProvider::new().with_repo(
            "acme",
            "tool",
            MemorySource::new().commit("a", &[]).branch("main", "a"),
        );
        {
            let provider = RecordingProvider::new(Arc::new(memory), Arc::clone(&recorder));
            let source = provider.open("acme", "tool").await.unwrap();
            assert_eq!(source.list_branches().await.unwrap(), vec!["main"]);
            assert!(source.contains("refs/heads/main", "a").await.unwrap());
        }

        let recorder = Arc::try_unwrap(recorder).unwrap().into_inner().unwrap();
        recorder.finish().unwrap();

        let cassette = Cassette::load(&path).unwrap();
        assert_eq!(cassette.interactions.len(), 3);
        let open = &cassette.interactions[0];
        assert_eq!(open.method, "open");
        assert_eq!(open.output, serde_json::json!({"ok": null}));
        let contains = &cassette.interactions[2];
        assert_eq!(contains.port, "source");
        assert_eq!(contains.method, "contains");
        assert_eq!(
            contains.input,
            serde_json::json!({
                "owner": "acme", "repo": "tool", "base": "refs/heads/main", "target": "a"
            })
        );
        assert_eq!(contains.output, serde_json::json!({"ok": true}));
        let listing = &cassette.interactions[1].input;
        assert_eq!(listing, &serde_json::json!({"owner": "acme", "repo": "tool"}));
    }

    #[tokio::test]
    async fn records_failures_as_messages() {
        let recorder = Arc::new(Mutex::new(CassetteRecorder::new("unused.yaml", "test")));
        let memory = MemoryProvider::new().with_repo(
            "acme",
            "tool",
            MemorySource::new().failing_listing(),
        );
        let provider = RecordingProvider::new(Arc::new(memory), Arc::clone(&recorder));
        let source = provider.open("acme", "tool").await.unwrap();
        assert!(source.list_tags().await.is_err());

        let guard = recorder.lock().unwrap();
        assert_eq!(guard.len(), 2);
    }

    #[tokio::test]
    async fn records_open_failures() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("open.cassette.yaml");
        let recorder = Arc::new(Mutex::new(CassetteRecorder::new(&path, "test")));
        {
            let provider =
                RecordingProvider::new(Arc::new(MemoryProvider::new()), Arc::clone(&recorder));
            assert!(provider.open("acme", "missing").await.is_err());
        }

        let recorder = Arc::try_unwrap(recorder).unwrap().into_inner().unwrap();
        recorder.finish().unwrap();

        let cassette = Cassette::load(&path).unwrap();
        assert_eq!(cassette.interactions.len(), 1);
        let open = &cassette.interactions[0];
        assert_eq!(open.method, "open");
        assert_eq!(open.input, serde_json::json!({"owner": "acme", "repo": "missing"}));
        assert!(open.output.get("err").and_then(|e| e.as_str()).is_some());
    }
}
