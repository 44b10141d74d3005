//! Replaying adapter for the repository source port.

use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;

use super::replay_result;
use crate::adapters::recording::source::{SourceCall, PORT};
use crate::cassette::replayer::CassetteReplayer;
use crate::error::TransportError;
use crate::ports::source::{OpenFuture, RepositorySource, SourceFuture, SourceProvider};

/// Opens replaying sources backed by one shared cassette.
pub struct ReplayingProvider {
    replayer: Arc<Mutex<CassetteReplayer>>,
}

impl ReplayingProvider {
    /// Creates a provider from a cassette replayer.
    #[must_use]
    pub fn new(replayer: CassetteReplayer) -> Self {
        Self { replayer: Arc::new(Mutex::new(replayer)) }
    }

    /// Replays a recorded open. Cassettes that never recorded opening the
    /// repository open it successfully.
    fn replay_open(&self, owner: &str, repo: &str) -> Result<(), TransportError> {
        let call = SourceCall { owner, repo, base: None, target: None };
        let input =
            serde_json::to_value(&call).map_err(|e| TransportError::Replay(e.to_string()))?;
        let mut replayer = self.replayer.lock().expect("replayer lock poisoned");
        match replayer.next_interaction(PORT, "open", &input) {
            Some(interaction) => replay_result(&interaction.output, &format!("{PORT}::open")),
            None => Ok(()),
        }
    }
}

impl SourceProvider for ReplayingProvider {
    fn open<'a>(&'a self, owner: &'a str, repo: &'a str) -> OpenFuture<'a> {
        let opened = self.replay_open(owner, repo);
        let source = ReplayingSource {
            owner: owner.to_string(),
            repo: repo.to_string(),
            replayer: Arc::clone(&self.replayer),
        };
        Box::pin(async move {
            opened?;
            Ok(Arc::new(source) as Arc<dyn RepositorySource>)
        })
    }
}

/// Answers source calls for one repository from recorded interactions.
pub struct ReplayingSource {
    owner: String,
    repo: String,
    replayer: Arc<Mutex<CassetteReplayer>>,
}

impl ReplayingSource {
    fn replay<T: DeserializeOwned>(
        &self,
        method: &str,
        base: Option<&str>,
        target: Option<&str>,
    ) -> Result<T, TransportError> {
        let call = SourceCall { owner: &self.owner, repo: &self.repo, base, target };
        let input =
            serde_json::to_value(&call).map_err(|e| TransportError::Replay(e.to_string()))?;
        let output = {
            let mut replayer = self.replayer.lock().expect("replayer lock poisoned");
            match replayer.next_interaction(PORT, method, &input) {
                Some(interaction) => interaction.output.clone(),
                None => {
                    return Err(TransportError::Replay(format!(
                        "{PORT}::{method} {input} (recorded: [{}])",
                        replayer.available().join(", ")
                    )))
                }
            }
        };
        replay_result(&output, &format!("{PORT}::{method}"))
    }
}

impl RepositorySource for ReplayingSource {
    fn list_branches(&self) -> SourceFuture<'_, Vec<String>> {
        let result = self.replay("list_branches", None, None);
        Box::pin(async move { result })
    }

    fn list_tags(&self) -> SourceFuture<'_, Vec<String>> {
        let result = self.replay("list_tags", None, None);
        Box::pin(async move { result })
    }

    fn contains<'a>(&'a self, base_ref: &'a str, target: &'a str) -> SourceFuture<'a, bool> {
        let result = self.replay("contains", Some(base_ref), Some(target));
        Box::pin(async move { result })
    }
}
