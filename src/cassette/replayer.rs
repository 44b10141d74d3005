//! Replays recorded interactions from a cassette.

use std::collections::HashMap;

use super::format::{Cassette, Interaction};

/// Key for indexing interactions by port, method, and input.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
struct InteractionKey {
    port: String,
    method: String,
    /// Canonical JSON text of the input.
    input: String,
}

impl InteractionKey {
    fn new(port: &str, method: &str, input: &serde_json::Value) -> Self {
        Self { port: port.to_string(), method: method.to_string(), input: input.to_string() }
    }
}

/// Replays interactions from a loaded cassette.
///
/// Interactions are looked up by what was asked rather than by call order,
/// so concurrent callers may arrive in any order. Repeated identical calls
/// are served in recording order; once a queue is drained its last answer
/// keeps being returned.
pub struct CassetteReplayer {
    queues: HashMap<InteractionKey, Vec<Interaction>>,
    cursors: HashMap<InteractionKey, usize>,
}

impl CassetteReplayer {
    /// Create a new replayer from a loaded cassette.
    #[must_use]
    pub fn new(cassette: &Cassette) -> Self {
        let mut queues: HashMap<InteractionKey, Vec<Interaction>> = HashMap::new();
        for interaction in &cassette.interactions {
            let key =
                InteractionKey::new(&interaction.port, &interaction.method, &interaction.input);
            queues.entry(key).or_default().push(interaction.clone());
        }
        Self { queues, cursors: HashMap::new() }
    }

    /// Returns the recorded interaction answering `port::method(input)`,
    /// or `None` if the cassette never saw that call.
    pub fn next_interaction(
        &mut self,
        port: &str,
        method: &str,
        input: &serde_json::Value,
    ) -> Option<&Interaction> {
        let key = InteractionKey::new(port, method, input);
        let queue = self.queues.get(&key)?;
        let cursor = self.cursors.entry(key).or_insert(0);
        let interaction = queue.get(*cursor).or_else(|| queue.last())?;
        *cursor += 1;
        Some(interaction)
    }

    /// Lists the recorded `port::method` pairs, for error messages.
    #[must_use]
    pub fn available(&self) -> Vec<String> {
        let mut pairs: Vec<String> =
            self.queues.keys().map(|k| format!("{}::{}", k.port, k.method)).collect();
        pairs.sort();
        pairs.dedup();
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn interaction(seq: u64, method: &str, input: serde_json::Value, ok: bool) -> Interaction {
        Interaction {
            seq,
            port: "source".into(),
            method: method.into(),
            input,
            output: json!({ "ok": ok }),
        }
    }

    fn make_cassette(interactions: Vec<Interaction>) -> Cassette {
        Cassette {
            name: "test".into(),
            recorded_at: Utc::now(),
            tool_version: "0.0.0".into(),
            interactions,
        }
    }

    #[test]
    fn matches_on_input_regardless_of_order() {
        let cassette = make_cassette(vec![
            interaction(0, "contains", json!({"target": "a"}), true),
            interaction(1, "contains", json!({"target": "b"}), false),
        ]);
        let mut replayer = CassetteReplayer::new(&cassette);

        let b = replayer.next_interaction("source", "contains", &json!({"target": "b"})).unwrap();
        assert_eq!(b.seq, 1);
        let a = replayer.next_interaction("source", "contains", &json!({"target": "a"})).unwrap();
        assert_eq!(a.seq, 0);
    }

    #[test]
    fn repeated_calls_advance_then_stick_to_last() {
        let input = json!({"target": "a"});
        let cassette = make_cassette(vec![
            interaction(0, "contains", input.clone(), false),
            interaction(1, "contains", input.clone(), true),
        ]);
        let mut replayer = CassetteReplayer::new(&cassette);

        let seqs: Vec<u64> = (0..3)
            .map(|_| replayer.next_interaction("source", "contains", &input).unwrap().seq)
            .collect();
        assert_eq!(seqs, vec![0, 1, 1]);
    }

    #[test]
    fn unknown_call_is_none() {
        let cassette = make_cassette(vec![interaction(0, "list_tags", json!({}), true)]);
        let mut replayer = CassetteReplayer::new(&cassette);
        assert!(replayer.next_interaction("source", "list_tags", &json!({"owner": "x"})).is_none());
        assert!(replayer.next_interaction("source", "contains", &json!({})).is_none());
        assert_eq!(replayer.available(), vec!["source::list_tags"]);
    }
}
