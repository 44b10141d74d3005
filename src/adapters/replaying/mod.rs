//! Replaying adapters that answer port calls from a recorded cassette.

pub mod source;

pub use source::{ReplayingProvider, ReplayingSource};

use serde::de::DeserializeOwned;

use crate::error::TransportError;

/// Decodes a recorded `{"ok": v}` / `{"err": msg}` output.
///
/// Mirror of `recording::record_result`.
pub(crate) fn replay_result<T: DeserializeOwned>(
    output: &serde_json::Value,
    context: &str,
) -> Result<T, TransportError> {
    if let Some(err) = output.get("err") {
        let msg = err.as_str().unwrap_or("unknown error").to_string();
        return Err(TransportError::Recorded(msg));
    }
    let value = output.get("ok").unwrap_or(output);
    serde_json::from_value(value.clone())
        .map_err(|e| TransportError::Decode(format!("{context}: failed to deserialize: {e}")))
}
