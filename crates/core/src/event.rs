//! Wire format of the "language analyzed" event.

use serde::{Deserialize, Serialize};

use crate::Result;

/// Event published by the analyzer pipeline when it finishes one language
/// of one repository.
///
/// Body on the wire: UTF-8 JSON `{"repo_id": "<string>", "language_id": <int>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzedEvent {
    /// Opaque repository identifier; doubles as the clone directory name.
    pub repo_id: String,
    /// Language identifier assigned by the broader pipeline.
    pub language_id: i32,
}

impl AnalyzedEvent {
    /// Decodes an event from a raw message body.
    pub fn from_bytes(body: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(body)?)
    }
}
