//! Typed view of a stored key index
//!
//! A partition's index is persisted as a JSON array of blob keys. Values are
//! validated when read; anything that is not an array of strings is rejected.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyIndex {
    keys: Vec<String>,
}

impl KeyIndex {
    pub fn new(keys: Vec<String>) -> Self {
        Self { keys }
    }

    /// Decode a stored value. A JSON `null` decodes to `None`, the same as a
    /// missing entry.
    pub fn from_json(raw: &str) -> serde_json::Result<Option<Self>> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl From<Vec<String>> for KeyIndex {
    fn from(keys: Vec<String>) -> Self {
        Self::new(keys)
    }
}
