//! Durable conversation log.
//!
//! The whole log is stored as one JSON array under a single key and is always
//! read and written as a unit. Each entry keeps the raw endpoint payload, so
//! response text is re-extracted every time the log is loaded.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::storage::LocalStorage;

pub const HISTORY_KEY: &str = "saved-api-chats";

/// Shown for stored turns whose payload carries no extractable text
pub const HISTORY_FALLBACK_TEXT: &str = "No response";

/// One prompt and the raw payload the endpoint answered with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    pub user_message: String,
    #[serde(default)]
    pub api_response: Value,
}

impl ConversationTurn {
    pub fn new(user_message: &str, api_response: Value) -> Self {
        Self {
            user_message: user_message.to_string(),
            api_response,
        }
    }

    pub fn response_text(&self) -> &str {
        extract_text(&self.api_response).unwrap_or(HISTORY_FALLBACK_TEXT)
    }
}

/// Pull `candidates[0].content.parts[0].text` out of a raw payload.
/// Empty text counts as absent.
pub fn extract_text(raw: &Value) -> Option<&str> {
    raw.get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()
        .filter(|text| !text.is_empty())
}

pub struct ChatHistory {
    storage: LocalStorage,
}

impl ChatHistory {
    pub fn new(storage: LocalStorage) -> Self {
        Self { storage }
    }

    /// Never fails: missing or unreadable content yields an empty log.
    /// Entries that are not turns are skipped.
    pub fn load(&self) -> Vec<ConversationTurn> {
        let entries = match self.read_entries() {
            Ok(entries) => entries,
            Err(e) => {
                warn!("chat history unreadable, starting empty: {}", e);
                return Vec::new();
            }
        };

        entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value(entry) {
                Ok(turn) => Some(turn),
                Err(e) => {
                    warn!("skipping malformed chat history entry: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Appends to the stored entries as they are, so entries `load` skips are
    /// kept. Fails rather than overwrite content it cannot parse.
    pub fn append(&self, turn: ConversationTurn) -> Result<()> {
        let mut entries = self.read_entries()?;
        entries.push(serde_json::to_value(turn)?);
        let content = serde_json::to_string(&entries)?;
        self.storage.set(HISTORY_KEY, &content)?;
        debug!(len = entries.len(), "chat history appended");
        Ok(())
    }

    fn read_entries(&self) -> Result<Vec<Value>> {
        let Some(content) = self.storage.get(HISTORY_KEY)? else {
            return Ok(Vec::new());
        };
        let entries = serde_json::from_str::<Option<Vec<Value>>>(&content)
            .context("Chat history is not a JSON array")?;
        Ok(entries.unwrap_or_default())
    }

    pub fn clear(&self) -> Result<()> {
        self.storage.remove(HISTORY_KEY)
    }
}
