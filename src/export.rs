use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::history::ConversationTurn;

pub fn export_file_name(date: NaiveDate) -> String {
    format!("gemini-chat-{}.txt", date.format("%Y-%m-%d"))
}

/// Plain-text transcript, one block per turn
pub fn format_transcript(log: &[ConversationTurn]) -> String {
    log.iter()
        .enumerate()
        .map(|(i, turn)| {
            format!(
                "Message {}:\nUser: {}\nGemini: {}\n---\n",
                i + 1,
                turn.user_message,
                turn.response_text()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Write the transcript into `dir`. Returns `None` when there is nothing to export.
pub fn write_export(log: &[ConversationTurn], dir: &Path, date: NaiveDate) -> Result<Option<PathBuf>> {
    if log.is_empty() {
        return Ok(None);
    }

    fs::create_dir_all(dir).map_err(|e| anyhow!("Failed to create export directory {:?}: {}", dir, e))?;
    let path = dir.join(export_file_name(date));
    fs::write(&path, format_transcript(log)).map_err(|e| anyhow!("Failed to write {:?}: {}", path, e))?;

    info!(path = %path.display(), turns = log.len(), "chat exported");
    Ok(Some(path))
}
