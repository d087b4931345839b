use anyhow::{Context, Result};
use arboard::Clipboard;
use tracing::debug;

/// Copy text to the system clipboard
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    let mut clipboard = Clipboard::new().context("Clipboard unavailable")?;
    clipboard
        .set_text(text.to_string())
        .context("Clipboard rejected the text")?;
    debug!(chars = text.chars().count(), "copied to clipboard");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copied_text_reads_back() {
        // Headless machines have no clipboard to talk to
        let Ok(mut clipboard) = Clipboard::new() else {
            return;
        };
        if copy_to_clipboard("gemini-chat clipboard check").is_err() {
            return;
        }
        if let Ok(text) = clipboard.get_text() {
            assert_eq!(text, "gemini-chat clipboard check");
        }
    }
}
