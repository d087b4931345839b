use ratatui::layout::Rect;
use tracing::{error, warn};

use crate::clipboard::copy_to_clipboard;
use crate::controller::{Controller, InFlight};
use crate::theme::Theme;
use crate::transcript::{code_blocks, Transcript};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Error,
}

/// One-shot status line message, dismissed by the next key press
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub text: String,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub show_clear_confirm: bool,
    pub notification: Option<Notification>,

    // Prompt input
    pub prompt_input: String,
    pub prompt_cursor: usize, // cursor position in prompt_input, in chars

    // Chat pane
    pub transcript: Transcript,
    pub selected: Option<usize>,
    pub chat_scroll: usize, // rows scrolled past the top of the chat pane
    pub follow_bottom: bool,
    pub chat_height: u16, // inner height, updated during render
    pub chat_area: Option<Rect>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Request lifecycle
    pub in_flight: Option<InFlight>,
    pub controller: Controller,
}

impl App {
    pub fn new(controller: Controller) -> Self {
        let mut transcript = Transcript::new();
        controller.load(&mut transcript);

        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            show_clear_confirm: false,
            notification: None,

            prompt_input: String::new(),
            prompt_cursor: 0,

            transcript,
            selected: None,
            chat_scroll: 0,
            follow_bottom: true,
            chat_height: 0,
            chat_area: None,

            animation_frame: 0,

            in_flight: None,
            controller,
        }
    }

    pub fn theme(&self) -> Theme {
        self.controller.theme()
    }

    pub fn is_generating(&self) -> bool {
        self.controller.is_generating()
    }

    /// The home header shows until the first bubble exists
    pub fn show_home(&self) -> bool {
        self.transcript.is_empty()
    }

    pub fn notify(&mut self, kind: NotificationKind, text: impl Into<String>) {
        self.notification = Some(Notification {
            kind,
            text: text.into(),
        });
    }

    /// Submit the prompt box. Rejections leave everything as it was.
    pub fn submit_prompt(&mut self) {
        if let Ok(in_flight) = self.controller.submit(&self.prompt_input, &mut self.transcript) {
            self.prompt_input.clear();
            self.prompt_cursor = 0;
            self.start(in_flight);
        }
    }

    pub fn submit_suggestion(&mut self, idx: usize) {
        if let Ok(in_flight) = self.controller.submit_suggestion(idx, &mut self.transcript) {
            self.start(in_flight);
        }
    }

    fn start(&mut self, in_flight: InFlight) {
        self.in_flight = Some(in_flight);
        self.animation_frame = 0;
        self.selected = None;
        self.follow_bottom = true;
    }

    /// Apply the reply once the request task has finished
    pub async fn poll_response(&mut self) {
        let finished = self.in_flight.as_ref().map(|f| f.is_finished()).unwrap_or(false);
        if !finished {
            return;
        }

        if let Some(in_flight) = self.in_flight.take() {
            let completed = in_flight.wait().await;
            if let Err(e) = self.controller.finish(completed, &mut self.transcript) {
                error!("could not save chat history: {}", e);
                self.notify(NotificationKind::Error, "Failed to save chat history");
            }
            self.follow_bottom = true;
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.in_flight.is_some() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Bubble selection
    pub fn select_next(&mut self) {
        if self.transcript.is_empty() {
            return;
        }
        let last = self.transcript.len() - 1;
        self.selected = Some(match self.selected {
            Some(i) => (i + 1).min(last),
            None => last,
        });
        self.follow_bottom = false;
    }

    pub fn select_prev(&mut self) {
        if self.transcript.is_empty() {
            return;
        }
        let last = self.transcript.len() - 1;
        self.selected = Some(match self.selected {
            Some(i) => i.saturating_sub(1),
            None => last,
        });
        self.follow_bottom = false;
    }

    pub fn copy_selected(&mut self) {
        let text = match self.selected.and_then(|i| self.transcript.get(i)) {
            Some(bubble) if !bubble.loading && !bubble.text.is_empty() => bubble.text.clone(),
            _ => {
                self.notify(NotificationKind::Error, "Unable to copy message");
                return;
            }
        };

        match copy_to_clipboard(&text) {
            Ok(()) => self.notify(NotificationKind::Info, "Message copied"),
            Err(e) => {
                warn!("copy failed: {}", e);
                self.notify(NotificationKind::Error, "Failed to copy message to clipboard");
            }
        }
    }

    /// Copy the first fenced code block of the selected bubble
    pub fn copy_code_block(&mut self) {
        let block = self
            .selected
            .and_then(|i| self.transcript.get(i))
            .and_then(|bubble| code_blocks(&bubble.text).into_iter().next());

        let Some(block) = block else {
            self.notify(NotificationKind::Info, "No code block in this message");
            return;
        };

        match copy_to_clipboard(&block.code) {
            Ok(()) => self.notify(NotificationKind::Info, format!("{} code copied", block.language)),
            Err(e) => {
                warn!("copy failed: {}", e);
                self.notify(NotificationKind::Error, "Unable to copy text!");
            }
        }
    }

    /// Hide the selected bubble for this session
    pub fn delete_selected(&mut self) {
        let Some(idx) = self.selected else {
            return;
        };
        // A pending placeholder still has a reply to land in
        if self.transcript.get(idx).map(|b| b.loading).unwrap_or(true) {
            return;
        }
        self.transcript.remove(idx);
        self.selected = if self.transcript.is_empty() {
            None
        } else {
            Some(idx.min(self.transcript.len() - 1))
        };
    }

    pub fn toggle_theme(&mut self) {
        if let Err(e) = self.controller.toggle_theme() {
            warn!("could not save theme: {}", e);
            self.notify(NotificationKind::Error, "Failed to save theme preference");
        }
    }

    pub fn export(&mut self) {
        match self.controller.export() {
            Ok(Some(path)) => self.notify(NotificationKind::Info, format!("Exported to {}", path.display())),
            Ok(None) => self.notify(NotificationKind::Info, "No chat history to export!"),
            Err(e) => {
                error!("export failed: {}", e);
                self.notify(NotificationKind::Error, "Failed to export chat history");
            }
        }
    }

    pub fn request_clear(&mut self) {
        self.show_clear_confirm = true;
    }

    pub fn confirm_clear(&mut self) {
        self.show_clear_confirm = false;
        match self.controller.clear(&mut self.transcript) {
            Ok(()) => {
                self.selected = None;
                self.chat_scroll = 0;
                self.follow_bottom = true;
            }
            Err(e) => {
                error!("clear failed: {}", e);
                self.notify(NotificationKind::Error, "Failed to clear chat history");
            }
        }
    }

    pub fn cancel_clear(&mut self) {
        self.show_clear_confirm = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(usize::from(lines));
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(usize::from(lines));
        self.follow_bottom = false;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::client::tests::FakeTransport;
    use crate::client::ChatClient;
    use crate::storage::LocalStorage;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tempfile::TempDir;

    pub(crate) fn hi_there() -> Value {
        json!({ "candidates": [{ "content": { "parts": [{ "text": "Hi there" }] } }] })
    }

    pub(crate) fn app_with(dir: &TempDir, transport: Arc<FakeTransport>) -> App {
        let storage = LocalStorage::open(&dir.path().join("data")).unwrap();
        let client = ChatClient::with_transport("http://localhost:5000/api/chat", transport);
        App::new(Controller::new(storage, client, dir.path().join("exports")))
    }

    pub(crate) async fn settle(app: &mut App) {
        while app.in_flight.as_ref().map(|f| !f.is_finished()).unwrap_or(false) {
            tokio::task::yield_now().await;
        }
        app.poll_response().await;
    }

    #[tokio::test]
    async fn test_submit_prompt_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(&dir, FakeTransport::answering(hi_there()));
        assert!(app.show_home());

        app.prompt_input = "Hello".to_string();
        app.prompt_cursor = 5;
        app.submit_prompt();
        assert!(app.prompt_input.is_empty());
        assert_eq!(app.prompt_cursor, 0);
        assert!(app.is_generating());
        assert!(app.transcript.is_loading());
        assert!(!app.show_home());

        settle(&mut app).await;
        assert!(app.in_flight.is_none());
        assert!(!app.is_generating());
        assert_eq!(app.transcript.bubbles()[1].text, "Hi there");
        assert_eq!(app.controller.log().len(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_history_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::open(&dir.path().join("data")).unwrap();
        storage.set(crate::history::HISTORY_KEY, "{not json").unwrap();

        let mut app = app_with(&dir, FakeTransport::answering(hi_there()));
        assert!(app.show_home());
        app.prompt_input = "Hello".to_string();
        app.submit_prompt();
        settle(&mut app).await;

        assert_eq!(app.notification.as_ref().unwrap().text, "Failed to save chat history");
        assert!(!app.is_generating());
        assert_eq!(app.transcript.bubbles()[1].text, "Hi there");
        assert_eq!(storage.get(crate::history::HISTORY_KEY).unwrap().unwrap(), "{not json");
    }

    #[tokio::test]
    async fn test_blank_prompt_keeps_input() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(&dir, FakeTransport::answering(hi_there()));
        app.prompt_input = "   ".to_string();
        app.submit_prompt();
        assert_eq!(app.prompt_input, "   ");
        assert!(app.transcript.is_empty());
        assert!(app.in_flight.is_none());
    }

    #[tokio::test]
    async fn test_delete_hides_for_session_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(&dir, FakeTransport::answering(hi_there()));
        app.prompt_input = "Hello".to_string();
        app.submit_prompt();
        settle(&mut app).await;

        app.select_prev();
        assert_eq!(app.selected, Some(1));
        app.delete_selected();
        assert_eq!(app.transcript.len(), 1);
        assert_eq!(app.selected, Some(0));

        // Reloading brings the hidden bubble back
        let reloaded = App::new(Controller::new(
            LocalStorage::open(&dir.path().join("data")).unwrap(),
            ChatClient::with_transport("http://localhost:5000/api/chat", FakeTransport::failing()),
            dir.path().join("exports"),
        ));
        assert_eq!(reloaded.transcript.len(), 2);
    }

    #[tokio::test]
    async fn test_loading_placeholder_cannot_be_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(&dir, FakeTransport::answering(hi_there()));
        app.prompt_input = "Hello".to_string();
        app.submit_prompt();
        app.select_next();
        assert_eq!(app.selected, Some(1));
        app.delete_selected();
        assert_eq!(app.transcript.len(), 2);
        settle(&mut app).await;
    }

    #[tokio::test]
    async fn test_copy_without_selection_notifies() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(&dir, FakeTransport::answering(hi_there()));
        app.copy_selected();
        assert_eq!(
            app.notification,
            Some(Notification {
                kind: NotificationKind::Error,
                text: "Unable to copy message".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_export_empty_notifies() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(&dir, FakeTransport::answering(hi_there()));
        app.export();
        assert_eq!(app.notification.unwrap().text, "No chat history to export!");
    }

    #[tokio::test]
    async fn test_clear_restores_home() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(&dir, FakeTransport::answering(hi_there()));
        app.submit_suggestion(1);
        settle(&mut app).await;
        assert!(!app.show_home());

        app.request_clear();
        assert!(app.show_clear_confirm);
        app.confirm_clear();
        assert!(!app.show_clear_confirm);
        assert!(app.show_home());
        assert!(app.controller.log().is_empty());
    }
}
