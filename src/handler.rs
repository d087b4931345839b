use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use crate::app::{App, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Paste(text) => handle_paste(app, &text),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
    }

    // Every event is a chance to pick up a finished reply
    app.poll_response().await;
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    // Notifications are one-shot
    app.notification = None;

    if app.show_clear_confirm {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => app.confirm_clear(),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.cancel_clear(),
            _ => {}
        }
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        KeyCode::Char('i') | KeyCode::Enter => {
            app.input_mode = InputMode::Editing;
        }

        // Bubble selection
        KeyCode::Char('j') | KeyCode::Down => app.select_next(),
        KeyCode::Char('k') | KeyCode::Up => app.select_prev(),
        KeyCode::Char('G') => {
            app.selected = None;
            app.follow_bottom = true;
        }

        // Scrolling
        KeyCode::PageDown => app.scroll_down(app.chat_height.max(1)),
        KeyCode::PageUp => app.scroll_up(app.chat_height.max(1)),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_down((app.chat_height / 2).max(1));
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_up((app.chat_height / 2).max(1));
        }

        // Message actions
        KeyCode::Char('c') => app.copy_selected(),
        KeyCode::Char('y') => app.copy_code_block(),
        KeyCode::Char('d') => app.delete_selected(),

        // Conversation actions
        KeyCode::Char('t') => app.toggle_theme(),
        KeyCode::Char('e') => app.export(),
        KeyCode::Char('D') => app.request_clear(),

        // Suggestions are canned submits
        KeyCode::Char(c @ '1'..='4') => {
            let idx = c as usize - '1' as usize;
            app.submit_suggestion(idx);
        }

        KeyCode::Esc => app.selected = None,

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            app.submit_prompt();
        }
        KeyCode::Backspace => {
            if app.prompt_cursor > 0 {
                app.prompt_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.prompt_input, app.prompt_cursor);
                app.prompt_input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.prompt_input.chars().count();
            if app.prompt_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.prompt_input, app.prompt_cursor);
                app.prompt_input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.prompt_cursor = app.prompt_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.prompt_input.chars().count();
            app.prompt_cursor = (app.prompt_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.prompt_cursor = 0;
        }
        KeyCode::End => {
            app.prompt_cursor = app.prompt_input.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.prompt_input, app.prompt_cursor);
            app.prompt_input.insert(byte_pos, c);
            app.prompt_cursor += 1;
        }
        _ => {}
    }
}

fn handle_paste(app: &mut App, text: &str) {
    if app.input_mode != InputMode::Editing || app.show_clear_confirm {
        return;
    }
    // The prompt box is a single line
    let flattened = text.replace("\r\n", " ").replace(['\n', '\r'], " ");
    let byte_pos = char_to_byte_index(&app.prompt_input, app.prompt_cursor);
    app.prompt_input.insert_str(byte_pos, &flattened);
    app.prompt_cursor += flattened.chars().count();
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    if !in_chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::{app_with, hi_there, settle};
    use crate::client::tests::FakeTransport;
    use crate::controller::SUGGESTIONS;
    use crossterm::event::KeyEventKind;

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    async fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_event(app, key(KeyCode::Char(c))).await.unwrap();
        }
    }

    #[test]
    fn test_char_to_byte_index() {
        assert_eq!(char_to_byte_index("héllo", 2), 3);
        assert_eq!(char_to_byte_index("abc", 10), 3);
    }

    #[tokio::test]
    async fn test_typing_and_submit() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(&dir, FakeTransport::answering(hi_there()));
        assert_eq!(app.input_mode, InputMode::Editing);

        type_text(&mut app, "Hellö").await;
        handle_event(&mut app, key(KeyCode::Left)).await.unwrap();
        handle_event(&mut app, key(KeyCode::Backspace)).await.unwrap();
        assert_eq!(app.prompt_input, "Helö");

        handle_event(&mut app, key(KeyCode::Enter)).await.unwrap();
        assert!(app.is_generating());

        // Rapid second submission while pending is ignored
        type_text(&mut app, "again").await;
        handle_event(&mut app, key(KeyCode::Enter)).await.unwrap();
        assert_eq!(app.prompt_input, "again");

        settle(&mut app).await;
        assert_eq!(app.controller.log().len(), 1);
        assert_eq!(app.controller.log()[0].user_message, "Helö");
    }

    #[tokio::test]
    async fn test_suggestion_key_submits() {
        let dir = tempfile::tempdir().unwrap();
        let transport = FakeTransport::answering(hi_there());
        let mut app = app_with(&dir, transport.clone());
        handle_event(&mut app, key(KeyCode::Esc)).await.unwrap();
        handle_event(&mut app, key(KeyCode::Char('2'))).await.unwrap();
        settle(&mut app).await;

        assert_eq!(app.transcript.bubbles()[0].text, SUGGESTIONS[1]);
        assert_eq!(app.controller.log()[0].user_message, SUGGESTIONS[1]);
    }

    #[tokio::test]
    async fn test_clear_requires_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(&dir, FakeTransport::answering(hi_there()));
        type_text(&mut app, "Hello").await;
        handle_event(&mut app, key(KeyCode::Enter)).await.unwrap();
        settle(&mut app).await;
        handle_event(&mut app, key(KeyCode::Esc)).await.unwrap();

        handle_event(&mut app, key(KeyCode::Char('D'))).await.unwrap();
        handle_event(&mut app, key(KeyCode::Char('n'))).await.unwrap();
        assert_eq!(app.controller.log().len(), 1);

        handle_event(&mut app, key(KeyCode::Char('D'))).await.unwrap();
        handle_event(&mut app, key(KeyCode::Char('y'))).await.unwrap();
        assert!(app.controller.log().is_empty());
        assert!(app.show_home());
    }

    #[tokio::test]
    async fn test_notification_dismissed_by_next_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(&dir, FakeTransport::answering(hi_there()));
        handle_event(&mut app, key(KeyCode::Esc)).await.unwrap();
        handle_event(&mut app, key(KeyCode::Char('e'))).await.unwrap();
        assert!(app.notification.is_some());
        handle_event(&mut app, key(KeyCode::Char('j'))).await.unwrap();
        assert!(app.notification.is_none());
    }

    #[tokio::test]
    async fn test_paste_flattens_newlines() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(&dir, FakeTransport::answering(hi_there()));
        handle_event(&mut app, AppEvent::Paste("line one\nline two".to_string())).await.unwrap();
        assert_eq!(app.prompt_input, "line one line two");
        assert_eq!(app.prompt_cursor, 17);

        handle_event(&mut app, AppEvent::Paste("\r\nthree\r\n".to_string())).await.unwrap();
        assert_eq!(app.prompt_input, "line one line two three ");
        assert_eq!(app.prompt_cursor, 24);
    }

    #[tokio::test]
    async fn test_ctrl_c_quits_from_any_mode() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(&dir, FakeTransport::answering(hi_there()));
        let mut ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        ctrl_c.kind = KeyEventKind::Press;
        handle_event(&mut app, AppEvent::Key(ctrl_c)).await.unwrap();
        assert!(app.should_quit);
    }
}
