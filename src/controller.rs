//! Wires user actions to the conversation state, the request client, the
//! durable log and whatever surface renders the transcript.

use anyhow::Result;
use chrono::{Local, Utc};
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::client::{ChatClient, ChatReply};
use crate::conversation::{ConversationState, PendingTurn, Rejected};
use crate::export::write_export;
use crate::history::{ChatHistory, ConversationTurn};
use crate::storage::LocalStorage;
use crate::theme::Theme;
use crate::transcript::{Renderer, SlotId};

/// Canned prompts offered on the empty chat screen
pub const SUGGESTIONS: [&str; 4] = [
    "Help me plan a game night with my 5 best friends for under $100.",
    "What are the best tips to improve my public speaking skills?",
    "Can you help me find the latest news on web development?",
    "Write JavaScript code to sum all elements in an array.",
];

/// A submitted turn whose request is still running
pub struct InFlight {
    turn: PendingTurn,
    slot: SlotId,
    task: JoinHandle<ChatReply>,
}

impl InFlight {
    #[cfg(test)]
    pub fn prompt(&self) -> &str {
        self.turn.prompt()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the request. A task that died still yields the error reply.
    pub async fn wait(self) -> Completed {
        let reply = match self.task.await {
            Ok(reply) => reply,
            Err(e) => {
                error!("chat request task failed: {}", e);
                ChatReply::failed()
            }
        };
        Completed {
            turn: self.turn,
            slot: self.slot,
            reply,
        }
    }
}

pub struct Completed {
    turn: PendingTurn,
    slot: SlotId,
    reply: ChatReply,
}

pub struct Controller {
    state: ConversationState,
    history: ChatHistory,
    client: ChatClient,
    storage: LocalStorage,
    theme: Theme,
    export_dir: PathBuf,
}

impl Controller {
    pub fn new(storage: LocalStorage, client: ChatClient, export_dir: PathBuf) -> Self {
        let theme = Theme::load(&storage);
        Self {
            state: ConversationState::new(),
            history: ChatHistory::new(storage.clone()),
            client,
            storage,
            theme,
            export_dir,
        }
    }

    pub fn is_generating(&self) -> bool {
        self.state.is_generating()
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn endpoint(&self) -> &str {
        self.client.endpoint()
    }

    pub fn log(&self) -> Vec<ConversationTurn> {
        self.history.load()
    }

    /// Render the stored log; returns the number of turns
    pub fn load<R: Renderer>(&self, renderer: &mut R) -> usize {
        let log = self.history.load();
        renderer.render_log(&log);
        log.len()
    }

    /// Show the outgoing bubble and a loading placeholder, then start the request
    pub fn submit<R: Renderer>(&self, prompt: &str, renderer: &mut R) -> Result<InFlight, Rejected> {
        let turn = self.state.begin_turn(prompt).map_err(|e| {
            debug!("submission rejected: {}", e);
            e
        })?;

        renderer.append_outgoing(turn.prompt(), Some(Local::now().format("%I:%M %p").to_string()));
        let slot = renderer.show_loading();

        let client = self.client.clone();
        let prompt = turn.prompt().to_string();
        info!(chars = prompt.chars().count(), "chat request started");
        let task = tokio::spawn(async move { client.send(&prompt).await });

        Ok(InFlight { turn, slot, task })
    }

    /// Submit one of the canned prompts
    pub fn submit_suggestion<R: Renderer>(&self, idx: usize, renderer: &mut R) -> Result<InFlight, Rejected> {
        let prompt = SUGGESTIONS.get(idx).copied().unwrap_or_default();
        self.submit(prompt, renderer)
    }

    /// Show the reply, persist answered turns, and settle. The turn is settled
    /// even when persisting fails.
    pub fn finish<R: Renderer>(&self, completed: Completed, renderer: &mut R) -> Result<()> {
        let Completed { turn, slot, reply } = completed;
        renderer.settle_loading(slot, &reply.text);

        let result = match reply.into_turn(turn.prompt()) {
            Some(entry) => self.history.append(entry),
            None => Ok(()),
        };
        turn.settle();
        result
    }

    /// Remove the whole log and re-render the empty conversation
    pub fn clear<R: Renderer>(&self, renderer: &mut R) -> Result<()> {
        self.history.clear()?;
        renderer.render_log(&[]);
        info!("chat history cleared");
        Ok(())
    }

    pub fn export(&self) -> Result<Option<PathBuf>> {
        write_export(&self.log(), &self.export_dir, Utc::now().date_naive())
    }

    pub fn toggle_theme(&mut self) -> Result<Theme> {
        self.theme = self.theme.toggled();
        self.theme.save(&self.storage)?;
        Ok(self.theme)
    }
}
