//! Rendered chat bubbles.
//!
//! The transcript is what the chat pane draws. It is rebuilt from the durable
//! log on load and clear; between those it only grows (optimistic outgoing
//! bubbles, loading placeholders) or loses bubbles the user hides.

use regex::Regex;
use std::sync::OnceLock;

use crate::history::ConversationTurn;

/// Text of the placeholder bubble while a reply is pending
pub const LOADING_TEXT: &str = "...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BubbleKind {
    Outgoing,
    Incoming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bubble {
    pub id: SlotId,
    pub kind: BubbleKind,
    pub text: String,
    pub timestamp: Option<String>,
    pub loading: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub language: String,
    pub code: String,
}

/// What the controller needs from a chat surface
pub trait Renderer {
    /// Replace everything with one outgoing and one incoming bubble per turn
    fn render_log(&mut self, log: &[ConversationTurn]);
    fn append_outgoing(&mut self, text: &str, timestamp: Option<String>);
    /// Add a loading placeholder and return its slot
    fn show_loading(&mut self) -> SlotId;
    /// Replace the placeholder in `slot` with the final text
    fn settle_loading(&mut self, slot: SlotId, text: &str);
}

/// One outgoing and one incoming bubble per turn, in log order
pub fn project(log: &[ConversationTurn]) -> Vec<Bubble> {
    log.iter()
        .flat_map(|turn| {
            [
                (BubbleKind::Outgoing, turn.user_message.as_str()),
                (BubbleKind::Incoming, turn.response_text()),
            ]
        })
        .enumerate()
        .map(|(i, (kind, text))| Bubble {
            id: SlotId(i as u64),
            kind,
            text: text.to_string(),
            timestamp: None,
            loading: false,
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct Transcript {
    bubbles: Vec<Bubble>,
    next_id: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bubbles(&self) -> &[Bubble] {
        &self.bubbles
    }

    pub fn is_empty(&self) -> bool {
        self.bubbles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bubbles.len()
    }

    pub fn get(&self, idx: usize) -> Option<&Bubble> {
        self.bubbles.get(idx)
    }

    /// Hide a bubble for this session only; the durable log is untouched
    pub fn remove(&mut self, idx: usize) -> Option<Bubble> {
        if idx < self.bubbles.len() {
            Some(self.bubbles.remove(idx))
        } else {
            None
        }
    }

    #[cfg(test)]
    pub fn is_loading(&self) -> bool {
        self.bubbles.iter().any(|b| b.loading)
    }

    fn push(&mut self, kind: BubbleKind, text: &str, timestamp: Option<String>, loading: bool) -> SlotId {
        let id = SlotId(self.next_id);
        self.next_id += 1;
        self.bubbles.push(Bubble {
            id,
            kind,
            text: text.to_string(),
            timestamp,
            loading,
        });
        id
    }
}

impl Renderer for Transcript {
    fn render_log(&mut self, log: &[ConversationTurn]) {
        self.bubbles = project(log);
        self.next_id = self.bubbles.len() as u64;
    }

    fn append_outgoing(&mut self, text: &str, timestamp: Option<String>) {
        self.push(BubbleKind::Outgoing, text, timestamp, false);
    }

    fn show_loading(&mut self) -> SlotId {
        self.push(BubbleKind::Incoming, LOADING_TEXT, None, true)
    }

    fn settle_loading(&mut self, slot: SlotId, text: &str) {
        // The placeholder may have been hidden or cleared in the meantime
        if let Some(bubble) = self.bubbles.iter_mut().find(|b| b.id == slot) {
            bubble.text = text.to_string();
            bubble.loading = false;
        }
    }
}

fn code_fence() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```([A-Za-z0-9_+#.-]*)[^\n]*\n(.*?)```").expect("code fence pattern is valid")
    })
}

/// A message split into prose and fenced code, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Prose(&'a str),
    Code(CodeBlock),
}

pub fn segments(text: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut rest_start = 0;

    for caps in code_fence().captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let prose = &text[rest_start..whole.start()];
        if !prose.is_empty() {
            out.push(Segment::Prose(prose));
        }
        let language = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let code = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        out.push(Segment::Code(CodeBlock {
            language: language_label(language),
            code: code.trim_end().to_string(),
        }));

        // The newline closing the fence line belongs to the fence
        rest_start = whole.end();
        if text[rest_start..].starts_with('\n') {
            rest_start += 1;
        }
    }

    let tail = &text[rest_start..];
    if !tail.is_empty() {
        out.push(Segment::Prose(tail));
    }
    out
}

/// Fenced code blocks in a message, labelled with their capitalized language
pub fn code_blocks(text: &str) -> Vec<CodeBlock> {
    segments(text)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Code(block) => Some(block),
            Segment::Prose(_) => None,
        })
        .collect()
}

fn language_label(language: &str) -> String {
    let mut chars = language.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Text".to_string(),
    }
}
