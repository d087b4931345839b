use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejected {
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error("a response is already being generated")]
    Busy,
}

const IDLE: u64 = 0;

/// Tracks whether a request is outstanding. At most one turn is pending at a time.
///
/// `in_flight` holds the id of the pending turn, or `IDLE`.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    in_flight: Arc<AtomicU64>,
    next_id: Arc<AtomicU64>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_generating(&self) -> bool {
        self.in_flight.load(Ordering::Acquire) != IDLE
    }

    /// Claim the in-flight flag for `prompt`. The returned guard settles the
    /// turn when dropped, whichever way the request ends.
    pub fn begin_turn(&self, prompt: &str) -> Result<PendingTurn, Rejected> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(Rejected::EmptyPrompt);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.in_flight
            .compare_exchange(IDLE, id, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Rejected::Busy)?;

        Ok(PendingTurn {
            id,
            prompt: prompt.to_string(),
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    /// Release the flag whoever holds it; live turns settle through their guard
    #[cfg(test)]
    pub fn settle_turn(&self) {
        self.in_flight.store(IDLE, Ordering::Release);
    }
}

/// A turn that has been accepted and is waiting for its response
#[derive(Debug)]
pub struct PendingTurn {
    id: u64,
    prompt: String,
    in_flight: Arc<AtomicU64>,
}

impl PendingTurn {
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn settle(self) {}
}

impl Drop for PendingTurn {
    // Only releases the flag if it still belongs to this turn
    fn drop(&mut self) {
        let _ = self
            .in_flight
            .compare_exchange(self.id, IDLE, Ordering::AcqRel, Ordering::Acquire);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_prompts_rejected() {
        let state = ConversationState::new();
        for prompt in ["", " ", "\t", "\n  \r\n"] {
            assert_eq!(state.begin_turn(prompt).unwrap_err(), Rejected::EmptyPrompt);
            assert!(!state.is_generating());
        }
    }

    #[test]
    fn test_prompt_is_trimmed() {
        let state = ConversationState::new();
        let turn = state.begin_turn("  Hello \n").unwrap();
        assert_eq!(turn.prompt(), "Hello");
        assert!(state.is_generating());
    }

    #[test]
    fn test_only_first_of_rapid_submissions_accepted() {
        let state = ConversationState::new();
        let first = state.begin_turn("one").unwrap();
        for prompt in ["two", "three", "four"] {
            assert_eq!(state.begin_turn(prompt).unwrap_err(), Rejected::Busy);
        }
        assert_eq!(first.prompt(), "one");

        first.settle();
        assert!(!state.is_generating());
        assert!(state.begin_turn("five").is_ok());
    }

    #[test]
    fn test_blank_prompt_while_busy_reports_empty() {
        let state = ConversationState::new();
        let _turn = state.begin_turn("one").unwrap();
        assert_eq!(state.begin_turn("   ").unwrap_err(), Rejected::EmptyPrompt);
        assert!(state.is_generating());
    }

    #[test]
    fn test_dropping_guard_settles() {
        let state = ConversationState::new();
        {
            let _turn = state.begin_turn("Hello").unwrap();
            assert!(state.is_generating());
        }
        assert!(!state.is_generating());
    }

    #[test]
    fn test_settle_turn_is_unconditional() {
        let state = ConversationState::new();
        state.settle_turn();
        assert!(!state.is_generating());

        let turn = state.begin_turn("Hello").unwrap();
        state.settle_turn();
        assert!(!state.is_generating());
        drop(turn);
        assert!(!state.is_generating());
    }

    #[test]
    fn test_stale_guard_does_not_release_newer_turn() {
        let state = ConversationState::new();
        let stale = state.begin_turn("one").unwrap();
        state.settle_turn();

        let _current = state.begin_turn("two").unwrap();
        drop(stale);
        assert!(state.is_generating());
    }

    #[test]
    fn test_guard_settles_when_task_panics() {
        let state = ConversationState::new();
        let turn = state.begin_turn("Hello").unwrap();
        let result = std::thread::spawn(move || {
            let _turn = turn;
            panic!("request task died");
        })
        .join();
        assert!(result.is_err());
        assert!(!state.is_generating());
    }
}
