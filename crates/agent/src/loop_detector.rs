use tracing::{debug, info};
use webnav_core::ToolCallRecord;

pub const DEFAULT_LOOP_WINDOW: usize = 6;

/// Trips when the caller keeps issuing the same turn and keeps getting the
/// same answers.
///
/// The window counts turns, not individual calls: a single turn that presses
/// the same key several times is one entry. Every turn in the trailing window
/// must carry the same requests and receive the same responses.
#[derive(Debug, Clone, Copy)]
pub struct LoopDetector {
    window: usize,
}

impl LoopDetector {
    /// A window below 2 is raised to 2; one turn can never repeat itself.
    pub fn new(window: usize) -> Self {
        Self { window: window.max(2) }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn is_stuck(&self, history: &[ToolCallRecord]) -> bool {
        let turns = split_turns(history);
        if turns.len() < self.window {
            return false;
        }

        let recent = &turns[turns.len() - self.window..];
        let first = recent[0];
        let same_requests = recent.iter().all(|turn| {
            turn.len() == first.len() && turn.iter().zip(first).all(|(a, b)| a.same_request(b))
        });
        if !same_requests {
            return false;
        }
        debug!(window = self.window, tool = %first[0].name, "Trailing turns are identical, checking responses");

        let same_responses = recent
            .iter()
            .all(|turn| turn.iter().zip(first).all(|(a, b)| a.response == b.response));
        if same_responses {
            info!(window = self.window, tool = %first[0].name, "Loop detected, the same turn keeps returning the same response");
        }
        same_responses
    }
}

impl Default for LoopDetector {
    fn default() -> Self {
        Self::new(DEFAULT_LOOP_WINDOW)
    }
}

/// Group consecutive records sharing a `turn_index`.
fn split_turns(history: &[ToolCallRecord]) -> Vec<&[ToolCallRecord]> {
    let mut turns = Vec::new();
    let mut start = 0;
    for i in 1..=history.len() {
        if i == history.len() || history[i].turn_index != history[start].turn_index {
            turns.push(&history[start..i]);
            start = i;
        }
    }
    turns
}
