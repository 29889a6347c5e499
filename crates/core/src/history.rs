//! Conversation History
//!
//! An append-only log of turns for a single session. The whole log is the
//! context window handed to the model on every call, so turns are never
//! mutated, removed or reordered once pushed.

use std::fmt;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
    ActionResult,
    Diagnostic,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::User => write!(f, "user"),
            Speaker::Assistant => write!(f, "assistant"),
            Speaker::ActionResult => write!(f, "action-result"),
            Speaker::Diagnostic => write!(f, "system-diagnostic"),
        }
    }
}

/// One atomic entry in the conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub speaker: Speaker,
    pub content: String,
    /// The state the session was in when the turn was produced.
    pub state: String,
    /// Set only on action-result turns.
    pub action: Option<String>,
}

impl Turn {
    pub fn user(content: impl Into<String>, state: impl Into<String>) -> Self {
        Self::new(Speaker::User, content, state, None)
    }

    pub fn assistant(content: impl Into<String>, state: impl Into<String>) -> Self {
        Self::new(Speaker::Assistant, content, state, None)
    }

    pub fn action_result(
        action: impl Into<String>,
        content: impl Into<String>,
        state: impl Into<String>,
    ) -> Self {
        Self::new(Speaker::ActionResult, content, state, Some(action.into()))
    }

    pub fn diagnostic(content: impl Into<String>, state: impl Into<String>) -> Self {
        Self::new(Speaker::Diagnostic, content, state, None)
    }

    fn new(
        speaker: Speaker,
        content: impl Into<String>,
        state: impl Into<String>,
        action: Option<String>,
    ) -> Self {
        Self {
            speaker,
            content: content.into(),
            state: state.into(),
            action,
        }
    }
}

/// Ordered, append-only list of turns.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a turn. Only the session controller holds a mutable history.
    pub(crate) fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }
}

/// The most recent `n` turns, oldest first.
pub fn tail(turns: &[Turn], n: usize) -> &[Turn] {
    &turns[turns.len().saturating_sub(n)..]
}

impl<'a> IntoIterator for &'a ConversationHistory {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turns_keep_append_order() {
        let mut history = ConversationHistory::new();
        history.push(Turn::user("hello", "greeting"));
        history.push(Turn::assistant("hi", "greeting"));
        history.push(Turn::action_result("calculate", "Result: 4", "processing_task"));

        let speakers: Vec<Speaker> = history.iter().map(|t| t.speaker).collect();
        assert_eq!(
            speakers,
            vec![Speaker::User, Speaker::Assistant, Speaker::ActionResult]
        );
        assert_eq!(history.len(), 3);
        assert_eq!(history.last().unwrap().action.as_deref(), Some("calculate"));
    }

    #[test]
    fn test_tail() {
        let mut history = ConversationHistory::new();
        assert!(tail(history.turns(), 3).is_empty());

        for i in 0..5 {
            history.push(Turn::user(format!("m{i}"), "s"));
        }
        let last: Vec<&str> = tail(history.turns(), 2)
            .iter()
            .map(|t| t.content.as_str())
            .collect();
        assert_eq!(last, vec!["m3", "m4"]);
        assert_eq!(tail(history.turns(), 10).len(), 5);
    }

    #[test]
    fn test_speaker_display() {
        assert_eq!(Speaker::User.to_string(), "user");
        assert_eq!(Speaker::ActionResult.to_string(), "action-result");
        assert_eq!(Speaker::Diagnostic.to_string(), "system-diagnostic");
    }
}
