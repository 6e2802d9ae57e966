use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// At most 10 turns (5 exchanges) travel with each request.
pub const MAX_TURNS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user<T: Into<String>>(content: T) -> Self {
        Turn { role: Role::User, content: content.into() }
    }

    pub fn assistant<T: Into<String>>(content: T) -> Self {
        Turn { role: Role::Assistant, content: content.into() }
    }
}

/// Ordered log of prior turns, oldest first. Eviction is FIFO: once the
/// buffer holds MAX_TURNS turns, each completed exchange pushes out the two
/// oldest ones.
#[derive(Debug, Default)]
pub struct HistoryBuffer {
    turns: VecDeque<Turn>,
}

impl HistoryBuffer {
    pub fn new() -> Self {
        HistoryBuffer { turns: VecDeque::with_capacity(MAX_TURNS) }
    }

    pub fn push_turn(&mut self, turn: Turn) {
        self.turns.push_back(turn);
        while self.turns.len() > MAX_TURNS {
            self.turns.pop_front();
        }
    }

    /// Records a completed exchange. Only called on terminal success; a
    /// failed or retrying request never reaches this.
    pub fn record_exchange(&mut self, user_text: &str, assistant_text: &str) {
        self.push_turn(Turn::user(user_text));
        self.push_turn(Turn::assistant(assistant_text));
    }

    /// Ordered copy for inclusion in an outbound request. Does not mutate.
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    /// JSON array of turns as the relay expects on the `history` field.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.snapshot())
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_never_exceeds_cap() {
        let mut buf = HistoryBuffer::new();
        for i in 0..20 {
            buf.record_exchange(&format!("q{}", i), &format!("a{}", i));
            assert!(buf.len() <= MAX_TURNS);
            assert_eq!(buf.len() % 2, 0);
        }
        assert_eq!(buf.len(), MAX_TURNS);
    }

    #[test]
    fn eviction_drops_oldest_pair_first() {
        let mut buf = HistoryBuffer::new();
        for i in 0..6 {
            buf.record_exchange(&format!("q{}", i), &format!("a{}", i));
        }
        // Exchange 0 has been evicted; exchange 1 is now the oldest.
        let snap = buf.snapshot();
        assert_eq!(snap.len(), MAX_TURNS);
        assert_eq!(snap[0], Turn::user("q1"));
        assert_eq!(snap[1], Turn::assistant("a1"));
        assert_eq!(snap[9], Turn::assistant("a5"));
    }

    #[test]
    fn ordering_is_insertion_order() {
        let mut buf = HistoryBuffer::new();
        buf.record_exchange("first", "one");
        buf.record_exchange("second", "two");
        let snap = buf.snapshot();
        assert_eq!(
            snap,
            vec![
                Turn::user("first"),
                Turn::assistant("one"),
                Turn::user("second"),
                Turn::assistant("two"),
            ]
        );
    }

    #[test]
    fn snapshot_does_not_mutate() {
        let mut buf = HistoryBuffer::new();
        buf.record_exchange("q", "a");
        let before = buf.snapshot();
        let _ = buf.snapshot();
        assert_eq!(buf.snapshot(), before);
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn serializes_with_lowercase_roles() {
        let mut buf = HistoryBuffer::new();
        buf.record_exchange("hi", "hello");
        let json = buf.to_json().unwrap();
        assert_eq!(
            json,
            r#"[{"role":"user","content":"hi"},{"role":"assistant","content":"hello"}]"#
        );
    }
}
