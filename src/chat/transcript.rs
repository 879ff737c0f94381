//! The ordered record of a session's turns.

use crate::types::{ChatTurn, Role};

/// Append-only list of turns owned by one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    turns: Vec<ChatTurn>,
}

impl Transcript {
    /// An empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn at the end.
    pub fn append(&mut self, role: Role, text: impl Into<String>) {
        self.turns.push(ChatTurn::new(role, text));
    }

    /// Discard every turn.
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// All turns, oldest first.
    pub fn all(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// Number of turns.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// True when no turns have been recorded.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_order() {
        let mut transcript = Transcript::new();
        transcript.append(Role::User, "one");
        transcript.append(Role::Assistant, "two");
        transcript.append(Role::User, "three");
        let texts: Vec<&str> = transcript.all().iter().map(|t| t.text()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
        assert_eq!(transcript.len(), 3);
    }

    #[test]
    fn clear_empties_regardless_of_length() {
        for n in [0, 1, 2, 17] {
            let mut transcript = Transcript::new();
            for i in 0..n {
                transcript.append(Role::User, format!("turn {i}"));
            }
            transcript.clear();
            assert!(transcript.is_empty());
            assert!(transcript.all().is_empty());
        }
    }
}
