use std::fmt;

use serde::{Deserialize, Serialize};

/// Who produced a turn in the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Text typed into the page.
    User,
    /// Text produced by the completion service (or an error in its place).
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single entry in a session transcript.
///
/// Turns are immutable once created; their position in the transcript is
/// their only identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    role: Role,
    text: String,
}

impl ChatTurn {
    /// Create a new turn.
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    /// Create a user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    /// Create an assistant turn.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    /// The role that produced this turn.
    pub fn role(&self) -> Role {
        self.role
    }

    /// The text of this turn.
    pub fn text(&self) -> &str {
        &self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn serializes_with_lowercase_role() {
        let turn = ChatTurn::assistant("Wake up, Neo.");
        assert_eq!(
            to_value(&turn).unwrap(),
            json!({"role": "assistant", "text": "Wake up, Neo."})
        );
    }

    #[test]
    fn constructors_set_role() {
        assert_eq!(ChatTurn::user("hi").role(), Role::User);
        assert_eq!(ChatTurn::assistant("hi").role(), Role::Assistant);
        assert_eq!(ChatTurn::user("hi").text(), "hi");
    }
}
