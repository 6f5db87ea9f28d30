use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_RETAINED_TURNS: usize = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "Customer",
            Self::Assistant => "Assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Bounded, ordered transcript of a session. Oldest turns are dropped first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conversation {
    turns: VecDeque<ConversationTurn>,
    max_turns: usize,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::with_capacity_limit(DEFAULT_MAX_RETAINED_TURNS)
    }
}

impl Conversation {
    pub fn with_capacity_limit(max_turns: usize) -> Self {
        Self { turns: VecDeque::new(), max_turns: max_turns.max(1) }
    }

    pub fn from_turns<I>(turns: I, max_turns: usize) -> Self
    where
        I: IntoIterator<Item = ConversationTurn>,
    {
        let mut conversation = Self::with_capacity_limit(max_turns);
        for turn in turns {
            conversation.push(turn);
        }
        conversation
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push_back(turn);
        while self.turns.len() > self.max_turns {
            self.turns.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    pub fn last_assistant(&self) -> Option<&ConversationTurn> {
        self.turns.iter().rev().find(|turn| turn.role == Role::Assistant)
    }

    /// Renders the last `count` turns as `Label: content` lines.
    pub fn excerpt(&self, count: usize) -> String {
        let skip = self.turns.len().saturating_sub(count);
        self.turns
            .iter()
            .skip(skip)
            .map(|turn| format!("{}: {}", turn.role.label(), turn.content.trim()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
