//! In-memory conversation history for one interactive session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Ordered user/assistant messages of one session.
///
/// [`CopilotService`](crate::CopilotService) only writes through
/// [`record_turn`](Self::record_turn), so a failed turn leaves no unanswered
/// user message behind.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    history: Vec<Message>,
    started_at: Option<DateTime<Utc>>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, message: Message) {
        self.started_at.get_or_insert(message.timestamp);
        self.history.push(message);
    }

    /// Appends a completed turn.
    pub fn record_turn(&mut self, query: impl Into<String>, answer: impl Into<String>) {
        self.push(Message::new(Role::User, query));
        self.push(Message::new(Role::Assistant, answer));
    }

    pub fn messages(&self) -> &[Message] {
        &self.history
    }

    /// Number of completed turns
    pub fn turns(&self) -> usize {
        self.history
            .iter()
            .filter(|m| m.role == Role::User)
            .count()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Time of the first recorded turn
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.started_at = None;
    }
}
