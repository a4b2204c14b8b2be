//! crates/unimate_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Account role. Admins bypass the chat rate limiter and can reach the
/// admin routes; everyone else is a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Student,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Admin => "admin",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Per-user settings captured at registration and editable later.
#[derive(Debug, Clone, Default)]
pub struct Preferences {
    pub language: String,
    pub university: String,
    pub course: String,
}

// Represents a user - used throughout the app. Never carries the
// password digest.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub preferences: Preferences,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Only used internally for login - contains sensitive data.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// The author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("unknown message role '{other}'")),
        }
    }
}

/// A single transcript entry. Immutable once appended; `sources` is only
/// ever populated for assistant messages.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub sources: Vec<String>,
}

/// Mutable metadata attached to a conversation, merged (never replaced)
/// on each send.
#[derive(Debug, Clone, Default)]
pub struct ConversationContext {
    pub university: String,
    pub stage: String,
    pub preferences: serde_json::Map<String, serde_json::Value>,
}

impl ConversationContext {
    /// Overlays `incoming` onto `self`: non-empty incoming fields win,
    /// empty or absent fields never overwrite stored ones. Preference
    /// entries merge key-wise.
    pub fn merge(&mut self, incoming: &ConversationContext) {
        if !incoming.university.is_empty() {
            self.university = incoming.university.clone();
        }
        if !incoming.stage.is_empty() {
            self.stage = incoming.stage.clone();
        }
        for (key, value) in &incoming.preferences {
            self.preferences.insert(key.clone(), value.clone());
        }
    }
}

/// An ordered, append-only chat transcript owned by exactly one user and
/// keyed additionally by an opaque session identifier.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub session_id: String,
    pub messages: Vec<ChatMessage>,
    pub context: ConversationContext,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One page of a user's conversations, most recently updated first.
#[derive(Debug, Clone)]
pub struct ConversationPage {
    pub conversations: Vec<Conversation>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

impl ConversationPage {
    pub fn pages(&self) -> u64 {
        (self.total + self.limit as u64 - 1) / self.limit as u64
    }

    pub fn has_more(&self) -> bool {
        (self.page as u64) * (self.limit as u64) < self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context(university: &str, stage: &str, prefs: &[(&str, &str)]) -> ConversationContext {
        ConversationContext {
            university: university.to_string(),
            stage: stage.to_string(),
            preferences: prefs
                .iter()
                .map(|(k, v)| (k.to_string(), json!(v)))
                .collect(),
        }
    }

    #[test]
    fn merge_lets_nonempty_request_fields_win() {
        let mut stored = context("Colombo", "applied", &[("stream", "maths")]);
        let incoming = context("Peradeniya", "", &[]);

        stored.merge(&incoming);

        assert_eq!(stored.university, "Peradeniya");
        assert_eq!(stored.stage, "applied");
        assert_eq!(stored.preferences["stream"], json!("maths"));
    }

    #[test]
    fn merge_combines_preferences_keywise() {
        let mut stored = context("", "", &[("stream", "maths"), ("district", "Kandy")]);
        let incoming = context("", "", &[("stream", "bio"), ("shift", "day")]);

        stored.merge(&incoming);

        assert_eq!(stored.preferences["stream"], json!("bio"));
        assert_eq!(stored.preferences["district"], json!("Kandy"));
        assert_eq!(stored.preferences["shift"], json!("day"));
    }

    #[test]
    fn page_math_rounds_up_and_detects_more() {
        let page = ConversationPage {
            conversations: Vec::new(),
            page: 2,
            limit: 20,
            total: 45,
        };
        assert_eq!(page.pages(), 3);
        assert!(page.has_more());

        let last = ConversationPage {
            conversations: Vec::new(),
            page: 3,
            limit: 20,
            total: 45,
        };
        assert!(!last.has_more());
    }
}
