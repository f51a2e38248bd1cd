use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::draft::BookingDraft;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Output of one dialogue step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DialogueResult {
    pub next_question: String,
    pub is_complete: bool,
    pub updated_data: BookingDraft,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

impl DialogueResult {
    /// A prompt that changes nothing and does not complete the booking.
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            next_question: text.into(),
            is_complete: false,
            updated_data: BookingDraft::default(),
            suggestions: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Collecting,
    Confirming,
    Booked,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Collecting => "collecting",
            SessionState::Confirming => "confirming",
            SessionState::Booked => "booked",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "confirming" => SessionState::Confirming,
            "booked" => SessionState::Booked,
            _ => SessionState::Collecting,
        }
    }
}

/// One chat booking. Owned by a single client; steps must not overlap.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub history: Vec<ConversationTurn>,
    pub draft: BookingDraft,
    pub state: SessionState,
    pub appointment_id: Option<String>,
    pub last_activity: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

impl Session {
    pub fn new(id: impl Into<String>, ttl_minutes: i64) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: id.into(),
            history: vec![],
            draft: BookingDraft::default(),
            state: SessionState::Collecting,
            appointment_id: None,
            last_activity: now,
            expires_at: now + chrono::Duration::minutes(ttl_minutes),
        }
    }

    pub fn touch(&mut self, ttl_minutes: i64) {
        let now = chrono::Utc::now().naive_utc();
        self.last_activity = now;
        self.expires_at = now + chrono::Duration::minutes(ttl_minutes);
    }

    /// Drops everything collected so far and keeps the session id.
    pub fn restart(&mut self) {
        self.history.clear();
        self.draft = BookingDraft::default();
        self.state = SessionState::Collecting;
        self.appointment_id = None;
    }
}
