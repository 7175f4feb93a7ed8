//! Transcript entry types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, stable identifier of a turn
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnId(String);

impl TurnId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who authored a turn
///
/// Serialized with the role names the model API uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "model")]
    Assistant,
}

/// Lifecycle of a turn's content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    /// Still receiving streamed fragments
    Pending,
    #[default]
    Complete,
    /// The stream feeding this turn broke off; text is whatever arrived
    Failed,
}

/// Identity and creation time for a turn that is about to be created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnStamp {
    pub id: TurnId,
    pub created_at: DateTime<Utc>,
}

impl TurnStamp {
    pub fn new(id: TurnId, created_at: DateTime<Utc>) -> Self {
        Self { id, created_at }
    }

    pub fn now() -> Self {
        Self::new(TurnId::generate(), Utc::now())
    }
}

/// One entry in the conversation transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub id: TurnId,
    pub speaker: Speaker,
    pub text: String,
    pub status: TurnStatus,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn user(stamp: TurnStamp, text: impl Into<String>) -> Self {
        Self::build(stamp, Speaker::User, text.into(), TurnStatus::Complete)
    }

    /// A finished assistant turn (greeting, apology)
    pub fn assistant(stamp: TurnStamp, text: impl Into<String>) -> Self {
        Self::build(stamp, Speaker::Assistant, text.into(), TurnStatus::Complete)
    }

    /// An empty assistant turn awaiting stream data
    pub fn placeholder(stamp: TurnStamp) -> Self {
        Self::build(stamp, Speaker::Assistant, String::new(), TurnStatus::Pending)
    }

    fn build(stamp: TurnStamp, speaker: Speaker, text: String, status: TurnStatus) -> Self {
        Self {
            id: stamp.id,
            speaker,
            text,
            status,
            created_at: stamp.created_at,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TurnStatus::Pending
    }

    /// Wire representation for renderers, with the derived `pending` flag
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "speaker": self.speaker,
            "text": self.text,
            "status": self.status,
            "pending": self.is_pending(),
            "created_at": self.created_at,
        })
    }
}
