use crate::model::participant::ParticipantId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub from: ParticipantId,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(from: ParticipantId, content: impl Into<String>) -> Self {
        Self {
            from,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}
