use crate::model::media::MediaState;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque participant identity.
///
/// Ordering is plain lexicographic string ordering; negotiation uses it to
/// decide which side yields when both send an offer at once.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[serde(transparent)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ParticipantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
    #[serde(default)]
    pub media_state: MediaState,
}

impl Participant {
    pub fn new(id: impl Into<ParticipantId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            media_state: MediaState::default(),
        }
    }
}
