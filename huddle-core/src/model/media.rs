use serde::{Deserialize, Serialize};

/// What a participant currently publishes.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct MediaState {
    pub camera_on: bool,
    pub mic_on: bool,
    pub screen_sharing: bool,
}

impl Default for MediaState {
    fn default() -> Self {
        Self {
            camera_on: true,
            mic_on: true,
            screen_sharing: false,
        }
    }
}
