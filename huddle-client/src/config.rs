use huddle_core::IceServerConfig;
use huddle_core::utils::{DEFAULT_STUN_ADDR, DEFAULT_STUN_ADDR_2};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What `join` does when local capture is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaPolicy {
    #[default]
    Abort,
    ContinueWithout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Base URL of the relay, e.g. `ws://127.0.0.1:8000`.
    pub signaling_url: String,
    pub ice_servers: Vec<IceServerConfig>,
    pub snapshot_timeout: Duration,
    /// How long a session may stay disconnected before it is declared failed.
    pub connectivity_timeout: Duration,
    /// How long a local offer may go unanswered before negotiation fails.
    pub negotiation_timeout: Duration,
    /// Upper bound for joining a session task during teardown.
    pub close_timeout: Duration,
    pub media_policy: MediaPolicy,
    pub constraints: MediaConstraints,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            signaling_url: "ws://127.0.0.1:8000".to_owned(),
            ice_servers: vec![IceServerConfig {
                urls: vec![DEFAULT_STUN_ADDR.to_owned(), DEFAULT_STUN_ADDR_2.to_owned()],
                username: None,
                credential: None,
            }],
            snapshot_timeout: Duration::from_secs(10),
            connectivity_timeout: Duration::from_secs(15),
            negotiation_timeout: Duration::from_secs(10),
            close_timeout: Duration::from_secs(2),
            media_policy: MediaPolicy::default(),
            constraints: MediaConstraints::default(),
        }
    }
}

impl SessionConfig {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
