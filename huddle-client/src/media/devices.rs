use crate::config::MediaConstraints;
use crate::error::MediaAccessError;
use crate::media::{LocalTrack, LocalTrackSet, TrackSource};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Boundary to the platform's capture devices.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Camera and/or microphone, as requested.
    async fn user_media(
        &self,
        constraints: MediaConstraints,
    ) -> Result<LocalTrackSet, MediaAccessError>;

    /// A screen capture video track.
    async fn display_media(&self) -> Result<Arc<LocalTrack>, MediaAccessError>;
}

/// Devices that hand out tracks without touching any hardware.
#[derive(Debug, Clone, Default)]
pub struct VirtualDevices {
    deny_user_media: bool,
    deny_display: bool,
}

impl VirtualDevices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every capture request is refused.
    pub fn denying() -> Self {
        Self {
            deny_user_media: true,
            deny_display: true,
        }
    }

    pub fn without_display(mut self) -> Self {
        self.deny_display = true;
        self
    }
}

#[async_trait]
impl MediaDevices for VirtualDevices {
    async fn user_media(
        &self,
        constraints: MediaConstraints,
    ) -> Result<LocalTrackSet, MediaAccessError> {
        if self.deny_user_media {
            return Err(MediaAccessError::Denied(
                "camera/microphone permission refused".to_owned(),
            ));
        }
        if !constraints.audio && !constraints.video {
            return Err(MediaAccessError::Unavailable(
                "neither audio nor video requested".to_owned(),
            ));
        }

        let set = LocalTrackSet {
            audio: constraints
                .audio
                .then(|| LocalTrack::new(TrackSource::Microphone)),
            video: constraints
                .video
                .then(|| LocalTrack::new(TrackSource::Camera)),
        };
        debug!(
            audio = set.audio.is_some(),
            video = set.video.is_some(),
            "Virtual capture started"
        );
        Ok(set)
    }

    async fn display_media(&self) -> Result<Arc<LocalTrack>, MediaAccessError> {
        if self.deny_display {
            return Err(MediaAccessError::Denied(
                "screen capture permission refused".to_owned(),
            ));
        }
        Ok(LocalTrack::new(TrackSource::Screen))
    }
}
