use crate::config::MediaConstraints;
use crate::error::MediaAccessError;
use crate::media::{LocalTrack, LocalTrackSet, MediaDevices, TrackKind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Owns the local capture tracks for the lifetime of a room session.
///
/// The current [`LocalTrackSet`] is published on a `watch` channel; peer
/// sessions subscribe to it and follow source replacements. Tracks are
/// stopped on [`release`](Self::release) or when the controller is dropped.
pub struct LocalMediaController {
    tracks: watch::Sender<LocalTrackSet>,
    released: AtomicBool,
}

impl LocalMediaController {
    pub async fn acquire(
        devices: &dyn MediaDevices,
        constraints: MediaConstraints,
    ) -> Result<Self, MediaAccessError> {
        let set = devices.user_media(constraints).await?;
        info!(
            audio = set.audio.is_some(),
            video = set.video.is_some(),
            "Local media acquired"
        );
        Ok(Self::with_tracks(set))
    }

    /// A controller that publishes nothing, for rooms joined without media.
    pub fn empty() -> Self {
        Self::with_tracks(LocalTrackSet::default())
    }

    fn with_tracks(set: LocalTrackSet) -> Self {
        let (tracks, _) = watch::channel(set);
        Self {
            tracks,
            released: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<LocalTrackSet> {
        self.tracks.subscribe()
    }

    pub fn tracks(&self) -> LocalTrackSet {
        self.tracks.borrow().clone()
    }

    pub fn is_enabled(&self, kind: TrackKind) -> bool {
        self.tracks
            .borrow()
            .get(kind)
            .is_some_and(|t| t.is_enabled())
    }

    /// Flips the active flag of the current track of `kind`.
    ///
    /// Returns `false` when there is no such track.
    pub fn set_enabled(&self, kind: TrackKind, enabled: bool) -> bool {
        let set = self.tracks.borrow();
        let Some(track) = set.get(kind) else {
            return false;
        };
        track.set_enabled(enabled);
        debug!(%kind, enabled, "Local track toggled");
        true
    }

    /// Makes `new` the outgoing video track and returns the one it replaced.
    ///
    /// The old track is not stopped here; the caller owns it from now on.
    pub fn replace_video_source(&self, new: Arc<LocalTrack>) -> Option<Arc<LocalTrack>> {
        if self.released.load(Ordering::SeqCst) {
            warn!("Video source replaced after release; stopping new track");
            new.stop();
            return None;
        }
        if new.kind() != TrackKind::Video {
            warn!(source = ?new.source(), "Refusing non-video track as video source");
            return None;
        }

        info!(track = new.id(), source = ?new.source(), "Replacing video source");
        let mut old = None;
        self.tracks.send_modify(|set| {
            old = set.video.replace(new);
        });
        old
    }

    /// Number of tracks currently owned and not stopped.
    pub fn active_track_count(&self) -> usize {
        self.tracks
            .borrow()
            .iter()
            .filter(|t| !t.is_stopped())
            .count()
    }

    /// Stops every owned track. Returns how many were stopped by this call.
    pub fn release(&self) -> usize {
        self.released.store(true, Ordering::SeqCst);
        let set = self.tracks.send_replace(LocalTrackSet::default());
        let stopped = set.iter().filter(|t| t.stop()).count();
        if stopped > 0 {
            info!(stopped, "Local media released");
        }
        stopped
    }
}

impl Drop for LocalMediaController {
    fn drop(&mut self) {
        self.release();
    }
}
