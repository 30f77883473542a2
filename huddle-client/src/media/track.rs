use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSource {
    Camera,
    Microphone,
    Screen,
}

impl TrackSource {
    pub fn kind(self) -> TrackKind {
        match self {
            TrackSource::Microphone => TrackKind::Audio,
            TrackSource::Camera | TrackSource::Screen => TrackKind::Video,
        }
    }
}

/// A local capture track.
///
/// Tracks are shared by reference between the media controller and every
/// peer session. Only the media controller flips the enabled flag; anyone
/// holding the track may read it.
#[derive(Debug)]
pub struct LocalTrack {
    id: String,
    source: TrackSource,
    enabled: AtomicBool,
    stopped: AtomicBool,
}

impl LocalTrack {
    pub fn new(source: TrackSource) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4().to_string(),
            source,
            enabled: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.source.kind()
    }

    pub fn source(&self) -> TrackSource {
        self.source
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub(in crate::media) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Stops capture. Returns `true` only for the call that actually stopped it.
    pub fn stop(&self) -> bool {
        !self.stopped.swap(true, Ordering::SeqCst)
    }
}

/// The canonical outgoing tracks, at most one per kind.
#[derive(Debug, Clone, Default)]
pub struct LocalTrackSet {
    pub audio: Option<Arc<LocalTrack>>,
    pub video: Option<Arc<LocalTrack>>,
}

impl LocalTrackSet {
    pub fn get(&self, kind: TrackKind) -> Option<&Arc<LocalTrack>> {
        match kind {
            TrackKind::Audio => self.audio.as_ref(),
            TrackKind::Video => self.video.as_ref(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<LocalTrack>> {
        self.audio.iter().chain(self.video.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.audio.is_none() && self.video.is_none()
    }
}

/// A track the remote side is sending us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub id: String,
    pub stream_id: String,
    pub kind: TrackKind,
}
