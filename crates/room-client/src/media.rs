//! Local media capture.
//!
//! The session core does not touch real capture hardware; it works against
//! the [`MediaSource`] trait so embedders can plug in a device-backed
//! implementation while tests and headless tools use
//! [`SyntheticMediaSource`].

use signaling_protocol::MediaKind;
use uuid::Uuid;

/// A local media track handle.
///
/// Identifies one captured stream of a single kind. The `enabled` flag is a
/// local mute toggle; it does not affect the producer lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTrack {
    /// Locally unique track id.
    pub id: String,
    /// Audio or video.
    pub kind: MediaKind,
    /// Whether the track is currently live (unmuted).
    pub enabled: bool,
}

impl LocalTrack {
    /// Create a new enabled track of the given kind.
    #[must_use]
    pub fn new(kind: MediaKind) -> Self {
        Self {
            id: format!("{}-{}", kind.as_str(), Uuid::new_v4()),
            kind,
            enabled: true,
        }
    }
}

/// Tracks returned by one acquisition.
#[derive(Debug, Clone, Default)]
pub struct AcquiredTracks {
    pub audio: Option<LocalTrack>,
    pub video: Option<LocalTrack>,
}

/// Source of local capture tracks.
///
/// Acquisition is idempotent: acquiring an already-acquired source returns
/// the same tracks. Toggling flips the enabled flag without re-acquisition
/// and returns the new state, or `None` when no such track exists.
pub trait MediaSource: Send {
    /// Acquire (or return the already-acquired) local tracks.
    fn acquire(&mut self) -> AcquiredTracks;

    /// Flip the audio track's enabled flag.
    fn toggle_audio(&mut self) -> Option<bool>;

    /// Flip the video track's enabled flag.
    fn toggle_video(&mut self) -> Option<bool>;

    /// Release all acquired tracks.
    fn release(&mut self);
}

/// Media source backed by synthetic tracks.
///
/// Used by tests and headless tools; produces one audio and one video track
/// with no device behind them.
#[derive(Debug, Default)]
pub struct SyntheticMediaSource {
    audio: Option<LocalTrack>,
    video: Option<LocalTrack>,
}

impl SyntheticMediaSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl MediaSource for SyntheticMediaSource {
    fn acquire(&mut self) -> AcquiredTracks {
        let audio = self
            .audio
            .get_or_insert_with(|| LocalTrack::new(MediaKind::Audio))
            .clone();
        let video = self
            .video
            .get_or_insert_with(|| LocalTrack::new(MediaKind::Video))
            .clone();

        AcquiredTracks {
            audio: Some(audio),
            video: Some(video),
        }
    }

    fn toggle_audio(&mut self) -> Option<bool> {
        self.audio.as_mut().map(|track| {
            track.enabled = !track.enabled;
            track.enabled
        })
    }

    fn toggle_video(&mut self) -> Option<bool> {
        self.video.as_mut().map(|track| {
            track.enabled = !track.enabled;
            track.enabled
        })
    }

    fn release(&mut self) {
        self.audio = None;
        self.video = None;
    }
}
