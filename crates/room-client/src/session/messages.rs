//! Session actor messages, states and events.

use tokio::sync::oneshot;

use signaling_protocol::MediaKind;

use crate::errors::SessionError;
use crate::media::LocalTrack;
use crate::session::participants::Participant;
use crate::session::registry::{Consumer, Producer};

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not in a room.
    Idle,
    /// Join sequence in flight.
    Joining,
    /// Established; media flows.
    Joined,
    /// Teardown in flight.
    Leaving,
    /// A fatal error ended the session. Leaving returns to `Idle`.
    Failed,
}

impl SessionState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Joining => "joining",
            SessionState::Joined => "joined",
            SessionState::Leaving => "leaving",
            SessionState::Failed => "failed",
        }
    }
}

/// Outcome of a produce request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProduceOutcome {
    /// The send transport was not ready; the track was queued and will be
    /// produced when it is.
    Queued,
    /// The track was produced immediately.
    Produced { producer_id: String },
}

/// Point-in-time view of the session for embedders and tests.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub room_id: Option<String>,
    pub participants: Vec<Participant>,
    pub producers: Vec<Producer>,
    pub consumers: Vec<Consumer>,
    pub send_transport_ready: bool,
    pub recv_transport_ready: bool,
    pub pending_tracks: usize,
    /// Most recent non-fatal error, for diagnostics.
    pub last_error: Option<String>,
    /// Set when the state is `Failed`.
    pub fatal_reason: Option<String>,
}

/// Commands accepted by the session actor.
#[derive(Debug)]
pub enum SessionCommand {
    /// Run the join sequence for a room.
    Join {
        room_id: String,
        user_id: String,
        display_name: String,
        respond_to: oneshot::Sender<Result<(), SessionError>>,
    },

    /// Leave the room and release all media state.
    Leave {
        respond_to: oneshot::Sender<Result<(), SessionError>>,
    },

    /// Publish one local track.
    ProduceTrack {
        track: LocalTrack,
        respond_to: oneshot::Sender<Result<ProduceOutcome, SessionError>>,
    },

    /// Consume one remote producer. Returns the consumer id.
    Consume {
        producer_id: String,
        peer_id: String,
        kind: MediaKind,
        respond_to: oneshot::Sender<Result<String, SessionError>>,
    },

    /// Read the current session state.
    Snapshot {
        respond_to: oneshot::Sender<SessionSnapshot>,
    },
}

/// Events published by the session for embedder UIs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged {
        state: SessionState,
    },
    ParticipantJoined {
        peer_id: String,
        display_name: String,
    },
    ParticipantLeft {
        peer_id: String,
    },
    TrackProduced {
        producer_id: String,
        kind: MediaKind,
    },
    TrackConsumed {
        peer_id: String,
        producer_id: String,
        consumer_id: String,
        kind: MediaKind,
    },
    /// One track could not be produced; the session continues.
    ProduceFailed {
        track_id: String,
        reason: String,
    },
    /// One remote producer could not be consumed; the session continues.
    ConsumeFailed {
        producer_id: String,
        reason: String,
    },
    /// The signaling wire dropped; the session is degraded until the grace
    /// window elapses.
    SignalingLost,
    /// A fatal error moved the session to `Failed`.
    SessionFailed {
        reason: String,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names() {
        assert_eq!(SessionState::Idle.as_str(), "idle");
        assert_eq!(SessionState::Joined.as_str(), "joined");
        assert_eq!(SessionState::Failed.as_str(), "failed");
    }
}
