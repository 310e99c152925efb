//! Session error types.
//!
//! The taxonomy separates session-fatal failures (join path, transport
//! creation and connect) from per-track failures (produce/consume) that leave
//! the session running. [`SessionError::is_fatal`] encodes that policy.

use thiserror::Error;

/// Room client error type.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The server rejected the join request or it timed out.
    #[error("Join failed: {0}")]
    JoinFailed(String),

    /// A join was requested while another join was in flight or the session
    /// was already established.
    #[error("Session already joining or joined")]
    AlreadyJoined,

    /// The operation is not valid in the current session state.
    #[error("Invalid session state: {0}")]
    InvalidState(String),

    /// The local device cannot satisfy the router's minimum codec set.
    /// Fatal: no partial negotiation.
    #[error("Unsupported capabilities: {0}")]
    UnsupportedCapabilities(String),

    /// An operation requiring a negotiated capability set was invoked before
    /// negotiation completed.
    #[error("Device not ready: capabilities have not been negotiated")]
    DeviceNotReady,

    /// Transport creation failed. Fatal: partial transport state cannot be
    /// safely resumed.
    #[error("Transport creation failed: {0}")]
    TransportCreationFailed(String),

    /// The connect handshake for a transport failed. Fatal.
    #[error("Transport connect failed for {transport_id}: {reason}")]
    TransportConnectFailed {
        transport_id: String,
        reason: String,
    },

    /// Producing one local track failed. Non-fatal: other tracks and the
    /// session continue.
    #[error("Produce failed for track {track_id}: {reason}")]
    ProduceFailed { track_id: String, reason: String },

    /// The server could not satisfy consumption for one remote producer.
    /// Non-fatal: the participant is simply missing that media kind.
    #[error("Consume rejected for producer {producer_id}: {reason}")]
    ConsumeRejected {
        producer_id: String,
        reason: String,
    },

    /// The signaling channel dropped. Transient at first; fatal once the
    /// degraded window elapses without recovery.
    #[error("Signaling channel disconnected")]
    SignalingDisconnected,

    /// Internal channel plumbing failed (actor mailbox or response channel
    /// closed unexpectedly).
    #[error("Internal channel error: {0}")]
    Channel(String),
}

impl SessionError {
    /// Whether this error terminates the session.
    ///
    /// Join-path and transport failures are session-fatal; per-track
    /// produce/consume failures are reported and logged but leave the
    /// session in `Joined`.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            SessionError::JoinFailed(_)
            | SessionError::UnsupportedCapabilities(_)
            | SessionError::TransportCreationFailed(_)
            | SessionError::TransportConnectFailed { .. }
            | SessionError::SignalingDisconnected => true,
            SessionError::AlreadyJoined
            | SessionError::InvalidState(_)
            | SessionError::DeviceNotReady
            | SessionError::ProduceFailed { .. }
            | SessionError::ConsumeRejected { .. }
            | SessionError::Channel(_) => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(SessionError::JoinFailed("rejected".to_string()).is_fatal());
        assert!(SessionError::UnsupportedCapabilities("no opus".to_string()).is_fatal());
        assert!(SessionError::TransportCreationFailed("overloaded".to_string()).is_fatal());
        assert!(SessionError::TransportConnectFailed {
            transport_id: "t-1".to_string(),
            reason: "dtls".to_string(),
        }
        .is_fatal());
        assert!(SessionError::SignalingDisconnected.is_fatal());
    }

    #[test]
    fn test_non_fatal_classification() {
        assert!(!SessionError::AlreadyJoined.is_fatal());
        assert!(!SessionError::DeviceNotReady.is_fatal());
        assert!(!SessionError::InvalidState("leave while joining".to_string()).is_fatal());
        assert!(!SessionError::ProduceFailed {
            track_id: "trk-1".to_string(),
            reason: "codec".to_string(),
        }
        .is_fatal());
        assert!(!SessionError::ConsumeRejected {
            producer_id: "p-1".to_string(),
            reason: "capabilities".to_string(),
        }
        .is_fatal());
        assert!(!SessionError::Channel("closed".to_string()).is_fatal());
    }

    #[test]
    fn test_display_formatting() {
        assert_eq!(
            format!("{}", SessionError::JoinFailed("room full".to_string())),
            "Join failed: room full"
        );
        assert_eq!(
            format!(
                "{}",
                SessionError::ConsumeRejected {
                    producer_id: "p-9".to_string(),
                    reason: "no compatible codec".to_string(),
                }
            ),
            "Consume rejected for producer p-9: no compatible codec"
        );
        assert_eq!(
            format!("{}", SessionError::DeviceNotReady),
            "Device not ready: capabilities have not been negotiated"
        );
    }
}
