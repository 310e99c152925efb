//! Remote participant roster.
//!
//! Tracks every remote peer and the streams consumed from them. The
//! signaling stream gives no ordering guarantee between `new-producer` and
//! `peer-joined`, so a stream arriving for an unknown peer creates a
//! placeholder entry that a later `peer-joined` fills in; both arrival
//! orders converge to the same roster.

use std::collections::HashMap;

use signaling_protocol::MediaKind;
use tracing::debug;

/// One stream consumed from a remote peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStream {
    pub consumer_id: String,
    pub producer_id: String,
}

/// One remote participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub peer_id: String,
    /// `None` while only a placeholder (stream seen, announcement pending).
    pub display_name: Option<String>,
    pub audio: Option<RemoteStream>,
    pub video: Option<RemoteStream>,
    /// Unix timestamp of first sighting.
    pub first_seen_at: i64,
}

impl Participant {
    fn placeholder(peer_id: &str) -> Self {
        Self {
            peer_id: peer_id.to_string(),
            display_name: None,
            audio: None,
            video: None,
            first_seen_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Roster of remote participants, keyed by peer id.
#[derive(Debug, Default)]
pub struct ParticipantRegistry {
    peers: HashMap<String, Participant>,
}

impl ParticipantRegistry {
    /// Record a peer announcement (join snapshot or `peer-joined`).
    ///
    /// Fills in the display name on an existing placeholder instead of
    /// replacing it, so streams attached before the announcement survive.
    pub fn upsert_named(&mut self, peer_id: &str, display_name: &str) {
        let participant = self
            .peers
            .entry(peer_id.to_string())
            .or_insert_with(|| Participant::placeholder(peer_id));

        if participant.display_name.is_none() {
            debug!(target: "room.session", peer_id, display_name, "Participant announced");
        }
        participant.display_name = Some(display_name.to_string());
    }

    /// Attach a consumed stream to a peer, creating a placeholder entry if
    /// the peer announcement has not arrived yet.
    pub fn attach_stream(&mut self, peer_id: &str, kind: MediaKind, stream: RemoteStream) {
        let participant = self
            .peers
            .entry(peer_id.to_string())
            .or_insert_with(|| Participant::placeholder(peer_id));

        match kind {
            MediaKind::Audio => participant.audio = Some(stream),
            MediaKind::Video => participant.video = Some(stream),
        }
    }

    /// Remove a peer from the roster. Unknown ids are a no-op.
    pub fn remove(&mut self, peer_id: &str) -> Option<Participant> {
        self.peers.remove(peer_id)
    }

    #[must_use]
    pub fn get(&self, peer_id: &str) -> Option<&Participant> {
        self.peers.get(peer_id)
    }

    #[must_use]
    pub fn contains(&self, peer_id: &str) -> bool {
        self.peers.contains_key(peer_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Roster snapshot, sorted by peer id for stable output.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Participant> {
        let mut participants: Vec<Participant> = self.peers.values().cloned().collect();
        participants.sort_by(|a, b| a.peer_id.cmp(&b.peer_id));
        participants
    }

    pub fn clear(&mut self) {
        self.peers.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn stream(consumer_id: &str, producer_id: &str) -> RemoteStream {
        RemoteStream {
            consumer_id: consumer_id.to_string(),
            producer_id: producer_id.to_string(),
        }
    }

    #[test]
    fn test_announcement_then_stream() {
        let mut roster = ParticipantRegistry::default();
        roster.upsert_named("peerA", "Alice");
        roster.attach_stream("peerA", MediaKind::Video, stream("c-1", "p-1"));

        let participant = roster.get("peerA").unwrap();
        assert_eq!(participant.display_name.as_deref(), Some("Alice"));
        assert_eq!(participant.video, Some(stream("c-1", "p-1")));
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_stream_before_announcement_converges() {
        // new-producer may arrive before peer-joined; both orders must end
        // in the same roster.
        let mut roster = ParticipantRegistry::default();
        roster.attach_stream("peerA", MediaKind::Video, stream("c-1", "p-1"));

        // Placeholder exists but is unnamed.
        assert!(roster.contains("peerA"));
        assert!(roster.get("peerA").unwrap().display_name.is_none());

        roster.upsert_named("peerA", "Alice");

        let participant = roster.get("peerA").unwrap();
        assert_eq!(participant.display_name.as_deref(), Some("Alice"));
        assert_eq!(participant.video, Some(stream("c-1", "p-1")));
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_repeated_announcement_keeps_streams() {
        let mut roster = ParticipantRegistry::default();
        roster.upsert_named("peerA", "Alice");
        roster.attach_stream("peerA", MediaKind::Audio, stream("c-1", "p-1"));
        roster.upsert_named("peerA", "Alice");

        assert_eq!(
            roster.get("peerA").unwrap().audio,
            Some(stream("c-1", "p-1"))
        );
    }

    #[test]
    fn test_remove_returns_participant_with_streams() {
        let mut roster = ParticipantRegistry::default();
        roster.upsert_named("peerA", "Alice");
        roster.attach_stream("peerA", MediaKind::Audio, stream("c-1", "p-1"));
        roster.attach_stream("peerA", MediaKind::Video, stream("c-2", "p-2"));

        let removed = roster.remove("peerA").unwrap();
        assert_eq!(removed.audio, Some(stream("c-1", "p-1")));
        assert_eq!(removed.video, Some(stream("c-2", "p-2")));
        assert!(roster.is_empty());

        // Unknown peer is a no-op.
        assert!(roster.remove("peerA").is_none());
    }

    #[test]
    fn test_snapshot_sorted_by_peer_id() {
        let mut roster = ParticipantRegistry::default();
        roster.upsert_named("peerB", "Bob");
        roster.upsert_named("peerA", "Alice");

        let snapshot = roster.snapshot();
        let ids: Vec<&str> = snapshot.iter().map(|p| p.peer_id.as_str()).collect();
        assert_eq!(ids, vec!["peerA", "peerB"]);
    }
}
