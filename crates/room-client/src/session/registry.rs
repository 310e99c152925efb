//! Producer and consumer bookkeeping.
//!
//! Pure state, no I/O: the session actor performs the signaling round trips
//! and records outcomes here. Closes are idempotent and the pending-track
//! queue drains in FIFO order, exactly once.

use std::collections::{HashMap, VecDeque};

use signaling_protocol::MediaKind;
use tracing::debug;

use crate::media::LocalTrack;

/// One local producer registered with the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Producer {
    /// Router-assigned producer id.
    pub id: String,
    /// Local track this producer publishes.
    pub track_id: String,
    pub kind: MediaKind,
    /// Send transport carrying this producer.
    pub transport_id: String,
}

/// One consumer receiving a remote producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consumer {
    /// Router-assigned consumer id.
    pub id: String,
    /// Remote producer this consumer receives.
    pub producer_id: String,
    /// Peer that owns the remote producer.
    pub peer_id: String,
    pub kind: MediaKind,
    /// Receive transport carrying this consumer.
    pub transport_id: String,
    /// Consumers start paused and are resumed after creation.
    pub paused: bool,
}

/// Registry of local producers, remote consumers and queued tracks.
#[derive(Debug, Default)]
pub struct MediaRegistry {
    producers: HashMap<String, Producer>,
    consumers: HashMap<String, Consumer>,
    pending_tracks: VecDeque<LocalTrack>,
}

impl MediaRegistry {
    /// Queue a track published before the send transport was ready.
    pub fn queue_track(&mut self, track: LocalTrack) {
        debug!(target: "room.session", track_id = %track.id, "Track queued until send transport is ready");
        self.pending_tracks.push_back(track);
    }

    /// Drain the pending-track queue in FIFO order.
    pub fn drain_pending(&mut self) -> Vec<LocalTrack> {
        self.pending_tracks.drain(..).collect()
    }

    /// Number of tracks waiting for the send transport.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending_tracks.len()
    }

    pub fn insert_producer(&mut self, producer: Producer) {
        self.producers.insert(producer.id.clone(), producer);
    }

    /// Close a producer. Idempotent: returns whether it was open.
    pub fn close_producer(&mut self, producer_id: &str) -> bool {
        self.producers.remove(producer_id).is_some()
    }

    pub fn insert_consumer(&mut self, consumer: Consumer) {
        self.consumers.insert(consumer.id.clone(), consumer);
    }

    /// Close a consumer. Idempotent: returns whether it was open.
    pub fn close_consumer(&mut self, consumer_id: &str) -> bool {
        self.consumers.remove(consumer_id).is_some()
    }

    /// Mark a consumer as resumed after the router confirmed the resume.
    pub fn mark_consumer_resumed(&mut self, consumer_id: &str) {
        if let Some(consumer) = self.consumers.get_mut(consumer_id) {
            consumer.paused = false;
        }
    }

    /// Whether a consumer for this remote producer already exists.
    #[must_use]
    pub fn consumer_for_producer(&self, producer_id: &str) -> Option<&Consumer> {
        self.consumers.values().find(|c| c.producer_id == producer_id)
    }

    /// Consumer ids attached to one peer, for eviction on peer-left.
    #[must_use]
    pub fn consumers_for_peer(&self, peer_id: &str) -> Vec<String> {
        self.consumers
            .values()
            .filter(|c| c.peer_id == peer_id)
            .map(|c| c.id.clone())
            .collect()
    }

    #[must_use]
    pub fn producers(&self) -> Vec<Producer> {
        self.producers.values().cloned().collect()
    }

    #[must_use]
    pub fn consumers(&self) -> Vec<Consumer> {
        self.consumers.values().cloned().collect()
    }

    #[must_use]
    pub fn producer_count(&self) -> usize {
        self.producers.len()
    }

    #[must_use]
    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    /// Close everything. Returns `(producers, consumers)` closed by this
    /// call; a second call closes nothing.
    pub fn close_all(&mut self) -> (usize, usize) {
        let producers = self.producers.len();
        let consumers = self.consumers.len();
        self.producers.clear();
        self.consumers.clear();
        self.pending_tracks.clear();
        (producers, consumers)
    }
}
