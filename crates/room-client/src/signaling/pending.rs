//! Pending-request correlation map.
//!
//! Every correlated signaling request registers a `(event-type,
//! correlation-id)` key here before it is emitted. Incoming responses are
//! routed by the key they carry, never by arrival order, with
//! single-fulfillment semantics: fulfilling removes the entry, and a
//! response with no matching entry is stale and dropped. A stale
//! confirmation can therefore never satisfy a future request for the same
//! key.

use std::collections::HashMap;

use signaling_protocol::{ServerMessage, TransportDirection};
use tokio::sync::oneshot;

/// Key identifying one in-flight correlated request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequestKey {
    /// The single join request (at most one in flight per session).
    Join,
    /// Transport creation, correlated by direction.
    CreateTransport(TransportDirection),
    /// Connect handshake, correlated by transport id.
    ConnectTransport(String),
    /// Produce, correlated by transport id.
    Produce(String),
    /// Consume, correlated by producer id.
    Consume(String),
    /// Resume, correlated by consumer id.
    ResumeConsumer(String),
}

impl RequestKey {
    /// Derives the key a server message fulfills, or `None` for
    /// notifications that are not responses to any request.
    #[must_use]
    pub fn for_response(message: &ServerMessage) -> Option<RequestKey> {
        match message {
            ServerMessage::JoinSuccess { .. } | ServerMessage::JoinError { .. } => {
                Some(RequestKey::Join)
            }
            ServerMessage::TransportCreated { producing, .. } => {
                Some(RequestKey::CreateTransport(if *producing {
                    TransportDirection::Send
                } else {
                    TransportDirection::Receive
                }))
            }
            ServerMessage::TransportConnected { transport_id, .. } => {
                Some(RequestKey::ConnectTransport(transport_id.clone()))
            }
            ServerMessage::Produced { transport_id, .. } => {
                Some(RequestKey::Produce(transport_id.clone()))
            }
            ServerMessage::Consumed { producer_id, .. } => {
                Some(RequestKey::Consume(producer_id.clone()))
            }
            ServerMessage::ConsumerResumed { consumer_id, .. } => {
                Some(RequestKey::ResumeConsumer(consumer_id.clone()))
            }
            ServerMessage::NewProducer { .. }
            | ServerMessage::PeerJoined { .. }
            | ServerMessage::PeerLeft { .. } => None,
        }
    }
}

/// Outcome of routing one inbound server message.
#[derive(Debug)]
pub enum Routed {
    /// The message fulfilled a pending request.
    Fulfilled,
    /// The message was a response but nothing was waiting for it.
    Stale(ServerMessage),
    /// The message is a notification for the session.
    Notification(ServerMessage),
}

/// Map of in-flight correlated requests.
#[derive(Debug, Default)]
pub struct PendingRequests {
    entries: HashMap<RequestKey, oneshot::Sender<ServerMessage>>,
}

impl PendingRequests {
    /// Register a pending request.
    ///
    /// Fails when a request with the same key is already in flight; callers
    /// must serialize requests that share a correlation key.
    pub fn register(
        &mut self,
        key: RequestKey,
        respond_to: oneshot::Sender<ServerMessage>,
    ) -> Result<(), RequestKey> {
        if self.entries.contains_key(&key) {
            return Err(key);
        }
        self.entries.insert(key, respond_to);
        Ok(())
    }

    /// Route an inbound server message to its pending request, if any.
    #[must_use]
    pub fn route(&mut self, message: ServerMessage) -> Routed {
        let Some(key) = RequestKey::for_response(&message) else {
            return Routed::Notification(message);
        };

        match self.entries.remove(&key) {
            Some(respond_to) => match respond_to.send(message) {
                Ok(()) => Routed::Fulfilled,
                // Receiver gave up (timeout); the response is stale.
                Err(message) => Routed::Stale(message),
            },
            None => Routed::Stale(message),
        }
    }

    /// Withdraw a pending request (e.g. after a caller-side timeout) so a
    /// late response is treated as stale.
    pub fn cancel(&mut self, key: &RequestKey) {
        self.entries.remove(key);
    }

    /// Drop every pending request, waking all waiters with a channel error.
    /// Called on signaling loss and teardown.
    pub fn fail_all(&mut self) {
        self.entries.clear();
    }

    /// Number of requests currently in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no requests are in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
