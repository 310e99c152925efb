//! Signaling channel adapter.
//!
//! The `SignalingChannel` actor owns the two halves of the signaling wire (an
//! outbound [`ClientMessage`] sender and an inbound [`ServerMessage`]
//! receiver; framing and reconnection live with the wire's owner) and routes
//! every inbound message exactly once:
//!
//! - responses are matched to in-flight requests through the
//!   [`PendingRequests`] correlation map,
//! - notifications are forwarded to the session mailbox,
//! - stale or duplicate confirmations are counted and dropped.
//!
//! All routing state lives inside the actor loop; callers interact through a
//! clonable [`SignalingHandle`] using message passing, so no locks are
//! needed.

pub mod pending;

use std::sync::Arc;

use signaling_protocol::{ClientMessage, ServerMessage};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::SessionError;
use crate::metrics::SessionMetrics;

pub use pending::{PendingRequests, RequestKey, Routed};

/// Default channel buffer size for the command mailbox.
const COMMAND_CHANNEL_BUFFER: usize = 100;

/// Commands accepted by the signaling channel actor.
#[derive(Debug)]
enum ChannelCommand {
    /// Fire-and-forget emit.
    Emit { message: ClientMessage },

    /// Correlated request: register the key, emit the message, and fulfill
    /// `respond_to` when the matching response arrives.
    Request {
        message: ClientMessage,
        key: RequestKey,
        respond_to: oneshot::Sender<ServerMessage>,
    },

    /// Withdraw a pending request after a caller-side timeout.
    Cancel { key: RequestKey },
}

/// Events forwarded from the channel to the session.
#[derive(Debug)]
pub enum ChannelEvent {
    /// A server notification that is not a response to any request.
    Notification(ServerMessage),

    /// The signaling wire closed. All in-flight requests have been failed.
    Disconnected,
}

/// Handle to a running [`SignalingChannel`].
#[derive(Clone, Debug)]
pub struct SignalingHandle {
    sender: mpsc::Sender<ChannelCommand>,
    connected: watch::Receiver<bool>,
}

impl SignalingHandle {
    /// Emit a message without awaiting any response.
    pub async fn emit(&self, message: ClientMessage) -> Result<(), SessionError> {
        self.sender
            .send(ChannelCommand::Emit { message })
            .await
            .map_err(|_| SessionError::SignalingDisconnected)
    }

    /// Emit a correlated request and await its response, bounded by
    /// `timeout`.
    ///
    /// On timeout the pending key is withdrawn so a late response is
    /// discarded as stale rather than satisfying a future request.
    pub async fn request(
        &self,
        message: ClientMessage,
        key: RequestKey,
        timeout: Duration,
    ) -> Result<ServerMessage, SessionError> {
        let name = message.name();
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(ChannelCommand::Request {
                message,
                key: key.clone(),
                respond_to: tx,
            })
            .await
            .map_err(|_| SessionError::SignalingDisconnected)?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            // The channel dropped our sender: wire loss, teardown, or a
            // duplicate correlation key.
            Ok(Err(_)) => Err(SessionError::SignalingDisconnected),
            Err(_) => {
                let _ = self.sender.send(ChannelCommand::Cancel { key }).await;
                Err(SessionError::Channel(format!(
                    "timed out waiting for response to {name}"
                )))
            }
        }
    }

    /// Whether the signaling wire is currently connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }
}

/// The signaling channel actor.
pub struct SignalingChannel {
    /// Outbound wire half.
    wire_tx: mpsc::Sender<ClientMessage>,
    /// Inbound wire half.
    wire_rx: mpsc::Receiver<ServerMessage>,
    /// Command mailbox.
    receiver: mpsc::Receiver<ChannelCommand>,
    /// Notifications forwarded to the session.
    events_tx: mpsc::Sender<ChannelEvent>,
    /// In-flight correlated requests.
    pending: PendingRequests,
    /// Connectivity flag published to handles.
    connected_tx: watch::Sender<bool>,
    /// Cancellation token (child of the session's token).
    cancel_token: CancellationToken,
    /// Shared metrics.
    metrics: Arc<SessionMetrics>,
}

impl SignalingChannel {
    /// Spawn the channel actor over the given wire halves.
    ///
    /// Returns a handle and the task join handle.
    pub fn spawn(
        wire_tx: mpsc::Sender<ClientMessage>,
        wire_rx: mpsc::Receiver<ServerMessage>,
        events_tx: mpsc::Sender<ChannelEvent>,
        cancel_token: CancellationToken,
        metrics: Arc<SessionMetrics>,
    ) -> (SignalingHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(COMMAND_CHANNEL_BUFFER);
        let (connected_tx, connected_rx) = watch::channel(true);

        let actor = Self {
            wire_tx,
            wire_rx,
            receiver,
            events_tx,
            pending: PendingRequests::default(),
            connected_tx,
            cancel_token,
            metrics,
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = SignalingHandle {
            sender,
            connected: connected_rx,
        };

        (handle, task_handle)
    }

    /// Run the actor message loop.
    async fn run(mut self) {
        debug!(target: "room.signaling", "SignalingChannel started");

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    debug!(target: "room.signaling", "SignalingChannel cancelled");
                    break;
                }

                cmd = self.receiver.recv() => {
                    match cmd {
                        Some(command) => {
                            if self.handle_command(command).await {
                                break;
                            }
                        }
                        None => {
                            debug!(target: "room.signaling", "Command mailbox closed, exiting");
                            break;
                        }
                    }
                }

                inbound = self.wire_rx.recv() => {
                    match inbound {
                        Some(message) => self.handle_inbound(message).await,
                        None => {
                            self.handle_wire_closed().await;
                            break;
                        }
                    }
                }
            }
        }

        self.pending.fail_all();
        let _ = self.connected_tx.send(false);

        info!(target: "room.signaling", "SignalingChannel stopped");
    }

    /// Handle one command. Returns true if the actor should exit.
    async fn handle_command(&mut self, command: ChannelCommand) -> bool {
        match command {
            ChannelCommand::Emit { message } => {
                debug!(target: "room.signaling", event = message.name(), "Emitting");
                if self.wire_tx.send(message).await.is_err() {
                    self.handle_wire_closed().await;
                    return true;
                }
                false
            }

            ChannelCommand::Request {
                message,
                key,
                respond_to,
            } => {
                let event = message.name();
                match self.pending.register(key, respond_to) {
                    Ok(()) => {
                        debug!(target: "room.signaling", event, "Request registered");
                        if self.wire_tx.send(message).await.is_err() {
                            self.handle_wire_closed().await;
                            return true;
                        }
                    }
                    Err(key) => {
                        // The caller's await fails when its sender is dropped.
                        warn!(
                            target: "room.signaling",
                            event,
                            ?key,
                            "Duplicate correlated request dropped"
                        );
                    }
                }
                false
            }

            ChannelCommand::Cancel { key } => {
                debug!(target: "room.signaling", ?key, "Pending request withdrawn");
                self.pending.cancel(&key);
                false
            }
        }
    }

    /// Route one inbound server message.
    async fn handle_inbound(&mut self, message: ServerMessage) {
        let event = message.name();
        match self.pending.route(message) {
            Routed::Fulfilled => {
                debug!(target: "room.signaling", event, "Response correlated");
            }
            Routed::Stale(message) => {
                self.metrics.record_stale_response();
                debug!(
                    target: "room.signaling",
                    event = message.name(),
                    "Stale confirmation discarded"
                );
            }
            Routed::Notification(message) => {
                if self
                    .events_tx
                    .send(ChannelEvent::Notification(message))
                    .await
                    .is_err()
                {
                    debug!(target: "room.signaling", event, "Session gone, notification dropped");
                }
            }
        }
    }

    /// Handle the wire closing underneath us.
    async fn handle_wire_closed(&mut self) {
        warn!(target: "room.signaling", in_flight = self.pending.len(), "Signaling wire closed");
        self.pending.fail_all();
        let _ = self.connected_tx.send(false);
        let _ = self.events_tx.send(ChannelEvent::Disconnected).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use signaling_protocol::TransportDirection;

    struct Harness {
        handle: SignalingHandle,
        wire_rx: mpsc::Receiver<ClientMessage>,
        wire_tx: mpsc::Sender<ServerMessage>,
        events_rx: mpsc::Receiver<ChannelEvent>,
        cancel_token: CancellationToken,
        metrics: Arc<SessionMetrics>,
    }

    fn spawn_channel() -> Harness {
        let (client_tx, wire_rx) = mpsc::channel(16);
        let (wire_tx, server_rx) = mpsc::channel(16);
        let (events_tx, events_rx) = mpsc::channel(16);
        let cancel_token = CancellationToken::new();
        let metrics = SessionMetrics::new();

        let (handle, _task) = SignalingChannel::spawn(
            client_tx,
            server_rx,
            events_tx,
            cancel_token.clone(),
            Arc::clone(&metrics),
        );

        Harness {
            handle,
            wire_rx,
            wire_tx,
            events_rx,
            cancel_token,
            metrics,
        }
    }

    #[tokio::test]
    async fn test_emit_reaches_wire() {
        let mut harness = spawn_channel();

        harness
            .handle
            .emit(ClientMessage::LeaveRoom)
            .await
            .unwrap();

        let sent = harness.wire_rx.recv().await.unwrap();
        assert_eq!(sent, ClientMessage::LeaveRoom);
    }

    #[tokio::test]
    async fn test_request_resolves_on_correlated_response() {
        let mut harness = spawn_channel();

        let handle = harness.handle.clone();
        let request = tokio::spawn(async move {
            handle
                .request(
                    ClientMessage::CreateTransport { producing: true },
                    RequestKey::CreateTransport(TransportDirection::Send),
                    Duration::from_secs(5),
                )
                .await
        });

        // The request goes out on the wire.
        let sent = harness.wire_rx.recv().await.unwrap();
        assert_eq!(sent, ClientMessage::CreateTransport { producing: true });

        // Answer it.
        harness
            .wire_tx
            .send(ServerMessage::TransportCreated {
                producing: true,
                success: false,
                transport: None,
                error: Some("denied".to_string()),
            })
            .await
            .unwrap();

        let response = request.await.unwrap().unwrap();
        assert!(matches!(
            response,
            ServerMessage::TransportCreated { producing: true, .. }
        ));
    }

    #[tokio::test]
    async fn test_mismatched_response_is_stale_and_request_times_out() {
        let mut harness = spawn_channel();

        let handle = harness.handle.clone();
        let request = tokio::spawn(async move {
            handle
                .request(
                    ClientMessage::ConnectTransport {
                        transport_id: "t-1".to_string(),
                        dtls_parameters: signaling_protocol::DtlsParameters {
                            role: signaling_protocol::DtlsRole::Client,
                            fingerprints: vec![],
                        },
                    },
                    RequestKey::ConnectTransport("t-1".to_string()),
                    Duration::from_millis(100),
                )
                .await
        });

        let _sent = harness.wire_rx.recv().await.unwrap();

        // Confirmation for a different transport id.
        harness
            .wire_tx
            .send(ServerMessage::TransportConnected {
                transport_id: "t-2".to_string(),
                success: true,
                error: None,
            })
            .await
            .unwrap();

        let result = request.await.unwrap();
        assert!(matches!(result, Err(SessionError::Channel(_))));
        assert_eq!(harness.metrics.stale_responses(), 1);
    }

    #[tokio::test]
    async fn test_notifications_forwarded_to_session() {
        let mut harness = spawn_channel();

        harness
            .wire_tx
            .send(ServerMessage::PeerLeft {
                peer_id: "peerA".to_string(),
            })
            .await
            .unwrap();

        match harness.events_rx.recv().await.unwrap() {
            ChannelEvent::Notification(ServerMessage::PeerLeft { peer_id }) => {
                assert_eq!(peer_id, "peerA");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_wire_closure_fails_in_flight_and_notifies() {
        let mut harness = spawn_channel();

        let handle = harness.handle.clone();
        let request = tokio::spawn(async move {
            handle
                .request(
                    ClientMessage::CreateTransport { producing: false },
                    RequestKey::CreateTransport(TransportDirection::Receive),
                    Duration::from_secs(5),
                )
                .await
        });

        let _sent = harness.wire_rx.recv().await.unwrap();

        // Drop the server side of the wire.
        drop(harness.wire_tx);

        let result = request.await.unwrap();
        assert!(matches!(result, Err(SessionError::SignalingDisconnected)));

        assert!(matches!(
            harness.events_rx.recv().await.unwrap(),
            ChannelEvent::Disconnected
        ));
        assert!(!harness.handle.is_connected());
    }

    #[tokio::test]
    async fn test_cancellation_stops_actor() {
        let harness = spawn_channel();
        harness.cancel_token.cancel();

        // Wait for the connectivity flag to flip as the actor exits.
        let mut connected = harness.handle.connected.clone();
        tokio::time::timeout(Duration::from_secs(1), connected.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(!harness.handle.is_connected());
    }
}
