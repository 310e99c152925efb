//! Send and receive transport lifecycle.
//!
//! The session owns at most one transport per direction. Each one moves
//! through `New` -> `Connected` -> `Closed`; produce and consume contracts
//! are only honored once the owning transport is connected. Confirmations
//! are correlated by transport id through the signaling channel, so a
//! confirmation for a different transport can never mark this one ready.

use tokio::time::Duration;
use tracing::debug;

use signaling_protocol::{
    ClientMessage, ConsumerParameters, DtlsParameters, MediaKind, RtpCapabilities, RtpParameters,
    ServerMessage, TransportDirection, TransportParameters,
};

use crate::errors::SessionError;
use crate::signaling::{RequestKey, SignalingHandle};

/// Connection state of one transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportConnectionState {
    /// Created on the router, handshake not yet confirmed.
    New,
    /// Connect confirmed; the readiness flag for this direction is set.
    Connected,
    /// Closed locally. Terminal.
    Closed,
}

/// One transport created on the router.
#[derive(Debug, Clone)]
pub struct TransportHandle {
    pub id: String,
    pub direction: TransportDirection,
    pub connection_state: TransportConnectionState,
    pub parameters: TransportParameters,
}

/// Owner of the session's send and receive transports.
pub struct TransportManager {
    signaling: SignalingHandle,
    request_timeout: Duration,
    send: Option<TransportHandle>,
    recv: Option<TransportHandle>,
}

impl TransportManager {
    #[must_use]
    pub fn new(signaling: SignalingHandle, request_timeout: Duration) -> Self {
        Self {
            signaling,
            request_timeout,
            send: None,
            recv: None,
        }
    }

    /// Request transport parameters from the router for one direction.
    ///
    /// Associated function so the session can request both directions
    /// concurrently and install the results afterwards.
    pub async fn request_parameters(
        signaling: &SignalingHandle,
        direction: TransportDirection,
        timeout: Duration,
    ) -> Result<TransportParameters, SessionError> {
        let response = signaling
            .request(
                ClientMessage::CreateTransport {
                    producing: direction.is_producing(),
                },
                RequestKey::CreateTransport(direction),
                timeout,
            )
            .await
            .map_err(|err| SessionError::TransportCreationFailed(err.to_string()))?;

        match response {
            ServerMessage::TransportCreated {
                success: true,
                transport: Some(parameters),
                ..
            } => Ok(parameters),
            ServerMessage::TransportCreated { error, .. } => {
                Err(SessionError::TransportCreationFailed(
                    error.unwrap_or_else(|| "router rejected transport creation".to_string()),
                ))
            }
            other => Err(SessionError::TransportCreationFailed(format!(
                "unexpected response {}",
                other.name()
            ))),
        }
    }

    /// Install parameters received from the router as this direction's
    /// transport. Fails if the direction already has one.
    pub fn install(
        &mut self,
        direction: TransportDirection,
        parameters: TransportParameters,
    ) -> Result<&TransportHandle, SessionError> {
        let slot = self.slot_mut(direction);
        if slot.is_some() {
            return Err(SessionError::TransportCreationFailed(format!(
                "{} transport already exists",
                direction.as_str()
            )));
        }

        debug!(
            target: "room.transport",
            direction = direction.as_str(),
            transport_id = %parameters.id,
            "Transport installed"
        );

        *slot = Some(TransportHandle {
            id: parameters.id.clone(),
            direction,
            connection_state: TransportConnectionState::New,
            parameters,
        });

        // Freshly inserted above.
        self.slot_mut(direction)
            .as_ref()
            .ok_or_else(|| SessionError::Channel("transport slot empty after install".to_string()))
    }

    /// Run the connect handshake for one direction.
    ///
    /// Idempotent: connecting an already-connected transport is a no-op, so
    /// a retried connect cannot double-fire.
    pub async fn connect(
        &mut self,
        direction: TransportDirection,
        dtls_parameters: DtlsParameters,
    ) -> Result<(), SessionError> {
        let transport_id = {
            let handle = self.slot_mut(direction).as_ref().ok_or_else(|| {
                SessionError::InvalidState(format!(
                    "no {} transport to connect",
                    direction.as_str()
                ))
            })?;
            if handle.connection_state == TransportConnectionState::Connected {
                return Ok(());
            }
            if handle.connection_state == TransportConnectionState::Closed {
                return Err(SessionError::InvalidState(format!(
                    "{} transport is closed",
                    direction.as_str()
                )));
            }
            handle.id.clone()
        };

        let response = self
            .signaling
            .request(
                ClientMessage::ConnectTransport {
                    transport_id: transport_id.clone(),
                    dtls_parameters,
                },
                RequestKey::ConnectTransport(transport_id.clone()),
                self.request_timeout,
            )
            .await
            .map_err(|err| SessionError::TransportConnectFailed {
                transport_id: transport_id.clone(),
                reason: err.to_string(),
            })?;

        match response {
            ServerMessage::TransportConnected { success: true, .. } => {
                if let Some(handle) = self.slot_mut(direction).as_mut() {
                    handle.connection_state = TransportConnectionState::Connected;
                }
                debug!(
                    target: "room.transport",
                    direction = direction.as_str(),
                    transport_id = %transport_id,
                    "Transport connected"
                );
                Ok(())
            }
            ServerMessage::TransportConnected { error, .. } => {
                Err(SessionError::TransportConnectFailed {
                    transport_id,
                    reason: error.unwrap_or_else(|| "router rejected connect".to_string()),
                })
            }
            other => Err(SessionError::TransportConnectFailed {
                transport_id,
                reason: format!("unexpected response {}", other.name()),
            }),
        }
    }

    /// Honor the produce contract for one local track.
    ///
    /// Requires a connected send transport. Returns the router-assigned
    /// producer id.
    pub async fn produce(
        &self,
        track_id: &str,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
    ) -> Result<String, SessionError> {
        let transport_id = self
            .ready_id(TransportDirection::Send)
            .ok_or_else(|| SessionError::ProduceFailed {
                track_id: track_id.to_string(),
                reason: "send transport not ready".to_string(),
            })?;

        let response = self
            .signaling
            .request(
                ClientMessage::Produce {
                    transport_id: transport_id.clone(),
                    kind,
                    rtp_parameters,
                },
                RequestKey::Produce(transport_id),
                self.request_timeout,
            )
            .await
            .map_err(|err| SessionError::ProduceFailed {
                track_id: track_id.to_string(),
                reason: err.to_string(),
            })?;

        match response {
            ServerMessage::Produced {
                success: true,
                id: Some(producer_id),
                ..
            } => Ok(producer_id),
            ServerMessage::Produced { error, .. } => Err(SessionError::ProduceFailed {
                track_id: track_id.to_string(),
                reason: error.unwrap_or_else(|| "router rejected produce".to_string()),
            }),
            other => Err(SessionError::ProduceFailed {
                track_id: track_id.to_string(),
                reason: format!("unexpected response {}", other.name()),
            }),
        }
    }

    /// Honor the consume contract for one remote producer.
    ///
    /// Requires a connected receive transport. The returned consumer is
    /// created paused on the router.
    pub async fn consume(
        &self,
        producer_id: &str,
        rtp_capabilities: RtpCapabilities,
    ) -> Result<ConsumerParameters, SessionError> {
        let transport_id = self
            .ready_id(TransportDirection::Receive)
            .ok_or_else(|| SessionError::ConsumeRejected {
                producer_id: producer_id.to_string(),
                reason: "receive transport not ready".to_string(),
            })?;

        let response = self
            .signaling
            .request(
                ClientMessage::Consume {
                    transport_id,
                    producer_id: producer_id.to_string(),
                    rtp_capabilities,
                },
                RequestKey::Consume(producer_id.to_string()),
                self.request_timeout,
            )
            .await
            .map_err(|err| SessionError::ConsumeRejected {
                producer_id: producer_id.to_string(),
                reason: err.to_string(),
            })?;

        match response {
            ServerMessage::Consumed {
                success: true,
                consumer: Some(parameters),
                ..
            } => Ok(parameters),
            ServerMessage::Consumed { error, .. } => Err(SessionError::ConsumeRejected {
                producer_id: producer_id.to_string(),
                reason: error.unwrap_or_else(|| "router rejected consume".to_string()),
            }),
            other => Err(SessionError::ConsumeRejected {
                producer_id: producer_id.to_string(),
                reason: format!("unexpected response {}", other.name()),
            }),
        }
    }

    /// Whether the send transport is connected.
    #[must_use]
    pub fn send_ready(&self) -> bool {
        self.ready_id(TransportDirection::Send).is_some()
    }

    /// Whether the receive transport is connected.
    #[must_use]
    pub fn recv_ready(&self) -> bool {
        self.ready_id(TransportDirection::Receive).is_some()
    }

    /// The transport id for one direction, if created.
    #[must_use]
    pub fn transport_id(&self, direction: TransportDirection) -> Option<&str> {
        self.slot(direction).as_ref().map(|h| h.id.as_str())
    }

    /// Close both transports. Idempotent; returns how many were closed by
    /// this call.
    pub fn close_all(&mut self) -> usize {
        let mut closed = 0;
        for direction in [TransportDirection::Send, TransportDirection::Receive] {
            if let Some(handle) = self.slot_mut(direction).take() {
                debug!(
                    target: "room.transport",
                    direction = direction.as_str(),
                    transport_id = %handle.id,
                    "Transport closed"
                );
                closed += 1;
            }
        }
        closed
    }

    fn ready_id(&self, direction: TransportDirection) -> Option<String> {
        self.slot(direction)
            .as_ref()
            .filter(|h| h.connection_state == TransportConnectionState::Connected)
            .map(|h| h.id.clone())
    }

    fn slot(&self, direction: TransportDirection) -> &Option<TransportHandle> {
        match direction {
            TransportDirection::Send => &self.send,
            TransportDirection::Receive => &self.recv,
        }
    }

    fn slot_mut(&mut self, direction: TransportDirection) -> &mut Option<TransportHandle> {
        match direction {
            TransportDirection::Send => &mut self.send,
            TransportDirection::Receive => &mut self.recv,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use signaling_protocol::{DtlsRole, IceParameters};
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use crate::metrics::SessionMetrics;
    use crate::signaling::SignalingChannel;

    fn transport_params(id: &str) -> TransportParameters {
        TransportParameters {
            id: id.to_string(),
            ice_parameters: IceParameters {
                username_fragment: "ufrag".to_string(),
                password: "pwd".to_string(),
                ice_lite: true,
            },
            ice_candidates: vec![],
            dtls_parameters: DtlsParameters {
                role: DtlsRole::Server,
                fingerprints: vec![],
            },
        }
    }

    fn dtls() -> DtlsParameters {
        DtlsParameters {
            role: DtlsRole::Client,
            fingerprints: vec![],
        }
    }

    struct Harness {
        manager: TransportManager,
        wire_rx: mpsc::Receiver<ClientMessage>,
        wire_tx: mpsc::Sender<ServerMessage>,
    }

    fn spawn_manager() -> Harness {
        let (client_tx, wire_rx) = mpsc::channel(16);
        let (wire_tx, server_rx) = mpsc::channel(16);
        let (events_tx, _events_rx) = mpsc::channel(16);

        let (handle, _task) = SignalingChannel::spawn(
            client_tx,
            server_rx,
            events_tx,
            CancellationToken::new(),
            SessionMetrics::new(),
        );

        Harness {
            manager: TransportManager::new(handle, Duration::from_secs(1)),
            wire_rx,
            wire_tx,
        }
    }

    /// Answer the next wire message with a canned response.
    async fn answer(
        wire_rx: &mut mpsc::Receiver<ClientMessage>,
        wire_tx: &mpsc::Sender<ServerMessage>,
        response: ServerMessage,
    ) -> ClientMessage {
        let request = wire_rx.recv().await.unwrap();
        wire_tx.send(response).await.unwrap();
        request
    }

    #[tokio::test]
    async fn test_create_and_connect_marks_ready() {
        let mut harness = spawn_manager();

        let server = {
            let wire_tx = harness.wire_tx.clone();
            let mut wire_rx = harness.wire_rx;
            tokio::spawn(async move {
                let request = answer(
                    &mut wire_rx,
                    &wire_tx,
                    ServerMessage::TransportCreated {
                        producing: true,
                        success: true,
                        transport: Some(transport_params("t-send")),
                        error: None,
                    },
                )
                .await;
                assert_eq!(request, ClientMessage::CreateTransport { producing: true });

                let request = answer(
                    &mut wire_rx,
                    &wire_tx,
                    ServerMessage::TransportConnected {
                        transport_id: "t-send".to_string(),
                        success: true,
                        error: None,
                    },
                )
                .await;
                assert!(matches!(
                    request,
                    ClientMessage::ConnectTransport { transport_id, .. } if transport_id == "t-send"
                ));
            })
        };

        let parameters = TransportManager::request_parameters(
            &harness.manager.signaling.clone(),
            TransportDirection::Send,
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        harness
            .manager
            .install(TransportDirection::Send, parameters)
            .unwrap();
        assert!(!harness.manager.send_ready());

        harness
            .manager
            .connect(TransportDirection::Send, dtls())
            .await
            .unwrap();
        assert!(harness.manager.send_ready());
        assert_eq!(
            harness.manager.transport_id(TransportDirection::Send),
            Some("t-send")
        );

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_create_failure_maps_to_creation_failed() {
        let mut harness = spawn_manager();

        tokio::spawn({
            let wire_tx = harness.wire_tx.clone();
            let mut wire_rx = harness.wire_rx;
            async move {
                answer(
                    &mut wire_rx,
                    &wire_tx,
                    ServerMessage::TransportCreated {
                        producing: false,
                        success: false,
                        transport: None,
                        error: Some("router out of capacity".to_string()),
                    },
                )
                .await;
            }
        });

        let result = TransportManager::request_parameters(
            &harness.manager.signaling.clone(),
            TransportDirection::Receive,
            Duration::from_secs(1),
        )
        .await;

        match result {
            Err(SessionError::TransportCreationFailed(reason)) => {
                assert!(reason.contains("capacity"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let mut harness = spawn_manager();

        harness
            .manager
            .install(TransportDirection::Send, transport_params("t-send"))
            .unwrap();

        tokio::spawn({
            let wire_tx = harness.wire_tx.clone();
            let mut wire_rx = harness.wire_rx;
            async move {
                // Exactly one connect goes out on the wire.
                answer(
                    &mut wire_rx,
                    &wire_tx,
                    ServerMessage::TransportConnected {
                        transport_id: "t-send".to_string(),
                        success: true,
                        error: None,
                    },
                )
                .await;
                assert!(wire_rx.recv().await.is_none());
            }
        });

        harness
            .manager
            .connect(TransportDirection::Send, dtls())
            .await
            .unwrap();
        // Second connect short-circuits without wire traffic.
        harness
            .manager
            .connect(TransportDirection::Send, dtls())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_install_rejected() {
        let mut harness = spawn_manager();

        harness
            .manager
            .install(TransportDirection::Send, transport_params("t-1"))
            .unwrap();
        let result = harness
            .manager
            .install(TransportDirection::Send, transport_params("t-2"));

        assert!(matches!(
            result,
            Err(SessionError::TransportCreationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_produce_before_ready_fails() {
        let harness = spawn_manager();

        let result = harness
            .manager
            .produce(
                "track-1",
                MediaKind::Audio,
                RtpParameters {
                    codecs: vec![],
                    mid: None,
                },
            )
            .await;

        match result {
            Err(SessionError::ProduceFailed { track_id, reason }) => {
                assert_eq!(track_id, "track-1");
                assert!(reason.contains("not ready"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_consume_before_ready_is_rejected() {
        let harness = spawn_manager();

        let result = harness
            .manager
            .consume("p-1", RtpCapabilities { codecs: vec![] })
            .await;

        assert!(matches!(
            result,
            Err(SessionError::ConsumeRejected { .. })
        ));
    }

    #[tokio::test]
    async fn test_close_all_is_idempotent() {
        let mut harness = spawn_manager();

        harness
            .manager
            .install(TransportDirection::Send, transport_params("t-send"))
            .unwrap();
        harness
            .manager
            .install(TransportDirection::Receive, transport_params("t-recv"))
            .unwrap();

        assert_eq!(harness.manager.close_all(), 2);
        assert_eq!(harness.manager.close_all(), 0);
        assert!(!harness.manager.send_ready());
        assert!(harness.manager.transport_id(TransportDirection::Send).is_none());
    }
}
