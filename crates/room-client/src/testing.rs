//! Test doubles.
//!
//! [`FakeSfu`] is a scripted signaling peer that answers every client
//! request over an in-memory wire, with behavior knobs for the failure
//! modes the session must survive. Available to integration tests and
//! downstream crates through the `test-utils` feature.

use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use signaling_protocol::{
    ClientMessage, ConsumerParameters, DtlsParameters, DtlsRole, IceParameters, MediaKind,
    PeerSummary, ProducerAnnouncement, RtpCapabilities, ServerMessage, TransportParameters,
};

use crate::device::builtin_capabilities;

/// Wire buffer for the fake's channels.
const WIRE_BUFFER: usize = 32;

/// Behavior knobs for a [`FakeSfu`].
pub struct FakeSfuBehavior {
    /// Answer the join request with this error instead of success.
    pub reject_join: Option<String>,
    /// Capabilities the router advertises on join.
    pub router_capabilities: RtpCapabilities,
    /// Roster included in the join response.
    pub existing_peers: Vec<PeerSummary>,
    /// Producers announced in the join response.
    pub existing_producers: Vec<ProducerAnnouncement>,
    /// Reject consume requests for these producer ids.
    pub fail_consume_for: HashSet<String>,
    /// Reject every produce request.
    pub fail_produce: bool,
    /// Answer connect confirmations with a different transport id, so they
    /// never correlate.
    pub misroute_connect: bool,
    /// Never confirm consumer resumes.
    pub drop_resume: bool,
}

impl Default for FakeSfuBehavior {
    fn default() -> Self {
        Self {
            reject_join: None,
            router_capabilities: builtin_capabilities(),
            existing_peers: vec![],
            existing_producers: vec![],
            fail_consume_for: HashSet::new(),
            fail_produce: false,
            misroute_connect: false,
            drop_resume: false,
        }
    }
}

/// Handle to a running [`FakeSfu`].
pub struct FakeSfuHandle {
    notify: mpsc::Sender<ServerMessage>,
    cancel: CancellationToken,
    pub task: JoinHandle<()>,
}

impl FakeSfuHandle {
    /// Push a server-initiated notification onto the wire.
    pub async fn notify(&self, message: ServerMessage) {
        let _ = self.notify.send(message).await;
    }

    /// Drop the server side of the wire, simulating signaling loss.
    pub fn disconnect(&self) {
        self.cancel.cancel();
    }
}

/// Scripted signaling peer.
pub struct FakeSfu {
    inbound: mpsc::Receiver<ClientMessage>,
    outbound: mpsc::Sender<ServerMessage>,
    notify_rx: mpsc::Receiver<ServerMessage>,
    cancel: CancellationToken,
    behavior: FakeSfuBehavior,
    /// Kind per known producer id, for consume answers.
    producer_kinds: HashMap<String, MediaKind>,
    next_id: u64,
}

impl FakeSfu {
    /// Spawn a fake over a fresh in-memory wire.
    ///
    /// Returns the wire halves to hand to `SessionActor::spawn` and a
    /// handle for notifications and disconnection.
    #[must_use]
    pub fn spawn(
        behavior: FakeSfuBehavior,
    ) -> (
        mpsc::Sender<ClientMessage>,
        mpsc::Receiver<ServerMessage>,
        FakeSfuHandle,
    ) {
        let (client_tx, inbound) = mpsc::channel(WIRE_BUFFER);
        let (outbound, server_rx) = mpsc::channel(WIRE_BUFFER);
        let (notify_tx, notify_rx) = mpsc::channel(WIRE_BUFFER);
        let cancel = CancellationToken::new();

        let producer_kinds = behavior
            .existing_producers
            .iter()
            .map(|p| (p.producer_id.clone(), p.kind))
            .collect();

        let fake = Self {
            inbound,
            outbound,
            notify_rx,
            cancel: cancel.clone(),
            behavior,
            producer_kinds,
            next_id: 0,
        };

        let task = tokio::spawn(fake.run());

        (
            client_tx,
            server_rx,
            FakeSfuHandle {
                notify: notify_tx,
                cancel,
                task,
            },
        )
    }

    /// Answer requests until cancelled or the client side closes. Exiting
    /// drops the outbound wire half, which the client observes as
    /// disconnection.
    async fn run(mut self) {
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    debug!(target: "room.testing", "FakeSfu disconnecting");
                    break;
                }

                request = self.inbound.recv() => {
                    match request {
                        Some(request) => self.answer(request).await,
                        None => break,
                    }
                }

                notification = self.notify_rx.recv() => {
                    if let Some(message) = notification {
                        if let ServerMessage::NewProducer { producer_id, kind, .. } = &message {
                            self.producer_kinds.insert(producer_id.clone(), *kind);
                        }
                        let _ = self.outbound.send(message).await;
                    }
                }
            }
        }
    }

    async fn answer(&mut self, request: ClientMessage) {
        let response = match request {
            ClientMessage::JoinRoom { .. } => Some(match &self.behavior.reject_join {
                Some(message) => ServerMessage::JoinError {
                    message: message.clone(),
                },
                None => ServerMessage::JoinSuccess {
                    rtp_capabilities: self.behavior.router_capabilities.clone(),
                    existing_peers: self.behavior.existing_peers.clone(),
                    existing_producers: self.behavior.existing_producers.clone(),
                },
            }),

            ClientMessage::CreateTransport { producing } => {
                let id = if producing { "t-send" } else { "t-recv" };
                Some(ServerMessage::TransportCreated {
                    producing,
                    success: true,
                    transport: Some(transport_parameters(id)),
                    error: None,
                })
            }

            ClientMessage::ConnectTransport { transport_id, .. } => {
                let transport_id = if self.behavior.misroute_connect {
                    format!("{transport_id}-other")
                } else {
                    transport_id
                };
                Some(ServerMessage::TransportConnected {
                    transport_id,
                    success: true,
                    error: None,
                })
            }

            ClientMessage::Produce {
                transport_id, kind, ..
            } => {
                if self.behavior.fail_produce {
                    Some(ServerMessage::Produced {
                        transport_id,
                        success: false,
                        id: None,
                        error: Some("producer limit reached".to_string()),
                    })
                } else {
                    let id = self.fresh_id("prod");
                    self.producer_kinds.insert(id.clone(), kind);
                    Some(ServerMessage::Produced {
                        transport_id,
                        success: true,
                        id: Some(id),
                        error: None,
                    })
                }
            }

            ClientMessage::Consume {
                producer_id,
                rtp_capabilities,
                ..
            } => {
                if self.behavior.fail_consume_for.contains(&producer_id) {
                    Some(ServerMessage::Consumed {
                        producer_id,
                        success: false,
                        consumer: None,
                        error: Some("no compatible codec".to_string()),
                    })
                } else {
                    let kind = self
                        .producer_kinds
                        .get(&producer_id)
                        .copied()
                        .unwrap_or(MediaKind::Video);
                    let id = self.fresh_id("cons");
                    let codecs = rtp_capabilities.codecs_of_kind(kind).cloned().collect();
                    Some(ServerMessage::Consumed {
                        producer_id,
                        success: true,
                        consumer: Some(ConsumerParameters {
                            id,
                            kind,
                            rtp_parameters: signaling_protocol::RtpParameters {
                                codecs,
                                mid: None,
                            },
                        }),
                        error: None,
                    })
                }
            }

            ClientMessage::ResumeConsumer { consumer_id } => {
                if self.behavior.drop_resume {
                    None
                } else {
                    Some(ServerMessage::ConsumerResumed {
                        consumer_id,
                        success: true,
                    })
                }
            }

            ClientMessage::LeaveRoom => None,
        };

        if let Some(response) = response {
            let _ = self.outbound.send(response).await;
        }
    }

    fn fresh_id(&mut self, prefix: &str) -> String {
        let id = format!("{prefix}-{}", self.next_id);
        self.next_id += 1;
        id
    }
}

fn transport_parameters(id: &str) -> TransportParameters {
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
