//! Signaling messages exchanged between client and SFU.
//!
//! Messages are internally tagged with a `type` field (kebab-case event
//! names, camelCase payload fields) so they can travel over any JSON-capable
//! channel. Response messages carry `success` plus either their payload
//! (flattened) or an `error` string.

use serde::{Deserialize, Serialize};

use crate::types::{
    ConsumerParameters, DtlsParameters, MediaKind, PeerSummary, ProducerAnnouncement,
    RtpCapabilities, RtpParameters, TransportParameters,
};

/// Messages sent from the client to the SFU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Join a room. Answered by `join-success` or `join-error`.
    JoinRoom {
        room_id: String,
        user_id: String,
        peer_name: String,
    },

    /// Request creation of a transport. Answered by `transport-created`
    /// correlated on the `producing` flag.
    CreateTransport { producing: bool },

    /// Finalize the secure handshake for a transport. Answered by
    /// `transport-connected` correlated on the transport id.
    ConnectTransport {
        transport_id: String,
        dtls_parameters: DtlsParameters,
    },

    /// Publish a local track on the send transport. Answered by `produced`
    /// correlated on the transport id.
    Produce {
        transport_id: String,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
    },

    /// Request consumption of a remote producer. Answered by `consumed`
    /// correlated on the producer id.
    Consume {
        transport_id: String,
        producer_id: String,
        rtp_capabilities: RtpCapabilities,
    },

    /// Resume a consumer that was created paused. Answered by
    /// `consumer-resumed` correlated on the consumer id.
    ResumeConsumer { consumer_id: String },

    /// Leave the room. Not answered.
    LeaveRoom,
}

impl ClientMessage {
    /// Returns the event name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            ClientMessage::JoinRoom { .. } => "join-room",
            ClientMessage::CreateTransport { .. } => "create-transport",
            ClientMessage::ConnectTransport { .. } => "connect-transport",
            ClientMessage::Produce { .. } => "produce",
            ClientMessage::Consume { .. } => "consume",
            ClientMessage::ResumeConsumer { .. } => "resume-consumer",
            ClientMessage::LeaveRoom => "leave-room",
        }
    }
}

/// Messages sent from the SFU to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Successful join: router capabilities plus the current room snapshot.
    JoinSuccess {
        rtp_capabilities: RtpCapabilities,
        existing_peers: Vec<PeerSummary>,
        existing_producers: Vec<ProducerAnnouncement>,
    },

    /// Join rejected.
    JoinError { message: String },

    /// Answer to `create-transport`, correlated on `producing`.
    TransportCreated {
        producing: bool,
        success: bool,
        #[serde(flatten)]
        transport: Option<TransportParameters>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// Answer to `connect-transport`, correlated on the transport id.
    TransportConnected {
        transport_id: String,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// Answer to `produce`, correlated on the transport id. On success `id`
    /// is the server-assigned producer id.
    Produced {
        transport_id: String,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// Answer to `consume`, correlated on the producer id.
    Consumed {
        producer_id: String,
        success: bool,
        #[serde(flatten)]
        consumer: Option<ConsumerParameters>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// Answer to `resume-consumer`, correlated on the consumer id.
    ConsumerResumed { consumer_id: String, success: bool },

    /// A remote peer started producing a track.
    NewProducer {
        producer_id: String,
        peer_id: String,
        kind: MediaKind,
    },

    /// A peer joined the room.
    PeerJoined { peer_id: String, peer_name: String },

    /// A peer left the room.
    PeerLeft { peer_id: String },
}

impl ServerMessage {
    /// Returns the event name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            ServerMessage::JoinSuccess { .. } => "join-success",
            ServerMessage::JoinError { .. } => "join-error",
            ServerMessage::TransportCreated { .. } => "transport-created",
            ServerMessage::TransportConnected { .. } => "transport-connected",
            ServerMessage::Produced { .. } => "produced",
            ServerMessage::Consumed { .. } => "consumed",
            ServerMessage::ConsumerResumed { .. } => "consumer-resumed",
            ServerMessage::NewProducer { .. } => "new-producer",
            ServerMessage::PeerJoined { .. } => "peer-joined",
            ServerMessage::PeerLeft { .. } => "peer-left",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::types::{DtlsFingerprint, DtlsRole, IceParameters, RtpCodecCapability};

    #[test]
    fn test_join_room_wire_shape() {
        let msg = ClientMessage::JoinRoom {
            room_id: "room-1".to_string(),
            user_id: "u1".to_string(),
            peer_name: "Alice".to_string(),
        };

        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "join-room");
        assert_eq!(json["roomId"], "room-1");
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["peerName"], "Alice");
    }

    #[test]
    fn test_connect_transport_wire_shape() {
        let msg = ClientMessage::ConnectTransport {
            transport_id: "t-send".to_string(),
            dtls_parameters: DtlsParameters {
                role: DtlsRole::Client,
                fingerprints: vec![DtlsFingerprint {
                    algorithm: "sha-256".to_string(),
                    value: "ab:cd".to_string(),
                }],
            },
        };

        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "connect-transport");
        assert_eq!(json["transportId"], "t-send");
        assert_eq!(json["dtlsParameters"]["role"], "client");
    }

    #[test]
    fn test_transport_created_success_flattens_payload() {
        let msg = ServerMessage::TransportCreated {
            producing: true,
            success: true,
            transport: Some(TransportParameters {
                id: "t-1".to_string(),
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
            }),
            error: None,
        };

        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "transport-created");
        assert_eq!(json["producing"], true);
        assert_eq!(json["id"], "t-1");
        assert_eq!(json["iceParameters"]["usernameFragment"], "ufrag");

        let back: ServerMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_transport_created_failure_omits_payload() {
        let json = serde_json::json!({
            "type": "transport-created",
            "producing": false,
            "success": false,
            "error": "router overloaded",
        });

        let msg: ServerMessage = serde_json::from_value(json).unwrap();
        match msg {
            ServerMessage::TransportCreated {
                producing,
                success,
                transport,
                error,
            } => {
                assert!(!producing);
                assert!(!success);
                assert!(transport.is_none());
                assert_eq!(error.as_deref(), Some("router overloaded"));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_consumed_success_round_trip() {
        let msg = ServerMessage::Consumed {
            producer_id: "p-1".to_string(),
            success: true,
            consumer: Some(ConsumerParameters {
                id: "c-1".to_string(),
                kind: MediaKind::Video,
                rtp_parameters: RtpParameters {
                    codecs: vec![RtpCodecCapability {
                        kind: MediaKind::Video,
                        mime_type: "video/VP8".to_string(),
                        clock_rate: 90_000,
                        channels: None,
                    }],
                    mid: Some("1".to_string()),
                },
            }),
            error: None,
        };

        let json = serde_json::to_string(&msg).unwrap();
        let back: ServerMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_leave_room_is_unit_variant() {
        let json = serde_json::to_value(&ClientMessage::LeaveRoom).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "leave-room" }));
    }

    #[test]
    fn test_event_names_match_wire_tags() {
        let msg = ServerMessage::PeerLeft {
            peer_id: "peerA".to_string(),
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], msg.name());
    }
}
