//! Signaling protocol for SFU room sessions.
//!
//! This crate defines the typed message vocabulary exchanged between a room
//! client and the Selective Forwarding Unit over the signaling channel, plus
//! the media parameter types those messages carry (RTP capabilities, ICE and
//! DTLS parameters).
//!
//! Wire framing is deliberately not defined here: messages serialize to/from
//! JSON with an internally-tagged `type` field, and the transport that carries
//! them (WebSocket, WebTransport, in-process channel pair) is owned by the
//! embedder.
//!
//! # Correlation
//!
//! Every response message carries the identifier of the request it answers
//! (the `producing` flag for `transport-created`, the transport id for
//! `transport-connected` and `produced`, the producer id for `consumed`, the
//! consumer id for `consumer-resumed`). Clients must match responses by those
//! ids, never by arrival order, because requests of the same kind can be in
//! flight concurrently.

pub mod messages;
pub mod types;

pub use messages::{ClientMessage, ServerMessage};
pub use types::{
    ConsumerParameters, DtlsFingerprint, DtlsParameters, DtlsRole, IceCandidate, IceParameters,
    MediaKind, PeerSummary, ProducerAnnouncement, RtpCapabilities, RtpCodecCapability,
    RtpParameters, TransportDirection, TransportParameters,
};
