//! Media parameter types carried by signaling messages.

use serde::{Deserialize, Serialize};

/// Kind of a media track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Audio track.
    Audio,
    /// Video track.
    Video,
}

impl MediaKind {
    /// Returns the kind as a string for logging and metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

/// Direction of a media transport relative to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportDirection {
    /// Client-to-server (producing) transport.
    Send,
    /// Server-to-client (consuming) transport.
    Receive,
}

impl TransportDirection {
    /// Returns the direction as a string for logging.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            TransportDirection::Send => "send",
            TransportDirection::Receive => "receive",
        }
    }

    /// Whether this direction produces media toward the server.
    #[must_use]
    pub const fn is_producing(&self) -> bool {
        matches!(self, TransportDirection::Send)
    }
}

/// One codec a device or router can speak.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpCodecCapability {
    /// Media kind this codec applies to.
    pub kind: MediaKind,
    /// MIME type, e.g. `audio/opus` or `video/VP8`.
    pub mime_type: String,
    /// Clock rate in Hz.
    pub clock_rate: u32,
    /// Channel count (audio only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
}

impl RtpCodecCapability {
    /// Whether this codec is compatible with `other`.
    ///
    /// MIME types compare case-insensitively; clock rates must match exactly.
    /// Channel counts only matter when both sides declare one.
    #[must_use]
    pub fn matches(&self, other: &RtpCodecCapability) -> bool {
        self.kind == other.kind
            && self.mime_type.eq_ignore_ascii_case(&other.mime_type)
            && self.clock_rate == other.clock_rate
            && match (self.channels, other.channels) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
    }
}

/// The set of codecs a device or router supports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpCapabilities {
    /// Supported codecs.
    pub codecs: Vec<RtpCodecCapability>,
}

impl RtpCapabilities {
    /// Returns the codecs of the given kind.
    pub fn codecs_of_kind(&self, kind: MediaKind) -> impl Iterator<Item = &RtpCodecCapability> {
        self.codecs.iter().filter(move |c| c.kind == kind)
    }

    /// Whether at least one codec of the given kind is present.
    #[must_use]
    pub fn supports(&self, kind: MediaKind) -> bool {
        self.codecs_of_kind(kind).next().is_some()
    }
}

/// Negotiated RTP send/receive parameters for one track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpParameters {
    /// Codecs selected for this track.
    pub codecs: Vec<RtpCodecCapability>,
    /// Media section identifier, when the transport assigns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mid: Option<String>,
}

/// ICE parameters advertised by the server for one transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceParameters {
    /// ICE username fragment.
    pub username_fragment: String,
    /// ICE password.
    pub password: String,
    /// Whether the server runs in ICE-lite mode.
    #[serde(default)]
    pub ice_lite: bool,
}

/// One ICE candidate advertised by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    /// Candidate foundation.
    pub foundation: String,
    /// Candidate priority.
    pub priority: u32,
    /// IP address or hostname.
    pub address: String,
    /// Port number.
    pub port: u16,
    /// Transport protocol, e.g. `udp`.
    pub protocol: String,
}

/// DTLS role for the secure handshake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DtlsRole {
    /// Role decided during negotiation.
    #[default]
    Auto,
    /// Active side of the handshake.
    Client,
    /// Passive side of the handshake.
    Server,
}

/// One certificate fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DtlsFingerprint {
    /// Hash algorithm, e.g. `sha-256`.
    pub algorithm: String,
    /// Hex-encoded fingerprint value.
    pub value: String,
}

/// DTLS parameters for one side of a transport handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DtlsParameters {
    /// DTLS role.
    #[serde(default)]
    pub role: DtlsRole,
    /// Certificate fingerprints.
    pub fingerprints: Vec<DtlsFingerprint>,
}

/// Server-assigned parameters for a newly created transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportParameters {
    /// Server-assigned transport id (opaque correlation key).
    pub id: String,
    /// ICE parameters.
    pub ice_parameters: IceParameters,
    /// ICE candidates.
    pub ice_candidates: Vec<IceCandidate>,
    /// Server-side DTLS parameters.
    pub dtls_parameters: DtlsParameters,
}

/// Server-assigned parameters for a newly created consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerParameters {
    /// Server-assigned consumer id (opaque correlation key).
    pub id: String,
    /// Kind of the consumed track.
    pub kind: MediaKind,
    /// RTP parameters to receive the track with.
    pub rtp_parameters: RtpParameters,
}

/// Summary of a peer already present in the room at join time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerSummary {
    /// Peer id.
    pub peer_id: String,
    /// Display name.
    pub peer_name: String,
}

/// Announcement of a remote producer available for consumption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducerAnnouncement {
    /// Server-assigned producer id.
    pub producer_id: String,
    /// Peer that owns the producer.
    pub peer_id: String,
    /// Kind of the produced track.
    pub kind: MediaKind,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn opus() -> RtpCodecCapability {
        RtpCodecCapability {
            kind: MediaKind::Audio,
            mime_type: "audio/opus".to_string(),
            clock_rate: 48_000,
            channels: Some(2),
        }
    }

    fn vp8() -> RtpCodecCapability {
        RtpCodecCapability {
            kind: MediaKind::Video,
            mime_type: "video/VP8".to_string(),
            clock_rate: 90_000,
            channels: None,
        }
    }

    #[test]
    fn test_codec_match_is_case_insensitive() {
        let mut other = opus();
        other.mime_type = "AUDIO/OPUS".to_string();
        assert!(opus().matches(&other));
    }

    #[test]
    fn test_codec_match_requires_same_clock_rate() {
        let mut other = vp8();
        other.clock_rate = 48_000;
        assert!(!vp8().matches(&other));
    }

    #[test]
    fn test_codec_match_ignores_missing_channels() {
        let mut other = opus();
        other.channels = None;
        assert!(opus().matches(&other));
    }

    #[test]
    fn test_codec_match_rejects_channel_mismatch() {
        let mut other = opus();
        other.channels = Some(1);
        assert!(!opus().matches(&other));
    }

    #[test]
    fn test_capabilities_supports_by_kind() {
        let caps = RtpCapabilities {
            codecs: vec![opus()],
        };
        assert!(caps.supports(MediaKind::Audio));
        assert!(!caps.supports(MediaKind::Video));
    }

    #[test]
    fn test_media_kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&MediaKind::Video).unwrap(),
            "\"video\""
        );
    }

    #[test]
    fn test_producing_flag() {
        assert!(TransportDirection::Send.is_producing());
        assert!(!TransportDirection::Receive.is_producing());
    }
}
