//! Capability negotiation.
//!
//! The router advertises its RTP capabilities in the join response; the
//! client intersects them with the codecs it can actually speak. The result
//! is an immutable [`CapabilitySet`] that every later transport, producer and
//! consumer operation takes as input. Negotiation is all-or-nothing: if the
//! minimum codec set (one audio codec and one video codec) cannot be
//! satisfied, the session fails with `UnsupportedCapabilities`.
//!
//! ICE/DTLS internals are out of scope for the session core; the
//! `CapabilitySet` is the opaque object it queries for local handshake and
//! send parameters.

use signaling_protocol::{
    DtlsFingerprint, DtlsParameters, DtlsRole, MediaKind, RtpCapabilities, RtpCodecCapability,
    RtpParameters,
};
use uuid::Uuid;

use crate::errors::SessionError;

/// Codecs this client can produce and consume.
#[must_use]
pub fn builtin_capabilities() -> RtpCapabilities {
    RtpCapabilities {
        codecs: vec![
            RtpCodecCapability {
                kind: MediaKind::Audio,
                mime_type: "audio/opus".to_string(),
                clock_rate: 48_000,
                channels: Some(2),
            },
            RtpCodecCapability {
                kind: MediaKind::Video,
                mime_type: "video/VP8".to_string(),
                clock_rate: 90_000,
                channels: None,
            },
            RtpCodecCapability {
                kind: MediaKind::Video,
                mime_type: "video/H264".to_string(),
                clock_rate: 90_000,
                channels: None,
            },
        ],
    }
}

/// Immutable capability set negotiated with the router at join time.
#[derive(Debug, Clone)]
pub struct CapabilitySet {
    codecs: Vec<RtpCodecCapability>,
}

impl CapabilitySet {
    /// Intersect the router's capabilities with the built-in client codecs.
    ///
    /// Pure function of the router capabilities. Fails with
    /// `UnsupportedCapabilities` unless at least one audio and one video
    /// codec survive the intersection.
    pub fn negotiate(router: &RtpCapabilities) -> Result<Self, SessionError> {
        let local = builtin_capabilities();
        let codecs: Vec<RtpCodecCapability> = local
            .codecs
            .into_iter()
            .filter(|local_codec| router.codecs.iter().any(|r| local_codec.matches(r)))
            .collect();

        for kind in [MediaKind::Audio, MediaKind::Video] {
            if !codecs.iter().any(|c| c.kind == kind) {
                return Err(SessionError::UnsupportedCapabilities(format!(
                    "no compatible {} codec",
                    kind.as_str()
                )));
            }
        }

        Ok(Self { codecs })
    }

    /// The negotiated capabilities, as sent with consume requests.
    #[must_use]
    pub fn rtp_capabilities(&self) -> RtpCapabilities {
        RtpCapabilities {
            codecs: self.codecs.clone(),
        }
    }

    /// Send parameters for a track of the given kind.
    pub fn rtp_parameters_for(&self, kind: MediaKind) -> Result<RtpParameters, SessionError> {
        let codec = self
            .codecs
            .iter()
            .find(|c| c.kind == kind)
            .cloned()
            .ok_or_else(|| {
                SessionError::UnsupportedCapabilities(format!(
                    "no negotiated {} codec",
                    kind.as_str()
                ))
            })?;

        Ok(RtpParameters {
            codecs: vec![codec],
            mid: None,
        })
    }

    /// Local DTLS parameters for a transport connect handshake.
    ///
    /// A fresh certificate fingerprint per handshake; the certificate itself
    /// belongs to the underlying transport and is opaque here.
    #[must_use]
    pub fn dtls_parameters(&self) -> DtlsParameters {
        let bytes = *Uuid::new_v4().as_bytes();
        let value = bytes
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(":");

        DtlsParameters {
            role: DtlsRole::Client,
            fingerprints: vec![DtlsFingerprint {
                algorithm: "sha-256".to_string(),
                value,
            }],
        }
    }
}
