//! Room Client Library
//!
//! Client-side session core for an SFU-based conferencing room:
//!
//! - Join/leave state machine with fail-fast double-join handling
//! - Capability negotiation against the router's advertised codecs
//! - Send/receive transport lifecycle with per-transport correlated
//!   confirmations
//! - Producer/consumer contracts, including the paused-then-resumed
//!   consumer sequence
//! - Remote participant roster tolerant of out-of-order announcements
//!
//! # Architecture
//!
//! The client is an actor pair:
//!
//! ```text
//! SessionActor (one per room membership)
//! ├── owns the state machine, registries and transports
//! └── SignalingChannel (one per session)
//!     └── correlates responses, forwards notifications
//! ```
//!
//! Embedders hand the session the two halves of a signaling wire (an
//! outbound [`ClientMessage`](signaling_protocol::ClientMessage) sender and
//! an inbound [`ServerMessage`](signaling_protocol::ServerMessage)
//! receiver) and drive it through a [`session::SessionHandle`]. Framing and
//! reconnection of the wire itself belong to the embedder.
//!
//! # Key Design Decisions
//!
//! - **Actor model, no locks**: all session state lives inside the actor
//!   loop; handles communicate by message passing
//! - **Correlation over ordering**: responses are matched by correlation
//!   key, never by arrival order; stale confirmations are dropped
//! - **Per-track failures are non-fatal**: a failed produce or consume is
//!   reported and skipped, only join-path and transport failures end the
//!   session
//!
//! # Modules
//!
//! - [`session`] - Session actor, state machine, registries
//! - [`signaling`] - Signaling channel and request correlation
//! - [`transport`] - Send/receive transport lifecycle
//! - [`device`] - Capability negotiation
//! - [`media`] - Local capture abstraction
//! - [`config`] - Client configuration from environment
//! - [`errors`] - Error types with fatality classification

pub mod config;
pub mod device;
pub mod errors;
pub mod media;
pub mod metrics;
pub mod session;
pub mod signaling;
pub mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use config::Config;
pub use errors::SessionError;
pub use media::{LocalTrack, MediaSource, SyntheticMediaSource};
pub use metrics::{SessionMetrics, SessionMetricsSnapshot};
pub use session::{
    ProduceOutcome, SessionActor, SessionEvent, SessionHandle, SessionSnapshot, SessionState,
};
