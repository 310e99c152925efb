//! Room client configuration.
//!
//! Configuration is loaded from environment variables; every field has a
//! sensible default so a client can be constructed with no environment at
//! all (tests use [`Config::default`]).

use std::collections::HashMap;
use std::env;
use std::time::Duration;

/// Default join request timeout in seconds.
pub const DEFAULT_JOIN_TIMEOUT_SECONDS: u64 = 10;

/// Default timeout for correlated signaling requests in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 5;

/// Default timeout for the consumer resume confirmation in seconds.
pub const DEFAULT_RESUME_TIMEOUT_SECONDS: u64 = 2;

/// Default window a lost signaling channel may stay degraded before the
/// session is failed, in seconds.
pub const DEFAULT_DISCONNECT_GRACE_SECONDS: u64 = 15;

/// Room client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bounded wait for a join response (default: 10s). A join that receives
    /// neither success nor error within this window fails.
    pub join_timeout: Duration,

    /// Bounded wait for transport/produce/consume confirmations (default: 5s).
    pub request_timeout: Duration,

    /// Bounded wait for the consumer resume confirmation (default: 2s).
    /// A resume timeout is non-fatal.
    pub resume_timeout: Duration,

    /// How long a session may stay degraded after signaling loss before it
    /// is failed (default: 15s).
    pub disconnect_grace: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            join_timeout: Duration::from_secs(DEFAULT_JOIN_TIMEOUT_SECONDS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS),
            resume_timeout: Duration::from_secs(DEFAULT_RESUME_TIMEOUT_SECONDS),
            disconnect_grace: Duration::from_secs(DEFAULT_DISCONNECT_GRACE_SECONDS),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    #[must_use]
    pub fn from_vars(vars: &HashMap<String, String>) -> Self {
        let seconds = |key: &str, default: u64| {
            vars.get(key)
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        };

        Self {
            join_timeout: Duration::from_secs(seconds(
                "ROOM_JOIN_TIMEOUT_SECONDS",
                DEFAULT_JOIN_TIMEOUT_SECONDS,
            )),
            request_timeout: Duration::from_secs(seconds(
                "ROOM_REQUEST_TIMEOUT_SECONDS",
                DEFAULT_REQUEST_TIMEOUT_SECONDS,
            )),
            resume_timeout: Duration::from_secs(seconds(
                "ROOM_RESUME_TIMEOUT_SECONDS",
                DEFAULT_RESUME_TIMEOUT_SECONDS,
            )),
            disconnect_grace: Duration::from_secs(seconds(
                "ROOM_DISCONNECT_GRACE_SECONDS",
                DEFAULT_DISCONNECT_GRACE_SECONDS,
            )),
        }
    }
}
