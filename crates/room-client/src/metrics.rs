//! Session metrics.
//!
//! Shared between the session actor (which updates values) and embedders
//! (which read them for reporting). All fields are atomic for lock-free
//! concurrent access.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Counters and gauges for one room client.
#[derive(Debug, Default)]
pub struct SessionMetrics {
    /// Sessions successfully joined.
    sessions_joined: AtomicU64,
    /// Producers created over the session lifetime.
    producers_created: AtomicU64,
    /// Consumers created over the session lifetime.
    consumers_created: AtomicU64,
    /// Per-track produce failures (non-fatal).
    produce_failures: AtomicU64,
    /// Per-producer consume failures (non-fatal).
    consume_failures: AtomicU64,
    /// Stale or duplicate confirmations discarded by the correlation map.
    stale_responses: AtomicU64,
    /// Current number of remote participants in the roster.
    participants: AtomicUsize,
}

/// Snapshot of session metrics at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionMetricsSnapshot {
    pub sessions_joined: u64,
    pub producers_created: u64,
    pub consumers_created: u64,
    pub produce_failures: u64,
    pub consume_failures: u64,
    pub stale_responses: u64,
    pub participants: usize,
}

impl SessionMetrics {
    /// Create a new shared metrics instance.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record a successful join.
    pub fn record_join(&self) {
        self.sessions_joined.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a producer being created.
    pub fn record_producer_created(&self) {
        self.producers_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a consumer being created.
    pub fn record_consumer_created(&self) {
        self.consumers_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a per-track produce failure.
    pub fn record_produce_failure(&self) {
        self.produce_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a per-producer consume failure.
    pub fn record_consume_failure(&self) {
        self.consume_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a stale confirmation being discarded.
    pub fn record_stale_response(&self) {
        self.stale_responses.fetch_add(1, Ordering::Relaxed);
    }

    /// Update the participant gauge.
    pub fn set_participants(&self, count: usize) {
        self.participants.store(count, Ordering::Relaxed);
    }

    /// Stale confirmations discarded so far.
    #[must_use]
    pub fn stale_responses(&self) -> u64 {
        self.stale_responses.load(Ordering::Relaxed)
    }

    /// Take a snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> SessionMetricsSnapshot {
        SessionMetricsSnapshot {
            sessions_joined: self.sessions_joined.load(Ordering::Relaxed),
            producers_created: self.producers_created.load(Ordering::Relaxed),
            consumers_created: self.consumers_created.load(Ordering::Relaxed),
            produce_failures: self.produce_failures.load(Ordering::Relaxed),
            consume_failures: self.consume_failures.load(Ordering::Relaxed),
            stale_responses: self.stale_responses.load(Ordering::Relaxed),
            participants: self.participants.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = SessionMetrics::new();

        metrics.record_join();
        metrics.record_producer_created();
        metrics.record_producer_created();
        metrics.record_consumer_created();
        metrics.record_produce_failure();
        metrics.record_stale_response();
        metrics.set_participants(3);

        let snap = metrics.snapshot();
        assert_eq!(snap.sessions_joined, 1);
        assert_eq!(snap.producers_created, 2);
        assert_eq!(snap.consumers_created, 1);
        assert_eq!(snap.produce_failures, 1);
        assert_eq!(snap.consume_failures, 0);
        assert_eq!(snap.stale_responses, 1);
        assert_eq!(snap.participants, 3);
    }

    #[test]
    fn test_participant_gauge_overwrites() {
        let metrics = SessionMetrics::new();
        metrics.set_participants(5);
        metrics.set_participants(2);
        assert_eq!(metrics.snapshot().participants, 2);
    }
}
