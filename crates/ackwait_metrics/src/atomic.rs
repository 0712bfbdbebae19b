use {
    crate::{Delta, Metrics, names::*},
    core::sync::atomic::{AtomicI64, AtomicU64, Ordering},
    tracing::warn,
};

/// Lock-free [`Metrics`] implementation backed by atomic counters.
///
/// Read the current figures with [`AtomicMetrics::snapshot`].
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    sessions: Counters,
    streams: Counters,
    clients: AtomicI64,
    packets_per_second: AtomicI64,
}

#[derive(Debug, Default)]
struct Counters {
    active: AtomicI64,
    successful: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of an [`AtomicMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricsSnapshot {
    /// Session figures.
    pub sessions: CountSnapshot,
    /// Stream figures.
    pub streams: CountSnapshot,
    /// Last value passed to [`Metrics::set_clients_count`].
    pub clients: i64,
    /// Last value passed to [`Metrics::set_packets_per_second`].
    pub packets_per_second: i64,
}

/// Figures for one kind of cycle in a [`MetricsSnapshot`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CountSnapshot {
    /// How many are currently active.
    pub active: i64,
    /// How many succeeded in total.
    pub successful: u64,
    /// How many failed in total.
    pub failed: u64,
}

impl AtomicMetrics {
    /// Creates a new value with every figure at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a copy of the current figures.
    ///
    /// Each figure is read independently, so a snapshot taken while other
    /// threads are recording may mix figures from before and after a
    /// recording.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sessions: self.sessions.snapshot(),
            streams: self.streams.snapshot(),
            clients: self.clients.load(Ordering::Relaxed),
            packets_per_second: self.packets_per_second.load(Ordering::Relaxed),
        }
    }
}

impl Counters {
    fn record(&self, kind: &'static str, delta: Delta) {
        match delta {
            Delta::Failed => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
            Delta::Opened => {
                self.successful.fetch_add(1, Ordering::Relaxed);
                self.active.fetch_add(1, Ordering::Relaxed);
            }
            Delta::Closed => {
                let prev = self.active.fetch_sub(1, Ordering::Relaxed);
                if prev <= 0 {
                    warn!(kind, active = prev - 1, "Closed more than were opened");
                }
            }
        }
    }

    fn snapshot(&self) -> CountSnapshot {
        CountSnapshot {
            active: self.active.load(Ordering::Relaxed),
            successful: self.successful.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

impl Metrics for AtomicMetrics {
    fn record_session(&self, delta: Delta) {
        self.sessions.record("session", delta);
    }

    fn record_stream(&self, delta: Delta) {
        self.streams.record("stream", delta);
    }

    fn set_clients_count(&self, count: i64) {
        self.clients.store(count, Ordering::Relaxed);
    }

    fn set_packets_per_second(&self, rate: i64) {
        self.packets_per_second.store(rate, Ordering::Relaxed);
    }
}

impl MetricsSnapshot {
    /// Iterates over every figure as `(name, value)`, using the names these
    /// figures are exported under.
    ///
    /// Totals above [`i64::MAX`] saturate.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, i64)> {
        let total = |n: u64| i64::try_from(n).unwrap_or(i64::MAX);
        [
            (ACTIVE_SESSIONS_COUNT, self.sessions.active),
            (SESSION_SUCCESS_TOTAL, total(self.sessions.successful)),
            (SESSION_FAIL_TOTAL, total(self.sessions.failed)),
            (ACTIVE_STREAMS_COUNT, self.streams.active),
            (STREAM_SUCCESS_TOTAL, total(self.streams.successful)),
            (STREAM_FAIL_TOTAL, total(self.streams.failed)),
            (CLIENTS_COUNT, self.clients),
            (PACKETS_PER_SECOND, self.packets_per_second),
        ]
        .into_iter()
    }
}
