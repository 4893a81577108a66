//! Delivery counters, kept for observability only.

use std::collections::HashMap;

use dashmap::DashMap;
use roomsync_protocol::EventKind;

/// Counters for one event type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindStats {
    /// Events of this type handed to the dispatcher.
    pub attempted: u64,
    /// Individual sends, retries included.
    pub attempts: u64,
    pub delivered: u64,
    /// Events that ran out of attempts.
    pub failed: u64,
    pub fallback_succeeded: u64,
    pub fallback_failed: u64,
}

impl KindStats {
    fn add(&mut self, other: &KindStats) {
        self.attempted += other.attempted;
        self.attempts += other.attempts;
        self.delivered += other.delivered;
        self.failed += other.failed;
        self.fallback_succeeded += other.fallback_succeeded;
        self.fallback_failed += other.fallback_failed;
    }
}

/// Point-in-time snapshot returned by `Dispatcher::stats`.
#[derive(Debug, Clone, Default)]
pub struct DeliveryStats {
    pub by_kind: HashMap<EventKind, KindStats>,
    /// Entries still in the pending table.
    pub pending: usize,
}

impl DeliveryStats {
    /// Counters for `kind`; all zero if nothing of that type was sent.
    pub fn kind(&self, kind: EventKind) -> KindStats {
        self.by_kind.get(&kind).copied().unwrap_or_default()
    }

    /// Counters summed over every type.
    pub fn total(&self) -> KindStats {
        let mut total = KindStats::default();
        for stats in self.by_kind.values() {
            total.add(stats);
        }
        total
    }
}

#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    by_kind: DashMap<EventKind, KindStats>,
}

impl StatsRecorder {
    pub(crate) fn record(&self, kind: EventKind, update: impl FnOnce(&mut KindStats)) {
        update(&mut self.by_kind.entry(kind).or_default());
    }

    pub(crate) fn snapshot(&self, pending: usize) -> DeliveryStats {
        DeliveryStats {
            by_kind: self
                .by_kind
                .iter()
                .map(|entry| (*entry.key(), *entry.value()))
                .collect(),
            pending,
        }
    }
}
