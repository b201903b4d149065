//! Client Statistics Module
//!
//! Counts store traffic: hits, misses, writes, CAS conflicts and timeouts.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Client Stats ==
/// Lock-free counters shared by every caller of a client.
#[derive(Debug, Default)]
pub struct ClientStats {
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
    deletes: AtomicU64,
    cas_conflicts: AtomicU64,
    timeouts: AtomicU64,
}

impl ClientStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store(&self) {
        self.stores.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cas_conflict(&self) {
        self.cas_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    // == Snapshot ==
    /// Copies the current counter values.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            cas_conflicts: self.cas_conflicts.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }
}

// == Stats Snapshot ==
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Reads that found a value
    pub hits: u64,
    /// Reads that found nothing
    pub misses: u64,
    /// Successful writes (set, add, applied cas)
    pub stores: u64,
    /// Delete commands issued
    pub deletes: u64,
    /// CAS writes rejected because the record changed or vanished
    pub cas_conflicts: u64,
    /// Retrievals cancelled at their deadline
    pub timeouts: u64,
}

impl StatsSnapshot {
    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = ClientStats::new().snapshot();
        assert_eq!(stats, StatsSnapshot::default());
    }

    #[test]
    fn test_hit_rate_no_requests() {
        assert_eq!(ClientStats::new().snapshot().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let stats = ClientStats::new();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.snapshot().hit_rate(), 0.5);
    }

    #[test]
    fn test_counters() {
        let stats = ClientStats::new();
        stats.record_store();
        stats.record_store();
        stats.record_delete();
        stats.record_cas_conflict();
        stats.record_timeout();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.stores, 2);
        assert_eq!(snapshot.deletes, 1);
        assert_eq!(snapshot.cas_conflicts, 1);
        assert_eq!(snapshot.timeouts, 1);
    }
}
