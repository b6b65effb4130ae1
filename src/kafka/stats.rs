use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by the producer engine and the broker client.
///
/// `delivered` and `delivery_failed` come from delivery reports drained by
/// the poll thread; they are never reported back to the caller of `produce`.
#[derive(Debug, Default)]
pub struct ProducerStats {
    submitted: AtomicU64,
    rejected: AtomicU64,
    delivered: AtomicU64,
    delivery_failed: AtomicU64,
}

/// Point-in-time copy of [`ProducerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub submitted: u64,
    pub rejected: u64,
    pub delivered: u64,
    pub delivery_failed: u64,
}

impl ProducerStats {
    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivery_failed(&self) {
        self.delivery_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            delivery_failed: self.delivery_failed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_serialization() {
        let stats = ProducerStats::default();
        stats.record_submitted();
        stats.record_submitted();
        stats.record_rejected();
        stats.record_delivered();

        let json = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(json["submitted"], 2);
        assert_eq!(json["rejected"], 1);
        assert_eq!(json["delivered"], 1);
        assert_eq!(json["delivery_failed"], 0);
    }
}
