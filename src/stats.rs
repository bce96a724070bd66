//! Per-destination statistics counters.
//!
//! The host's own statistics registry is out of scope; this module defines
//! the counters and the label key they're registered under.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::DestinationConfig;

/// `stored`/`dropped` counters for one destination instance.
#[derive(Debug, Default)]
pub struct DestinationCounters {
    stored: AtomicU64,
    dropped: AtomicU64,
}

impl DestinationCounters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_stored(&self) {
        self.record_stored_n(1);
    }

    /// Record `n` stored messages at once, for the commit/ack point where a
    /// whole batch is acknowledged together rather than one at a time.
    pub fn record_stored_n(&self, n: u64) {
        self.stored.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stored(&self) -> u64 {
        self.stored.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// The label key counters are registered under:
/// `sql/destination/{id}/{dialect,host,port,database,table_template}`.
pub fn stats_key(id: &str, config: &DestinationConfig) -> String {
    let (dialect, host, port, database, table_template) = config.persistence_key();
    format!("sql/destination/{id}/{{{dialect},{host},{port},{database},{table_template}}}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero_and_increment_independently() {
        let counters = DestinationCounters::new();
        assert_eq!(counters.stored(), 0);
        assert_eq!(counters.dropped(), 0);
        counters.record_stored();
        counters.record_stored();
        counters.record_dropped();
        assert_eq!(counters.stored(), 2);
        assert_eq!(counters.dropped(), 1);
    }

    #[test]
    fn record_stored_n_adds_a_whole_batch_at_once() {
        let counters = DestinationCounters::new();
        counters.record_stored_n(5);
        counters.record_stored();
        assert_eq!(counters.stored(), 6);
    }
}
