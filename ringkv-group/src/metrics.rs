//! Per-group counters: cache hits/misses per tier, eviction count, loader
//! invocations/errors, peer-call latency/error count, and singleflight
//! coalesce count. Same accumulator-pattern, zero-allocation-snapshot shape
//! as the node's request metrics, scoped to one `Group` instead of the
//! whole server.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Point-in-time snapshot of a group's counters.
#[derive(Debug, Clone, Default)]
pub struct GroupMetricsSnapshot {
    pub main_hits: u64,
    pub hot_hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub loader_invocations: u64,
    pub loader_errors: u64,
    pub peer_calls: u64,
    pub peer_errors: u64,
    pub peer_latency_sum_us: u64,
    pub coalesced: u64,
}

/// Thread-safe counters for one `Group`. `Ordering::Relaxed` throughout —
/// counters are independent and only need eventual consistency with each
/// other, not a total order.
pub struct GroupMetrics {
    main_hits: AtomicU64,
    hot_hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    loader_invocations: AtomicU64,
    loader_errors: AtomicU64,
    peer_calls: AtomicU64,
    peer_errors: AtomicU64,
    peer_latency_sum_us: AtomicU64,
    coalesced: AtomicU64,
}

impl GroupMetrics {
    pub fn new() -> Self {
        GroupMetrics {
            main_hits: AtomicU64::new(0),
            hot_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            loader_invocations: AtomicU64::new(0),
            loader_errors: AtomicU64::new(0),
            peer_calls: AtomicU64::new(0),
            peer_errors: AtomicU64::new(0),
            peer_latency_sum_us: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
        }
    }

    pub fn record_main_hit(&self) {
        self.main_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hot_hit(&self) {
        self.hot_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_loader_invocation(&self) {
        self.loader_invocations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_loader_error(&self) {
        self.loader_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_peer_call(&self, latency: Duration, is_err: bool) {
        self.peer_calls.fetch_add(1, Ordering::Relaxed);
        if is_err {
            self.peer_errors.fetch_add(1, Ordering::Relaxed);
        }
        self.peer_latency_sum_us
            .fetch_add(latency.as_micros().min(u64::MAX as u128) as u64, Ordering::Relaxed);
    }

    pub fn record_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> GroupMetricsSnapshot {
        GroupMetricsSnapshot {
            main_hits: self.main_hits.load(Ordering::Relaxed),
            hot_hits: self.hot_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            loader_invocations: self.loader_invocations.load(Ordering::Relaxed),
            loader_errors: self.loader_errors.load(Ordering::Relaxed),
            peer_calls: self.peer_calls.load(Ordering::Relaxed),
            peer_errors: self.peer_errors.load(Ordering::Relaxed),
            peer_latency_sum_us: self.peer_latency_sum_us.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
        }
    }
}

impl Default for GroupMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_independently() {
        let metrics = GroupMetrics::new();
        metrics.record_main_hit();
        metrics.record_main_hit();
        metrics.record_hot_hit();
        metrics.record_miss();
        metrics.record_eviction();
        metrics.record_loader_invocation();
        metrics.record_loader_invocation();
        metrics.record_loader_error();
        metrics.record_peer_call(Duration::from_micros(50), false);
        metrics.record_peer_call(Duration::from_micros(100), true);
        metrics.record_coalesced();

        let snap = metrics.snapshot();
        assert_eq!(snap.main_hits, 2);
        assert_eq!(snap.hot_hits, 1);
        assert_eq!(snap.misses, 1);
        assert_eq!(snap.evictions, 1);
        assert_eq!(snap.loader_invocations, 2);
        assert_eq!(snap.loader_errors, 1);
        assert_eq!(snap.peer_calls, 2);
        assert_eq!(snap.peer_errors, 1);
        assert_eq!(snap.peer_latency_sum_us, 150);
        assert_eq!(snap.coalesced, 1);
    }
}
