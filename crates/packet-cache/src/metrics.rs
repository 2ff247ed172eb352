//! Counters for ingest, eviction and query activity
//!
//! Channel eviction triggered by an unrelated ingest is reported here rather
//! than as an ingest error.
//!
//! ## Usage
//!
//! ```ignore
//! use packet_cache::metrics::{Metrics, MetricsRecorder};
//! use std::sync::Arc;
//!
//! let metrics = Arc::new(Metrics::new());
//! let service = PacketCacheService::new(CacheConfig::default(), metrics.clone())?;
//! // ...
//! println!("{:?}", metrics.snapshot());
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::events::ReturnCode;

/// Thread-safe cache counters
#[derive(Default)]
pub struct Metrics {
    /// Packets stored as new entries
    pub packets_ingested: AtomicU64,
    /// Packets that replaced an entry with the same start time
    pub packets_replaced: AtomicU64,
    /// Packets evicted from a full buffer
    pub packets_evicted: AtomicU64,
    /// Packets dropped because they predate a full buffer's window
    pub packets_dropped_too_old: AtomicU64,
    /// Packets refused before reaching the cache
    pub packets_rejected: AtomicU64,
    /// Channel buffers created
    pub channels_created: AtomicU64,
    /// Channel buffers evicted to respect the channel bound
    pub channels_evicted: AtomicU64,
    /// Single-channel queries served
    pub queries_served: AtomicU64,
    /// Queries naming a channel that is not cached
    pub queries_unknown_channel: AtomicU64,
    /// Packets returned across all queries
    pub packets_returned: AtomicU64,
    /// Requests answered with a failure code
    pub requests_failed: AtomicU64,
    /// Failures broken down by return code
    pub requests_invalid_range: AtomicU64,
    pub requests_invalid_message: AtomicU64,
    pub requests_not_running: AtomicU64,
    pub requests_unauthorized: AtomicU64,
    pub requests_internal_error: AtomicU64,
    /// Cumulative query time in nanoseconds
    pub query_time_ns: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_packet_stored(&self, evicted_oldest: bool) {
        self.packets_ingested.fetch_add(1, Ordering::Relaxed);
        if evicted_oldest {
            self.packets_evicted.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_packet_replaced(&self) {
        self.packets_replaced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_packet_too_old(&self) {
        self.packets_dropped_too_old.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_packet_rejected(&self) {
        self.packets_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_channel_created(&self) {
        self.channels_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_channel_evicted(&self) {
        self.channels_evicted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one single-channel query
    ///
    /// # Arguments
    /// * `duration` - Time spent in the cache
    /// * `known` - Whether the channel was cached
    /// * `packets` - Packets returned
    pub fn record_query(&self, duration: Duration, known: bool, packets: usize) {
        self.queries_served.fetch_add(1, Ordering::Relaxed);
        self.query_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
        self.packets_returned
            .fetch_add(packets as u64, Ordering::Relaxed);
        if !known {
            self.queries_unknown_channel.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Count a failed request under its return code
    ///
    /// Codes that are not failures are ignored.
    pub fn record_request_failed(&self, code: ReturnCode) {
        let counter = match code {
            ReturnCode::Success | ReturnCode::UnknownChannel => return,
            ReturnCode::InvalidRange => &self.requests_invalid_range,
            ReturnCode::InvalidMessage => &self.requests_invalid_message,
            ReturnCode::NotRunning => &self.requests_not_running,
            ReturnCode::Unauthorized => &self.requests_unauthorized,
            ReturnCode::InternalError => &self.requests_internal_error,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            packets_ingested: self.packets_ingested.load(Ordering::Relaxed),
            packets_replaced: self.packets_replaced.load(Ordering::Relaxed),
            packets_evicted: self.packets_evicted.load(Ordering::Relaxed),
            packets_dropped_too_old: self.packets_dropped_too_old.load(Ordering::Relaxed),
            packets_rejected: self.packets_rejected.load(Ordering::Relaxed),
            channels_created: self.channels_created.load(Ordering::Relaxed),
            channels_evicted: self.channels_evicted.load(Ordering::Relaxed),
            queries_served: self.queries_served.load(Ordering::Relaxed),
            queries_unknown_channel: self.queries_unknown_channel.load(Ordering::Relaxed),
            packets_returned: self.packets_returned.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            requests_invalid_range: self.requests_invalid_range.load(Ordering::Relaxed),
            requests_invalid_message: self.requests_invalid_message.load(Ordering::Relaxed),
            requests_not_running: self.requests_not_running.load(Ordering::Relaxed),
            requests_unauthorized: self.requests_unauthorized.load(Ordering::Relaxed),
            requests_internal_error: self.requests_internal_error.load(Ordering::Relaxed),
            avg_query_ns: self.avg_query_time_ns(),
        }
    }

    pub fn avg_query_time_ns(&self) -> u64 {
        let total = self.query_time_ns.load(Ordering::Relaxed);
        let count = self.queries_served.load(Ordering::Relaxed);
        if count > 0 {
            total / count
        } else {
            0
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.packets_ingested,
            &self.packets_replaced,
            &self.packets_evicted,
            &self.packets_dropped_too_old,
            &self.packets_rejected,
            &self.channels_created,
            &self.channels_evicted,
            &self.queries_served,
            &self.queries_unknown_channel,
            &self.packets_returned,
            &self.requests_failed,
            &self.requests_invalid_range,
            &self.requests_invalid_message,
            &self.requests_not_running,
            &self.requests_unauthorized,
            &self.requests_internal_error,
            &self.query_time_ns,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Point-in-time metrics snapshot
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub packets_ingested: u64,
    pub packets_replaced: u64,
    pub packets_evicted: u64,
    pub packets_dropped_too_old: u64,
    pub packets_rejected: u64,
    pub channels_created: u64,
    pub channels_evicted: u64,
    pub queries_served: u64,
    pub queries_unknown_channel: u64,
    pub packets_returned: u64,
    pub requests_failed: u64,
    pub requests_invalid_range: u64,
    pub requests_invalid_message: u64,
    pub requests_not_running: u64,
    pub requests_unauthorized: u64,
    pub requests_internal_error: u64,
    pub avg_query_ns: u64,
}

/// Sink for cache metrics
///
/// Implement this to forward counters to an external metrics system.
pub trait MetricsRecorder: Send + Sync {
    fn record_packet_stored(&self, evicted_oldest: bool);
    fn record_packet_replaced(&self);
    fn record_packet_too_old(&self);
    fn record_packet_rejected(&self);
    fn record_channel_created(&self);
    fn record_channel_evicted(&self);
    fn record_query(&self, duration: Duration, known: bool, packets: usize);
    fn record_request_failed(&self, code: ReturnCode);
}

/// Recorder that discards everything
#[derive(Default)]
pub struct NoOpMetrics;

impl MetricsRecorder for NoOpMetrics {
    fn record_packet_stored(&self, _: bool) {}
    fn record_packet_replaced(&self) {}
    fn record_packet_too_old(&self) {}
    fn record_packet_rejected(&self) {}
    fn record_channel_created(&self) {}
    fn record_channel_evicted(&self) {}
    fn record_query(&self, _: Duration, _: bool, _: usize) {}
    fn record_request_failed(&self, _: ReturnCode) {}
}

impl MetricsRecorder for Metrics {
    fn record_packet_stored(&self, evicted_oldest: bool) {
        Metrics::record_packet_stored(self, evicted_oldest);
    }

    fn record_packet_replaced(&self) {
        Metrics::record_packet_replaced(self);
    }

    fn record_packet_too_old(&self) {
        Metrics::record_packet_too_old(self);
    }

    fn record_packet_rejected(&self) {
        Metrics::record_packet_rejected(self);
    }

    fn record_channel_created(&self) {
        Metrics::record_channel_created(self);
    }

    fn record_channel_evicted(&self) {
        Metrics::record_channel_evicted(self);
    }

    fn record_query(&self, duration: Duration, known: bool, packets: usize) {
        Metrics::record_query(self, duration, known, packets);
    }

    fn record_request_failed(&self, code: ReturnCode) {
        Metrics::record_request_failed(self, code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        let snapshot = Metrics::new().snapshot();
        assert_eq!(snapshot, MetricsSnapshot::default());
    }

    #[test]
    fn test_record_ingest() {
        let metrics = Metrics::new();
        metrics.record_packet_stored(false);
        metrics.record_packet_stored(true);
        metrics.record_packet_replaced();
        metrics.record_packet_too_old();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.packets_ingested, 2);
        assert_eq!(snapshot.packets_evicted, 1);
        assert_eq!(snapshot.packets_replaced, 1);
        assert_eq!(snapshot.packets_dropped_too_old, 1);
    }

    #[test]
    fn test_record_queries() {
        let metrics = Metrics::new();
        metrics.record_query(Duration::from_nanos(100), true, 3);
        metrics.record_query(Duration::from_nanos(200), false, 0);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.queries_served, 2);
        assert_eq!(snapshot.queries_unknown_channel, 1);
        assert_eq!(snapshot.packets_returned, 3);
        assert_eq!(snapshot.avg_query_ns, 150);
    }

    #[test]
    fn test_failures_counted_per_code() {
        let metrics = Metrics::new();
        metrics.record_request_failed(ReturnCode::InvalidRange);
        metrics.record_request_failed(ReturnCode::InvalidRange);
        metrics.record_request_failed(ReturnCode::InvalidMessage);
        metrics.record_request_failed(ReturnCode::NotRunning);
        metrics.record_request_failed(ReturnCode::Unauthorized);
        metrics.record_request_failed(ReturnCode::InternalError);
        metrics.record_request_failed(ReturnCode::UnknownChannel);
        metrics.record_request_failed(ReturnCode::Success);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests_failed, 6);
        assert_eq!(snapshot.requests_invalid_range, 2);
        assert_eq!(snapshot.requests_invalid_message, 1);
        assert_eq!(snapshot.requests_not_running, 1);
        assert_eq!(snapshot.requests_unauthorized, 1);
        assert_eq!(snapshot.requests_internal_error, 1);
    }

    #[test]
    fn test_reset() {
        let metrics = Metrics::new();
        metrics.record_channel_created();
        metrics.record_channel_evicted();
        metrics.record_request_failed(ReturnCode::InvalidRange);
        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_noop_metrics() {
        let metrics = NoOpMetrics;
        metrics.record_packet_stored(true);
        metrics.record_query(Duration::from_nanos(1), false, 0);
        metrics.record_request_failed(ReturnCode::InternalError);
    }
}
