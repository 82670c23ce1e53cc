//! # Metrics Collection Module
//!
//! Lock-free metrics collection for the Habitus prediction service.
//!
//! ## Design Principles
//!
//! - **Lock-Free**: All metrics use atomic operations
//! - **Low Overhead**: Relaxed ordering, no allocation in hot paths
//! - **Thread Safe**: Safe for concurrent access from multiple tasks
//!
//! ## Metric Categories
//!
//! - **Request Metrics**: Count, active requests, latency distribution
//! - **Response Metrics**: Status code classes, error count

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Thread-safe metrics collector for prediction service operations
///
/// All counters use atomic operations for lock-free updates; histogram
/// buckets are pre-allocated to avoid runtime allocation. Snapshot
/// collection uses consistent relaxed reads across all metrics.
///
/// ## Usage Example
///
/// ```rust
/// use habitus_shared::metrics::MetricsCollector;
/// use std::time::Duration;
///
/// let metrics = MetricsCollector::new();
///
/// metrics.record_request();
/// metrics.record_response(200);
/// metrics.record_request_duration(Duration::from_millis(3));
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.total_requests, 1);
/// ```
#[derive(Debug)]
pub struct MetricsCollector {
    /// Total number of requests received
    total_requests: AtomicU64,

    /// Number of requests currently being processed
    active_requests: AtomicUsize,

    /// Total number of completed responses
    total_responses: AtomicU64,

    /// Number of requests that resulted in errors
    total_errors: AtomicU64,

    /// Histogram buckets for request duration tracking
    /// Buckets represent: <1ms, <5ms, <10ms, <50ms, <100ms, <500ms, <1s, <5s, >=5s
    duration_buckets: [AtomicU64; 9],

    /// 2xx response codes
    status_2xx: AtomicU64,

    /// 4xx response codes
    status_4xx: AtomicU64,

    /// 5xx response codes
    status_5xx: AtomicU64,

    /// Timestamp when metrics collection started
    start_time: SystemTime,
}

impl MetricsCollector {
    /// Creates a new metrics collector instance
    ///
    /// Initializes all counters to zero and records the start time for
    /// uptime calculations.
    pub fn new() -> Self {
        debug!("Initializing metrics collector");

        Self {
            total_requests: AtomicU64::new(0),
            active_requests: AtomicUsize::new(0),
            total_responses: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            duration_buckets: [
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
            ],
            status_2xx: AtomicU64::new(0),
            status_4xx: AtomicU64::new(0),
            status_5xx: AtomicU64::new(0),
            start_time: SystemTime::now(),
        }
    }

    /// Records a new incoming request
    ///
    /// Called when a request is received and processing begins. Increments
    /// both the total request counter and the active request counter.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use habitus_shared::metrics::MetricsCollector;
    ///
    /// let metrics = MetricsCollector::new();
    /// metrics.record_request();
    ///
    /// let snapshot = metrics.snapshot();
    /// assert_eq!(snapshot.total_requests, 1);
    /// assert_eq!(snapshot.active_requests, 1);
    /// ```
    #[inline]
    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.active_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a completed response with status code
    ///
    /// Decrements the active request counter and increments the
    /// appropriate status class counter.
    ///
    /// # Status Code Classification
    ///
    /// - 200-299: Success responses (2xx counter)
    /// - 400-499: Client error responses (4xx counter)
    /// - 500-599: Server error responses (5xx counter)
    /// - Other: Logged as warning, counted in total only
    #[inline]
    pub fn record_response(&self, status_code: u16) {
        self.total_responses.fetch_add(1, Ordering::Relaxed);
        self.active_requests.fetch_sub(1, Ordering::Relaxed);

        match status_code {
            200..=299 => {
                self.status_2xx.fetch_add(1, Ordering::Relaxed);
            }
            400..=499 => {
                self.status_4xx.fetch_add(1, Ordering::Relaxed);
            }
            500..=599 => {
                self.status_5xx.fetch_add(1, Ordering::Relaxed);
            }
            _ => {
                warn!(
                    status_code = status_code,
                    "Unexpected HTTP status code recorded"
                );
            }
        }
    }

    /// Records an error condition
    ///
    /// Called when request processing fails before a response could be
    /// produced. Decrements the active request counter and increments the
    /// error counter.
    #[inline]
    pub fn record_error(&self) {
        self.total_errors.fetch_add(1, Ordering::Relaxed);
        self.active_requests.fetch_sub(1, Ordering::Relaxed);
    }

    /// Records request duration for latency tracking
    ///
    /// Adds the request duration to the appropriate histogram bucket.
    ///
    /// # Histogram Buckets
    ///
    /// - Bucket 0: < 1ms
    /// - Bucket 1: < 5ms
    /// - Bucket 2: < 10ms
    /// - Bucket 3: < 50ms
    /// - Bucket 4: < 100ms
    /// - Bucket 5: < 500ms
    /// - Bucket 6: < 1s
    /// - Bucket 7: < 5s
    /// - Bucket 8: >= 5s
    #[inline]
    pub fn record_request_duration(&self, duration: Duration) {
        let duration_ms = duration.as_millis() as u64;

        let bucket_index = match duration_ms {
            0..=1 => 0,
            2..=5 => 1,
            6..=10 => 2,
            11..=50 => 3,
            51..=100 => 4,
            101..=500 => 5,
            501..=1000 => 6,
            1001..=5000 => 7,
            _ => 8,
        };

        self.duration_buckets[bucket_index].fetch_add(1, Ordering::Relaxed);
    }

    /// Creates a consistent snapshot of all current metrics
    ///
    /// Individual metrics may be updated between reads, so derived
    /// calculations should tolerate small inconsistencies. Safe to call
    /// concurrently with metric updates.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let duration_histogram = [
            self.duration_buckets[0].load(Ordering::Relaxed),
            self.duration_buckets[1].load(Ordering::Relaxed),
            self.duration_buckets[2].load(Ordering::Relaxed),
            self.duration_buckets[3].load(Ordering::Relaxed),
            self.duration_buckets[4].load(Ordering::Relaxed),
            self.duration_buckets[5].load(Ordering::Relaxed),
            self.duration_buckets[6].load(Ordering::Relaxed),
            self.duration_buckets[7].load(Ordering::Relaxed),
            self.duration_buckets[8].load(Ordering::Relaxed),
        ];

        let uptime = self.start_time.elapsed().unwrap_or_default();

        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            active_requests: self.active_requests.load(Ordering::Relaxed),
            total_responses: self.total_responses.load(Ordering::Relaxed),
            total_errors: self.total_errors.load(Ordering::Relaxed),
            status_2xx: self.status_2xx.load(Ordering::Relaxed),
            status_4xx: self.status_4xx.load(Ordering::Relaxed),
            status_5xx: self.status_5xx.load(Ordering::Relaxed),
            duration_histogram,
            uptime,
            timestamp: SystemTime::now(),
        }
    }

    /// Resets all counters to zero
    ///
    /// Primarily useful for testing. Does not affect the active request
    /// counter.
    pub fn reset(&self) {
        debug!("Resetting metrics counters");

        self.total_requests.store(0, Ordering::Relaxed);
        self.total_responses.store(0, Ordering::Relaxed);
        self.total_errors.store(0, Ordering::Relaxed);
        self.status_2xx.store(0, Ordering::Relaxed);
        self.status_4xx.store(0, Ordering::Relaxed);
        self.status_5xx.store(0, Ordering::Relaxed);

        for bucket in &self.duration_buckets {
            bucket.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable snapshot of metrics at a point in time
///
/// Provides a consistent view of all service metrics collected at a
/// specific timestamp, with helper methods for common derived values.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    /// Total number of requests received since startup
    pub total_requests: u64,

    /// Number of requests currently being processed
    pub active_requests: usize,

    /// Total number of completed responses sent
    pub total_responses: u64,

    /// Total number of requests that resulted in errors
    pub total_errors: u64,

    /// Number of 2xx status code responses
    pub status_2xx: u64,

    /// Number of 4xx status code responses
    pub status_4xx: u64,

    /// Number of 5xx status code responses
    pub status_5xx: u64,

    /// Request duration histogram buckets
    /// Index 0: <1ms, 1: <5ms, 2: <10ms, 3: <50ms, 4: <100ms, 5: <500ms, 6: <1s, 7: <5s, 8: >=5s
    pub duration_histogram: [u64; 9],

    /// Time since service startup
    pub uptime: Duration,

    /// Timestamp when this snapshot was created
    pub timestamp: SystemTime,
}

impl MetricsSnapshot {
    /// Calculates the success rate as a fraction (0.0 to 1.0)
    ///
    /// Success is defined as responses with 2xx status codes; 4xx and 5xx
    /// are considered failures. Returns 0.0 if no responses were recorded.
    pub fn success_rate(&self) -> f64 {
        let total_completed = self.status_2xx + self.status_4xx + self.status_5xx;
        if total_completed == 0 {
            return 0.0;
        }

        self.status_2xx as f64 / total_completed as f64
    }

    /// Calculates the error rate as a fraction (0.0 to 1.0)
    ///
    /// Includes both 5xx responses and requests that failed before a
    /// response could be produced. Returns 0.0 if no requests were
    /// recorded.
    pub fn error_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }

        let total_errors = self.total_errors + self.status_5xx;
        total_errors as f64 / self.total_requests as f64
    }

    /// Calculates requests per second based on uptime
    ///
    /// Returns 0.0 for very short uptimes to avoid division noise.
    pub fn requests_per_second(&self) -> f64 {
        let uptime_secs = self.uptime.as_secs_f64();
        if uptime_secs < 0.001 {
            return 0.0;
        }

        self.total_requests as f64 / uptime_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_metrics_collector_new() {
        let collector = MetricsCollector::new();
        let snapshot = collector.snapshot();

        assert_eq!(snapshot.total_requests, 0);
        assert_eq!(snapshot.active_requests, 0);
        assert_eq!(snapshot.total_responses, 0);
        assert_eq!(snapshot.total_errors, 0);
    }

    #[test]
    fn test_record_request() {
        let collector = MetricsCollector::new();

        collector.record_request();
        let snapshot = collector.snapshot();

        assert_eq!(snapshot.total_requests, 1);
        assert_eq!(snapshot.active_requests, 1);
    }

    #[test]
    fn test_record_response() {
        let collector = MetricsCollector::new();

        collector.record_request();
        collector.record_response(200);

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.total_responses, 1);
        assert_eq!(snapshot.status_2xx, 1);
        assert_eq!(snapshot.active_requests, 0);
    }

    #[test]
    fn test_record_error() {
        let collector = MetricsCollector::new();

        collector.record_request();
        collector.record_error();

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.total_errors, 1);
        assert_eq!(snapshot.active_requests, 0);
    }

    #[test]
    fn test_duration_histogram() {
        let collector = MetricsCollector::new();

        collector.record_request_duration(Duration::from_micros(500)); // < 1ms
        collector.record_request_duration(Duration::from_millis(3)); // < 5ms
        collector.record_request_duration(Duration::from_millis(25)); // < 50ms
        collector.record_request_duration(Duration::from_millis(200)); // < 500ms
        collector.record_request_duration(Duration::from_secs(2)); // < 5s

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.duration_histogram[0], 1);
        assert_eq!(snapshot.duration_histogram[1], 1);
        assert_eq!(snapshot.duration_histogram[3], 1);
        assert_eq!(snapshot.duration_histogram[5], 1);
        assert_eq!(snapshot.duration_histogram[7], 1);
    }

    #[test]
    fn test_success_rate_calculation() {
        let snapshot = MetricsSnapshot {
            total_requests: 100,
            active_requests: 0,
            total_responses: 100,
            total_errors: 0,
            status_2xx: 95,
            status_4xx: 4,
            status_5xx: 1,
            duration_histogram: [0; 9],
            uptime: Duration::from_secs(3600),
            timestamp: SystemTime::now(),
        };

        assert_eq!(snapshot.success_rate(), 0.95);
    }

    #[test]
    fn test_error_rate_calculation() {
        let snapshot = MetricsSnapshot {
            total_requests: 100,
            active_requests: 0,
            total_responses: 98,
            total_errors: 2,
            status_2xx: 95,
            status_4xx: 2,
            status_5xx: 1,
            duration_histogram: [0; 9],
            uptime: Duration::from_secs(3600),
            timestamp: SystemTime::now(),
        };

        assert_eq!(snapshot.error_rate(), 0.03);
    }

    #[test]
    fn test_concurrent_metrics_updates() {
        use std::sync::Arc;
        use std::thread;

        let collector = Arc::new(MetricsCollector::new());
        let mut handles = vec![];

        for _ in 0..10 {
            let collector_clone = Arc::clone(&collector);
            let handle = thread::spawn(move || {
                for _ in 0..1000 {
                    collector_clone.record_request();
                    collector_clone.record_response(200);
                }
            });
            handles.push(handle);
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.total_requests, 10000);
        assert_eq!(snapshot.total_responses, 10000);
        assert_eq!(snapshot.status_2xx, 10000);
        assert_eq!(snapshot.active_requests, 0);
    }
}
