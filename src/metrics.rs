//! Operation counters shared across delete and restore workers.
//!
//! All counters use atomic operations so many worker threads can report
//! samples without locking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Accumulates counters and timings across operations.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    operations: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    bytes_processed: AtomicU64,
    total_duration_ms: AtomicU64,
    in_flight: AtomicU64,
    peak_in_flight: AtomicU64,
}

/// Point-in-time copy of the collector's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub operations: u64,
    pub successes: u64,
    pub failures: u64,
    pub bytes_processed: u64,
    pub total_duration_ms: u64,
    pub peak_in_flight: u64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one finished operation, successful or not.
    pub fn record(&self, success: bool, bytes: u64, elapsed: Duration) {
        self.operations.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        self.bytes_processed.fetch_add(bytes, Ordering::Relaxed);
        self.total_duration_ms
            .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
    }

    /// Marks one unit of work as in flight until the guard drops. The peak
    /// concurrent count is maintained with a compare-and-swap loop.
    pub fn begin(&self) -> InFlightGuard<'_> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let mut peak = self.peak_in_flight.load(Ordering::SeqCst);
        while current > peak {
            match self.peak_in_flight.compare_exchange(
                peak,
                current,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(actual) => peak = actual,
            }
        }
        InFlightGuard { collector: self }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            operations: self.operations.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            bytes_processed: self.bytes_processed.load(Ordering::Relaxed),
            total_duration_ms: self.total_duration_ms.load(Ordering::Relaxed),
            peak_in_flight: self.peak_in_flight.load(Ordering::SeqCst),
        }
    }
}

/// Decrements the in-flight gauge when dropped.
pub struct InFlightGuard<'a> {
    collector: &'a MetricsCollector,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.collector.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
