//! Lock-free operation counters for the bench command.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct Metrics {
    started: Instant,
    writes: AtomicU64,
    reads: AtomicU64,
    errors: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            started: Instant::now(),
            writes: AtomicU64::new(0),
            reads: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sample(&self) -> Sample {
        Sample {
            elapsed: self.started.elapsed(),
            writes: self.writes.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub elapsed: Duration,
    pub writes: u64,
    pub reads: u64,
    pub errors: u64,
}

impl Sample {
    pub fn operations(&self) -> u64 {
        self.writes + self.reads
    }

    /// Operations per second since the counters were created.
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.operations() as f64 / secs
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<8} {:>9} {:>9} {:>7} {:>9.0}/s",
            format!("{:.1}s", self.elapsed.as_secs_f64()),
            self.writes,
            self.reads,
            self.errors,
            self.rate()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let metrics = Metrics::new();
        metrics.record_write();
        metrics.record_write();
        metrics.record_read();
        metrics.record_error();
        let sample = metrics.sample();
        assert_eq!(sample.writes, 2);
        assert_eq!(sample.reads, 1);
        assert_eq!(sample.errors, 1);
        assert_eq!(sample.operations(), 3);
    }

    #[test]
    fn test_rate_at_zero_elapsed() {
        let sample = Sample {
            elapsed: Duration::ZERO,
            writes: 10,
            reads: 0,
            errors: 0,
        };
        assert_eq!(sample.rate(), 0.0);
    }
}
