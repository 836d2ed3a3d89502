use crate::level::Level;
use serde::Serialize;
use std::ops::Add;
use std::sync::atomic::{AtomicU64, Ordering};

const DROP_BUCKETS: usize = 4;

/// Lock-free delivery counters shared by a sink and its consumer thread.
///
/// Counters are independent; a [`Snapshot`] is a point read of each one
/// and is meant for monitoring rather than exact accounting.
#[derive(Debug, Default)]
pub struct Stats {
    dropped: [AtomicU64; DROP_BUCKETS],
    blocked: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
}

/// Fatal and Panic share the Error bucket.
#[inline]
fn bucket(level: Level) -> usize {
    level.index().min(DROP_BUCKETS - 1)
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_dropped(&self, level: Level) {
        self.dropped[bucket(level)].fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_blocked(&self) {
        self.blocked.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_processed(&self, n: u64) {
        self.processed.fetch_add(n, Ordering::Relaxed);
    }

    /// `n` records were lost to a destination write error.
    #[inline]
    pub fn add_failed(&self, n: u64) {
        self.failed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn dropped(&self, level: Level) -> u64 {
        self.dropped[bucket(level)].load(Ordering::Relaxed)
    }

    pub fn total_dropped(&self) -> u64 {
        self.dropped.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    pub fn blocked(&self) -> u64 {
        self.blocked.load(Ordering::Relaxed)
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        for counter in &self.dropped {
            counter.store(0, Ordering::Relaxed);
        }
        self.blocked.store(0, Ordering::Relaxed);
        self.processed.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            dropped_debug: self.dropped(Level::Debug),
            dropped_info: self.dropped(Level::Info),
            dropped_warn: self.dropped(Level::Warn),
            dropped_error: self.dropped(Level::Error),
            blocked: self.blocked(),
            processed: self.processed(),
            failed: self.failed(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub dropped_debug: u64,
    pub dropped_info: u64,
    pub dropped_warn: u64,
    /// Includes Fatal and Panic records.
    pub dropped_error: u64,
    pub blocked: u64,
    pub processed: u64,
    /// Records whose write failed; a failed batch counts every record in it.
    pub failed: u64,
}

impl Snapshot {
    pub fn dropped(&self, level: Level) -> u64 {
        match level {
            Level::Debug => self.dropped_debug,
            Level::Info => self.dropped_info,
            Level::Warn => self.dropped_warn,
            Level::Error | Level::Fatal | Level::Panic => self.dropped_error,
        }
    }

    pub fn total_dropped(&self) -> u64 {
        self.dropped_debug + self.dropped_info + self.dropped_warn + self.dropped_error
    }
}

impl Add for Snapshot {
    type Output = Snapshot;

    fn add(self, rhs: Snapshot) -> Snapshot {
        Snapshot {
            dropped_debug: self.dropped_debug + rhs.dropped_debug,
            dropped_info: self.dropped_info + rhs.dropped_info,
            dropped_warn: self.dropped_warn + rhs.dropped_warn,
            dropped_error: self.dropped_error + rhs.dropped_error,
            blocked: self.blocked + rhs.blocked,
            processed: self.processed + rhs.processed,
            failed: self.failed + rhs.failed,
        }
    }
}

impl std::iter::Sum for Snapshot {
    fn sum<I: Iterator<Item = Snapshot>>(iter: I) -> Snapshot {
        iter.fold(Snapshot::default(), Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severe_levels_share_error_bucket() {
        let stats = Stats::new();
        stats.record_dropped(Level::Error);
        stats.record_dropped(Level::Fatal);
        stats.record_dropped(Level::Panic);
        stats.record_dropped(Level::Debug);

        let snap = stats.snapshot();
        assert_eq!(snap.dropped(Level::Error), 3);
        assert_eq!(snap.dropped(Level::Panic), 3);
        assert_eq!(snap.dropped_debug, 1);
        assert_eq!(snap.total_dropped(), 4);
    }

    #[test]
    fn reset_zeroes_all_counters() {
        let stats = Stats::new();
        stats.record_blocked();
        stats.add_processed(10);
        stats.add_failed(2);
        stats.record_dropped(Level::Info);
        stats.reset();
        assert_eq!(stats.snapshot(), Snapshot::default());
    }

    #[test]
    fn snapshots_sum() {
        let a = Snapshot { processed: 3, dropped_info: 1, ..Default::default() };
        let b = Snapshot { processed: 4, blocked: 2, ..Default::default() };
        let total: Snapshot = [a, b].into_iter().sum();
        assert_eq!(total.processed, 7);
        assert_eq!(total.blocked, 2);
        assert_eq!(total.dropped_info, 1);
    }
}
