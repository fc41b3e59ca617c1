//! Bucketed rolling window of call outcomes.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    epoch: u64,
    successes: u32,
    failures: u32,
}

/// Success/failure counts over the last `window`, at bucket granularity
#[derive(Debug, Clone)]
pub struct RollingWindow {
    origin: Instant,
    bucket_width: Duration,
    buckets: Vec<Bucket>,
}

/// Aggregated counts across live buckets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowCounts {
    pub successes: u32,
    pub failures: u32,
}

impl WindowCounts {
    pub fn total(&self) -> u32 {
        self.successes + self.failures
    }

    /// Failure percentage, 0 when nothing was recorded
    pub fn error_percentage(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => f64::from(self.failures) * 100.0 / f64::from(total),
        }
    }
}

impl RollingWindow {
    pub fn new(bucket_width: Duration, buckets: u32) -> Self {
        Self {
            origin: Instant::now(),
            bucket_width,
            buckets: vec![Bucket::default(); buckets.max(1) as usize],
        }
    }

    fn epoch_at(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.origin).as_nanos();
        (elapsed / self.bucket_width.as_nanos().max(1)) as u64
    }

    fn slot(&mut self, now: Instant) -> &mut Bucket {
        let epoch = self.epoch_at(now);
        let len = self.buckets.len() as u64;
        let bucket = &mut self.buckets[(epoch % len) as usize];
        if bucket.epoch != epoch {
            *bucket = Bucket {
                epoch,
                ..Bucket::default()
            };
        }
        bucket
    }

    pub fn record_success(&mut self, now: Instant) {
        self.slot(now).successes += 1;
    }

    pub fn record_failure(&mut self, now: Instant) {
        self.slot(now).failures += 1;
    }

    /// Counts from buckets still inside the window at `now`
    pub fn counts(&self, now: Instant) -> WindowCounts {
        let current = self.epoch_at(now);
        let len = self.buckets.len() as u64;

        self.buckets
            .iter()
            .filter(|b| b.epoch <= current && current - b.epoch < len)
            .fold(WindowCounts::default(), |acc, b| WindowCounts {
                successes: acc.successes + b.successes,
                failures: acc.failures + b.failures,
            })
    }

    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            *bucket = Bucket::default();
        }
    }
}
