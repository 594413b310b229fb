use std::sync::atomic::{AtomicU32, Ordering};

use kolscout_common::DiscoveryConfig;

/// Run-scoped quota state shared between the candidate stream and the
/// engine loop. The stream reads it to size batches and stop issuing work;
/// the engine writes observations into it after each candidate.
pub struct RunQuota {
    target: u32,
    buffer_ratio: f64,
    min_batch: usize,
    max_batch: usize,
    attempt_ceiling: u32,
    qualified: AtomicU32,
    processed: AtomicU32,
    attempts: AtomicU32,
}

impl RunQuota {
    pub fn new(config: &DiscoveryConfig) -> Self {
        Self {
            target: config.target,
            buffer_ratio: config.buffer_ratio,
            min_batch: config.min_batch,
            max_batch: config.max_batch,
            attempt_ceiling: config.target.saturating_mul(config.attempt_multiplier),
            qualified: AtomicU32::new(0),
            processed: AtomicU32::new(0),
            attempts: AtomicU32::new(0),
        }
    }

    pub fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_processed(&self, qualified: bool) {
        self.processed.fetch_add(1, Ordering::SeqCst);
        if qualified {
            self.qualified.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn qualified(&self) -> u32 {
        self.qualified.load(Ordering::SeqCst)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn target(&self) -> u32 {
        self.target
    }

    pub fn target_reached(&self) -> bool {
        self.qualified() >= self.target
    }

    /// Hard safety ceiling against pathological low-qualification runs.
    pub fn attempts_exhausted(&self) -> bool {
        self.attempts() > self.attempt_ceiling
    }

    pub fn remaining(&self) -> u32 {
        self.target.saturating_sub(self.qualified())
    }

    /// Batch size for the next search term:
    /// `clamp(remaining / observed_rate * buffer_ratio, min, max)`.
    ///
    /// Before any candidate has been processed there is no rate to observe,
    /// so the remaining quota times the buffer ratio stands in. A run with
    /// observations but zero qualifications asks for the maximum batch.
    pub fn next_batch_size(&self) -> usize {
        let remaining = self.remaining() as f64;
        if remaining <= 0.0 {
            return 0;
        }
        let processed = self.processed.load(Ordering::SeqCst);
        let estimate = if processed == 0 {
            remaining * self.buffer_ratio
        } else {
            let rate = self.qualified() as f64 / processed as f64;
            if rate <= 0.0 {
                return self.max_batch;
            }
            remaining / rate * self.buffer_ratio
        };
        (estimate.ceil() as usize).clamp(self.min_batch, self.max_batch)
    }
}
