// Blink counter fed by an external eye-state classifier

use crate::models::capture::RawFrame;
use crate::models::pose::PoseResult;
use std::sync::atomic::{AtomicU64, Ordering};

/// External eye-state classifier. Reports whether `frame` completes a blink.
pub trait BlinkDetector: Send + Sync {
    fn detect_blink(&self, frame: &RawFrame) -> PoseResult<bool>;
}

/// Number of blinks seen since creation or the last reset
#[derive(Debug, Default)]
pub struct BlinkCounter {
    count: AtomicU64,
}

impl BlinkCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one blink pulse, returning the new total
    pub fn record_blink(&self) -> u64 {
        self.count.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn reset(&self) {
        self.count.store(0, Ordering::SeqCst);
    }

    pub fn current(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }
}
