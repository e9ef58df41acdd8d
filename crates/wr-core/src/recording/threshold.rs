use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Default flush threshold: 5 MiB.
pub const DEFAULT_FLUSH_THRESHOLD_BYTES: u64 = 5 * 1024 * 1024;

/// Shared, runtime-adjustable flush threshold.
///
/// Clones observe the same value; the session reads it on every fragment arrival, so
/// a change takes effect with the next fragment.
#[derive(Debug, Clone)]
pub struct FlushThreshold(Arc<AtomicU64>);

impl FlushThreshold {
    pub fn new(bytes: u64) -> Self {
        Self(Arc::new(AtomicU64::new(bytes)))
    }

    pub fn from_mib(mib: f64) -> Self {
        Self::new(mib_to_bytes(mib))
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self, bytes: u64) {
        self.0.store(bytes, Ordering::Relaxed);
    }
}

impl Default for FlushThreshold {
    fn default() -> Self {
        Self::new(DEFAULT_FLUSH_THRESHOLD_BYTES)
    }
}

pub fn mib_to_bytes(mib: f64) -> u64 {
    if mib.is_finite() && mib > 0.0 {
        (mib * 1024.0 * 1024.0) as u64
    } else {
        0
    }
}
