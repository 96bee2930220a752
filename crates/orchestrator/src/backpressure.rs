//! Bounds in-flight file processing (§4.F "Back-pressure"). Concurrency is
//! capped by `buffer_unordered` at the call site; this type adds the second,
//! independent cap on estimated memory held by files currently being read
//! and detected.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct Backpressure {
    budget_bytes: u64,
    in_flight_bytes: Arc<AtomicU64>,
}

impl Backpressure {
    pub fn new(memory_budget_mb: u64) -> Self {
        Self {
            budget_bytes: memory_budget_mb.saturating_mul(1024 * 1024),
            in_flight_bytes: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Blocks until `file_size` bytes fit within the remaining budget, then
    /// reserves them. A single file larger than the whole budget is let
    /// through alone (reserving 0 would starve every later file) rather than
    /// hung forever.
    pub async fn acquire(&self, file_size: u64) -> BackpressureGuard {
        loop {
            let current = self.in_flight_bytes.load(Ordering::SeqCst);
            if current == 0 || current.saturating_add(file_size) <= self.budget_bytes {
                self.in_flight_bytes.fetch_add(file_size, Ordering::SeqCst);
                return BackpressureGuard {
                    bytes: file_size,
                    counter: Arc::clone(&self.in_flight_bytes),
                };
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

pub struct BackpressureGuard {
    bytes: u64,
    counter: Arc<AtomicU64>,
}

impl Drop for BackpressureGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(self.bytes, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn a_file_larger_than_the_whole_budget_is_still_admitted_alone() {
        let bp = Backpressure::new(1);
        let guard = bp.acquire(10 * 1024 * 1024).await;
        drop(guard);
    }

    #[tokio::test]
    async fn releasing_a_guard_frees_the_reserved_bytes() {
        let bp = Backpressure::new(1);
        let guard = bp.acquire(512 * 1024).await;
        assert_eq!(bp.in_flight_bytes.load(Ordering::SeqCst), 512 * 1024);
        drop(guard);
        assert_eq!(bp.in_flight_bytes.load(Ordering::SeqCst), 0);
    }
}
