//! Exponential backoff with jitter for job retries.

use rand::Rng;
use std::time::Duration;

/// Computes the delay before the next retry attempt, given how many attempts
/// have already failed. Grows as `base * 2^retry_count`, capped at `max`, with
/// up to 20% jitter added to avoid synchronized retry storms across workers.
pub fn next_delay(retry_count: u32, base: Duration, max: Duration) -> Duration {
    let exponent = retry_count.min(20); // guard against overflow on u64 shift
    let raw = base.saturating_mul(1u32.checked_shl(exponent).unwrap_or(u32::MAX));
    let capped = raw.min(max);

    let jitter_fraction: f64 = rand::thread_rng().gen_range(0.0..0.2);
    let jitter = capped.mul_f64(jitter_fraction);
    capped.saturating_add(jitter).min(max.saturating_add(max.mul_f64(0.2)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_with_retry_count() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(300);
        let d0 = next_delay(0, base, max);
        let d3 = next_delay(3, base, max);
        assert!(d3 > d0);
    }

    #[test]
    fn delay_never_exceeds_max_plus_jitter_bound() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(300);
        for retry in 0..30 {
            let d = next_delay(retry, base, max);
            assert!(d <= Duration::from_secs(360));
        }
    }
}
