//! Exponential backoff with additive jitter.

use std::time::Duration;

use rand::Rng;

/// Calculate the delay before the attempt following `attempt`.
///
/// The exponential term is `base_ms * 2^(attempt-1)` capped at `max_ms`;
/// jitter is a uniform draw from `[0, capped * jitter_fraction]` added on
/// top (never subtracted).
pub fn calculate_backoff<R: Rng>(
    attempt: u32,
    base_ms: u64,
    max_ms: u64,
    jitter_fraction: f64,
    rng: &mut R,
) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    let jitter_range = (capped_delay as f64 * jitter_fraction).floor() as u64;
    let jitter = if jitter_range > 0 {
        rng.gen_range(0..=jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay.saturating_add(jitter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn delay_stays_within_jitter_bound() {
        let mut rng = SmallRng::seed_from_u64(7);
        for attempt in 1..=8u32 {
            let exp = (200u64 * 2u64.saturating_pow(attempt - 1)).min(5000);
            let delay = calculate_backoff(attempt, 200, 5000, 0.25, &mut rng).as_millis() as u64;
            assert!(delay >= exp, "attempt {}: {} < {}", attempt, delay, exp);
            assert!(
                delay <= exp + exp / 4,
                "attempt {}: {} > {}",
                attempt,
                delay,
                exp + exp / 4
            );
        }
    }

    #[test]
    fn delay_is_capped() {
        let mut rng = SmallRng::seed_from_u64(7);
        let delay = calculate_backoff(12, 200, 5000, 0.0, &mut rng);
        assert_eq!(delay.as_millis(), 5000);
    }

    #[test]
    fn zero_jitter_is_deterministic() {
        let mut rng = SmallRng::seed_from_u64(7);
        assert_eq!(calculate_backoff(1, 200, 5000, 0.0, &mut rng).as_millis(), 200);
        assert_eq!(calculate_backoff(2, 200, 5000, 0.0, &mut rng).as_millis(), 400);
        assert_eq!(calculate_backoff(3, 200, 5000, 0.0, &mut rng).as_millis(), 800);
    }

    #[test]
    fn zeroth_attempt_has_no_delay() {
        let mut rng = SmallRng::seed_from_u64(7);
        assert_eq!(calculate_backoff(0, 200, 5000, 0.25, &mut rng), Duration::ZERO);
    }
}
