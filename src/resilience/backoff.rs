//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Delay before retry number `retry` (1-based).
///
/// Doubles from `base` per retry, capped at `max`, then shaved by up to 10%
/// of jitter so callers retrying together spread out. Never exceeds `max`.
pub fn calculate_backoff(retry: u32, base: Duration, max: Duration) -> Duration {
    if retry == 0 {
        return Duration::ZERO;
    }

    let factor = 2u32.saturating_pow(retry - 1);
    let capped = base.saturating_mul(factor).min(max);

    let jitter_range = capped.as_millis() as u64 / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..=jitter_range)
    } else {
        0
    };

    capped.saturating_sub(Duration::from_millis(jitter))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_millis(100);
    const MAX: Duration = Duration::from_millis(1000);

    #[test]
    fn test_backoff_doubles_within_jitter() {
        assert_eq!(calculate_backoff(0, BASE, MAX), Duration::ZERO);

        let first = calculate_backoff(1, BASE, MAX).as_millis();
        assert!((90..=100).contains(&first), "{first}");

        let second = calculate_backoff(2, BASE, MAX).as_millis();
        assert!((180..=200).contains(&second), "{second}");
    }

    #[test]
    fn test_backoff_is_capped() {
        for retry in [5, 10, 40, u32::MAX] {
            let delay = calculate_backoff(retry, BASE, MAX);
            assert!(delay <= MAX);
            assert!(delay >= Duration::from_millis(900));
        }
    }
}
