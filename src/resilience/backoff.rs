//! Exponential backoff with optional jitter.

use std::time::Duration;

use rand::Rng;

/// Delay before the retry that follows failed attempt number `attempt` (1-based).
///
/// `base * 2^(attempt - 1)`, capped at `max`. With `jitter`, up to 10% of the
/// capped delay is added on top.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration, jitter: bool) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let factor = 2u32.saturating_pow(attempt - 1);
    let capped = base.saturating_mul(factor).min(max);

    if !jitter {
        return capped;
    }

    let jitter_range = capped.as_millis() as u64 / 10;
    let extra = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };
    capped + Duration::from_millis(extra)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_secs(1);
    const MAX: Duration = Duration::from_secs(30);

    #[test]
    fn test_backoff_doubles_until_cap() {
        let delays: Vec<u64> = (1..=7)
            .map(|a| calculate_backoff(a, BASE, MAX, false).as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30]);
        assert_eq!(calculate_backoff(0, BASE, MAX, false), Duration::ZERO);
        assert_eq!(calculate_backoff(200, BASE, MAX, false), MAX);
    }

    #[test]
    fn test_backoff_jitter_bounded() {
        for _ in 0..50 {
            let d = calculate_backoff(2, BASE, MAX, true);
            assert!(d >= Duration::from_secs(2));
            assert!(d < Duration::from_millis(2200));
        }
    }
}
