//! Consecutive-error backoff ladder (spec.md §4.2 "Error handling"): delay
//! grows with consecutive failures and is jittered so that many sources
//! failing at once don't retry in lockstep.

use std::time::Duration;

use rand::Rng;

const LADDER: [Duration; 6] = [
    Duration::from_secs(1),
    Duration::from_secs(10),
    Duration::from_secs(60),
    Duration::from_secs(10 * 60),
    Duration::from_secs(3600),
    Duration::from_secs(24 * 3600),
];

/// `error_count` is the number of consecutive failures *before* this one
/// (0 on the first failure). The ladder caps out at its last rung.
pub fn next_delay(error_count: u32) -> Duration {
    let base = LADDER[(error_count as usize).min(LADDER.len() - 1)];
    jitter(base)
}

/// +/- 5% jitter so retries don't synchronize across many failing sources.
fn jitter(base: Duration) -> Duration {
    let spread = base.as_secs_f64() * 0.05;
    let offset = rand::rng().random_range(-spread..=spread);
    Duration::from_secs_f64((base.as_secs_f64() + offset).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_increases_with_error_count() {
        for i in 0..LADDER.len() - 1 {
            assert!(next_delay(i as u32) < next_delay(i as u32 + 1) + Duration::from_secs(1));
        }
    }

    #[test]
    fn delay_caps_at_last_rung_for_large_error_counts() {
        let capped = next_delay(1000).as_secs_f64();
        let last_rung = LADDER[LADDER.len() - 1].as_secs_f64();
        assert!((capped - last_rung).abs() <= last_rung * 0.05 + 1.0);
    }

    #[test]
    fn jitter_stays_within_five_percent_of_base() {
        let base = Duration::from_secs(60);
        for _ in 0..20 {
            let delay = jitter(base).as_secs_f64();
            assert!(delay >= 57.0 && delay <= 63.0);
        }
    }
}
