//! Global per-remote-address rate limiter for the auth endpoints
//! (spec.md §5 "Shared-resource policy", §6 registration rate limiting).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const SWEEP_THRESHOLD: usize = 1000;
const SWEEP_MIN_INTERVAL: Duration = Duration::from_secs(10);

struct Inner {
    next_allowed: HashMap<String, Instant>,
    last_sweep: Instant,
}

/// `remote-address -> next-allowed-time` map with lazy cleanup.
pub struct RateLimiter {
    delay: Duration,
    inner: Mutex<Inner>,
}

impl RateLimiter {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            inner: Mutex::new(Inner {
                next_allowed: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    /// Returns `true` if `addr` may proceed now, recording its next-allowed
    /// time as `now + delay`. Sweeps expired entries once the map grows past
    /// `SWEEP_THRESHOLD` and at least `SWEEP_MIN_INTERVAL` has elapsed since
    /// the last sweep.
    pub fn check(&self, addr: &str) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.lock().unwrap();

        if inner.next_allowed.len() > SWEEP_THRESHOLD && now.duration_since(inner.last_sweep) >= SWEEP_MIN_INTERVAL {
            inner.next_allowed.retain(|_, t| *t > now);
            inner.last_sweep = now;
        }

        match inner.next_allowed.get(addr) {
            Some(next) if *next > now => false,
            _ => {
                inner.next_allowed.insert(addr.to_string(), now + self.delay);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_request_always_allowed() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        assert!(limiter.check("1.2.3.4"));
    }

    #[test]
    fn second_request_within_delay_is_blocked() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        assert!(limiter.check("1.2.3.4"));
        assert!(!limiter.check("1.2.3.4"));
    }

    #[test]
    fn distinct_addresses_are_independent() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        assert!(limiter.check("1.2.3.4"));
        assert!(limiter.check("5.6.7.8"));
    }

    #[test]
    fn request_allowed_again_after_delay_elapses() {
        let limiter = RateLimiter::new(Duration::from_millis(10));
        assert!(limiter.check("1.2.3.4"));
        std::thread::sleep(Duration::from_millis(20));
        assert!(limiter.check("1.2.3.4"));
    }
}
