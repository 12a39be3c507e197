use chrono::{DateTime, Duration, Utc};
use log::trace;
use std::collections::HashMap;
use thiserror::Error;

/// Number of tracked keys above which expired windows are dropped.
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Error, PartialEq)]
#[error("Too many requests, try again after {retry_after}")]
pub struct RateLimited {
    pub retry_after: DateTime<Utc>,
}

#[derive(Debug)]
struct Window {
    started: DateTime<Utc>,
    count: u32,
}

/// Fixed-window request counter per key, kept in memory.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    windows: HashMap<String, Window>,
}
impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: HashMap::new(),
        }
    }
    /// Counts a request for `key` and returns how many are left in the
    /// current window.
    pub fn hit(&mut self, key: &str) -> Result<u32, RateLimited> {
        self.hit_at(key, Utc::now())
    }
    pub fn hit_at(&mut self, key: &str, now: DateTime<Utc>) -> Result<u32, RateLimited> {
        if self.windows.len() > PRUNE_THRESHOLD {
            self.prune(now);
        }
        let window = self.window;
        let entry = self.windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now >= entry.started + window {
            entry.started = now;
            entry.count = 0;
        }
        if entry.count >= self.max_requests {
            trace!("Rate limit hit for {}", key);
            return Err(RateLimited {
                retry_after: entry.started + window,
            });
        }
        entry.count += 1;
        Ok(self.max_requests - entry.count)
    }
    fn prune(&mut self, now: DateTime<Utc>) {
        let window = self.window;
        self.windows
            .retain(|_, entry| now < entry.started + window);
    }
    #[cfg(test)]
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn blocks_after_budget_and_resets() {
        let mut limiter = RateLimiter::new(3, Duration::seconds(60));
        let now = start();
        assert_eq!(limiter.hit_at("alice", now), Ok(2));
        assert_eq!(limiter.hit_at("alice", now + Duration::seconds(1)), Ok(1));
        assert_eq!(limiter.hit_at("alice", now + Duration::seconds(2)), Ok(0));
        assert_eq!(
            limiter.hit_at("alice", now + Duration::seconds(3)),
            Err(RateLimited {
                retry_after: now + Duration::seconds(60)
            })
        );
        // other keys have their own budget
        assert_eq!(limiter.hit_at("bob", now + Duration::seconds(3)), Ok(2));
        assert_eq!(limiter.hit_at("alice", now + Duration::seconds(60)), Ok(2));
    }

    #[test]
    fn zero_budget_blocks_everything() {
        let mut limiter = RateLimiter::new(0, Duration::seconds(1));
        limiter.hit_at("alice", start()).unwrap_err();
    }

    #[test]
    fn expired_windows_are_pruned() {
        let mut limiter = RateLimiter::new(1, Duration::seconds(10));
        let now = start();
        for i in 0..=PRUNE_THRESHOLD {
            limiter.hit_at(&format!("customer {}", i), now).unwrap();
        }
        assert_eq!(limiter.tracked_keys(), PRUNE_THRESHOLD + 1);
        limiter
            .hit_at("late customer", now + Duration::seconds(11))
            .unwrap();
        assert_eq!(limiter.tracked_keys(), 1);
    }
}
