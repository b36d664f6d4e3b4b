//! Fixed-window counters for outbound send ceilings.
//!
//! Sender implementations enforce two independent ceilings: one per bot
//! credential and one per destination channel. Both reuse the same lazy
//! roll-forward scheme as the intake throttle: a window is never
//! pre-scheduled, it advances when a check happens after it elapsed.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::models::DeliveryRoute;

/// A fixed-window counter keyed by an opaque string.
#[derive(Debug)]
struct WindowCounter {
    count: u32,
    window_end: DateTime<Utc>,
}

/// A set of per-key fixed-window counters sharing one (window, ceiling)
/// shape.
#[derive(Debug)]
pub struct KeyedWindowLimiter {
    counters: DashMap<String, Arc<Mutex<WindowCounter>>>,
    window: chrono::Duration,
    ceiling: u32,
}

impl KeyedWindowLimiter {
    /// Creates a limiter allowing `ceiling` acquisitions per `window` for
    /// each distinct key.
    pub fn new(ceiling: u32, window: Duration) -> Self {
        Self {
            counters: DashMap::new(),
            window: chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX),
            ceiling,
        }
    }

    /// Consumes one slot for `key` when the window has capacity.
    pub fn try_acquire(&self, key: &str) -> bool {
        let now = Utc::now();
        let counter = self
            .counters
            .entry(key.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(WindowCounter { count: 0, window_end: now + self.window }))
            })
            .clone();

        let mut counter = counter.lock().unwrap_or_else(PoisonError::into_inner);
        if now > counter.window_end {
            counter.count = 0;
            counter.window_end = now + self.window;
        }

        if counter.count >= self.ceiling {
            return false;
        }
        counter.count += 1;
        true
    }
}

/// The pair of outbound ceilings a sender must respect: per bot credential
/// and per destination channel.
#[derive(Debug)]
pub struct SendLimiterSet {
    per_bot: KeyedWindowLimiter,
    per_channel: KeyedWindowLimiter,
}

impl SendLimiterSet {
    /// Creates the limiter set with the platform's reference ceilings:
    /// 30 sends per second per bot credential, 60 sends per minute per
    /// destination channel.
    pub fn new() -> Self {
        Self {
            per_bot: KeyedWindowLimiter::new(30, Duration::from_secs(1)),
            per_channel: KeyedWindowLimiter::new(60, Duration::from_secs(60)),
        }
    }

    /// Checks both ceilings for a route, consuming a slot from each.
    ///
    /// A send blocked at either level leaves the other counter incremented;
    /// the windows are short enough that this is acceptable slack.
    pub fn try_acquire(&self, route: &DeliveryRoute) -> bool {
        self.per_bot.try_acquire(&route.bot_token) && self.per_channel.try_acquire(&route.channel_id)
    }
}

impl Default for SendLimiterSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_limited_independently() {
        let limiter = KeyedWindowLimiter::new(2, Duration::from_secs(60));

        assert!(limiter.try_acquire("bot-a"));
        assert!(limiter.try_acquire("bot-a"));
        assert!(!limiter.try_acquire("bot-a"));
        assert!(limiter.try_acquire("bot-b"));
    }

    #[test]
    fn window_resets_after_elapsing() {
        let limiter = KeyedWindowLimiter::new(1, Duration::ZERO);

        assert!(limiter.try_acquire("bot-a"));
        std::thread::sleep(Duration::from_millis(2));
        assert!(limiter.try_acquire("bot-a"));
    }

    #[test]
    fn route_checks_both_ceilings() {
        let set = SendLimiterSet {
            per_bot: KeyedWindowLimiter::new(1, Duration::from_secs(60)),
            per_channel: KeyedWindowLimiter::new(10, Duration::from_secs(60)),
        };
        let route = DeliveryRoute {
            bot_token: "token".to_string(),
            channel_id: "chan".to_string(),
            channel_ref: None,
        };

        assert!(set.try_acquire(&route));
        assert!(!set.try_acquire(&route));
    }
}
