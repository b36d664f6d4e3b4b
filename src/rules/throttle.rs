//! Per-owner fixed-window throttling with priority-derived ceilings.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::models::Priority;

/// Length of a throttle window.
const WINDOW: chrono::Duration = chrono::Duration::minutes(1);

/// A fixed-window counter for a single owner.
///
/// The window is not pre-scheduled: it rolls forward lazily when a check
/// happens after the window end. The ceiling is fixed when the counter is
/// created, so the first priority seen for an owner sizes that owner's
/// counter for its lifetime.
#[derive(Debug)]
struct ThrottleCounter {
    count: u32,
    window_end: DateTime<Utc>,
    ceiling: u32,
}

impl ThrottleCounter {
    fn new(priority: Priority) -> Self {
        Self {
            count: 0,
            window_end: Utc::now() + WINDOW,
            ceiling: priority.throttle_ceiling(),
        }
    }

    /// Rolls the window forward when elapsed, then tests and increments.
    fn try_acquire(&mut self) -> bool {
        let now = Utc::now();
        if now > self.window_end {
            self.count = 0;
            self.window_end = now + WINDOW;
        }

        if self.count >= self.ceiling {
            return false;
        }
        self.count += 1;
        true
    }
}

/// Tracks alert rates per owner.
///
/// Each owner gets an independently locked counter, so throttling different
/// owners never contends.
#[derive(Debug, Default)]
pub struct ThrottleManager {
    counters: DashMap<i64, Arc<Mutex<ThrottleCounter>>>,
}

impl ThrottleManager {
    /// Creates an empty throttle manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks whether an alert from `owner_id` is within the owner's rate
    /// ceiling, consuming one slot when it is.
    pub fn allow(&self, owner_id: i64, priority: Priority) -> bool {
        let counter = self
            .counters
            .entry(owner_id)
            .or_insert_with(|| Arc::new(Mutex::new(ThrottleCounter::new(priority))))
            .clone();

        let mut counter = counter.lock().unwrap_or_else(PoisonError::into_inner);
        counter.try_acquire()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_the_ceiling_and_rejects_the_next() {
        let manager = ThrottleManager::new();
        let ceiling = Priority::Low.throttle_ceiling();

        for _ in 0..ceiling {
            assert!(manager.allow(7, Priority::Low));
        }
        assert!(!manager.allow(7, Priority::Low));
    }

    #[test]
    fn owners_are_throttled_independently() {
        let manager = ThrottleManager::new();
        let ceiling = Priority::Low.throttle_ceiling();

        for _ in 0..ceiling {
            assert!(manager.allow(1, Priority::Low));
        }
        assert!(!manager.allow(1, Priority::Low));
        assert!(manager.allow(2, Priority::Low));
    }

    #[test]
    fn ceiling_fixed_at_counter_creation() {
        let manager = ThrottleManager::new();
        let low_ceiling = Priority::Low.throttle_ceiling();

        // The first call creates the counter sized for Low; a later urgent
        // alert from the same owner does not resize it.
        for _ in 0..low_ceiling {
            assert!(manager.allow(3, Priority::Low));
        }
        assert!(!manager.allow(3, Priority::Urgent));
    }

    #[test]
    fn window_rolls_forward_on_access() {
        let mut counter = ThrottleCounter::new(Priority::Low);
        counter.count = counter.ceiling;
        assert!(!counter.try_acquire());

        // Simulate the window having elapsed; the next check resets the
        // count and advances the window end.
        counter.window_end = Utc::now() - chrono::Duration::seconds(1);
        assert!(counter.try_acquire());
        assert_eq!(counter.count, 1);
        assert!(counter.window_end > Utc::now());
    }
}
