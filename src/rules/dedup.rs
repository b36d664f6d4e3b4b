//! Content-addressed cache suppressing repeated alerts within a time window.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use crate::models::Alert;

/// Width of the truncated content hash used as the cache key.
const KEY_WIDTH: usize = 16;

/// A derived deduplication key: the truncated hash of an alert's owner and
/// message text.
type DedupKey = [u8; KEY_WIDTH];

/// Tracks recently seen (owner, message) pairs so identical alerts submitted
/// within the window can be suppressed.
///
/// Entries older than the window are treated as absent on lookup; only the
/// periodic sweep actually removes them.
#[derive(Debug)]
pub struct DeduplicationCache {
    seen: DashMap<DedupKey, DateTime<Utc>>,
    window: chrono::Duration,
}

impl DeduplicationCache {
    /// Creates a cache with the given suppression window.
    pub fn new(window: Duration) -> Self {
        Self {
            seen: DashMap::new(),
            window: chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX),
        }
    }

    /// Checks whether an alert repeats a recent one, recording this
    /// occurrence when it does not.
    ///
    /// A hit inside the window returns `true` without refreshing the entry,
    /// so a steady stream of duplicates is suppressed until the first
    /// occurrence ages out.
    pub fn is_duplicate(&self, alert: &Alert) -> bool {
        let key = Self::derive_key(alert.owner_id, &alert.payload.message);
        let now = Utc::now();

        match self.seen.entry(key) {
            Entry::Occupied(mut entry) => {
                if now.signed_duration_since(*entry.get()) < self.window {
                    return true;
                }
                entry.insert(now);
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                false
            }
        }
    }

    /// Removes every entry whose age exceeds the window.
    pub fn sweep_expired(&self) {
        let now = Utc::now();
        let before = self.seen.len();
        self.seen.retain(|_, last_seen| now.signed_duration_since(*last_seen) <= self.window);
        let removed = before.saturating_sub(self.seen.len());
        if removed > 0 {
            tracing::debug!(removed, remaining = self.seen.len(), "Swept expired dedup entries");
        }
    }

    /// Runs the periodic sweep until the cancellation token fires. Spawned as
    /// a long-running task alongside the rest of the pipeline.
    pub async fn run_sweeper(&self, interval: Duration, cancellation_token: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately; skip it so the initial sweep
        // happens one full interval after startup.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = cancellation_token.cancelled() => {
                    tracing::debug!("Dedup sweeper received shutdown signal");
                    break;
                }

                _ = ticker.tick() => self.sweep_expired(),
            }
        }
    }

    /// Number of entries currently held, including not-yet-swept stale ones.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn derive_key(owner_id: i64, message: &str) -> DedupKey {
        let mut hasher = Sha256::new();
        hasher.update(owner_id.to_be_bytes());
        hasher.update(b":");
        hasher.update(message.as_bytes());
        let digest = hasher.finalize();

        let mut key = [0u8; KEY_WIDTH];
        key.copy_from_slice(&digest[..KEY_WIDTH]);
        key
    }
}
