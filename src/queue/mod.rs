//! The alert queue and scheduler: a bounded work channel served by a fixed
//! worker pool, a best-effort retry sub-queue with exponential backoff, and a
//! batch aggregator, torn down together on [`AlertQueue::stop`].

mod stats;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub use stats::QueueStats;

use crate::models::{Alert, QueueStatsSnapshot};
use crate::processor::AlertProcessor;

/// Capacity of the batch intake channel.
const BATCH_INTAKE_CAPACITY: usize = 100;

/// Synchronous rejection outcomes surfaced to callers of
/// [`AlertQueue::enqueue`] and [`AlertQueue::enqueue_batch`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    /// The work channel has no capacity; the caller must resubmit.
    #[error("queue is full")]
    Full,

    /// Shutdown has been signalled; no further work is accepted.
    #[error("queue is shutting down")]
    ShuttingDown,
}

/// Sizing and timing knobs for the queue.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Number of concurrent delivery workers.
    pub workers: usize,
    /// Capacity of the bounded work channel.
    pub queue_size: usize,
    /// Flush threshold of the batch aggregator.
    pub batch_size: usize,
    /// Flush interval of the batch aggregator.
    pub batch_interval: Duration,
    /// Upper bound on the exponential retry backoff.
    pub retry_max_backoff: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: 20,
            queue_size: 15_000,
            batch_size: 10,
            batch_interval: Duration::from_secs(5),
            retry_max_backoff: Duration::from_secs(300),
        }
    }
}

/// The exponential backoff before retry attempt `retries`, capped to guard
/// against unbounded sleeps for pathologically high retry limits.
///
/// The delay doubles per attempt: 2s, 4s, 8s, ...
pub fn backoff_for_attempt(retries: u32, cap: Duration) -> Duration {
    let seconds = 1u64.checked_shl(retries).map(Duration::from_secs).unwrap_or(cap);
    seconds.min(cap)
}

/// Shared state reachable from every queue task.
struct QueueCore {
    config: QueueConfig,
    processor: Arc<dyn AlertProcessor>,
    stats: QueueStats,
    cancellation_token: CancellationToken,
    work_tx: mpsc::Sender<Alert>,
    retry_tx: mpsc::Sender<Alert>,
}

impl QueueCore {
    /// Applies defaults and attempts a non-blocking submission into the work
    /// channel. Never blocks the caller.
    fn enqueue(&self, mut alert: Alert) -> Result<(), QueueError> {
        alert.normalize();

        if self.cancellation_token.is_cancelled() {
            return Err(QueueError::ShuttingDown);
        }

        match self.work_tx.try_send(alert) {
            Ok(()) => {
                self.stats.increment_size();
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(QueueError::Full),
            Err(TrySendError::Closed(_)) => Err(QueueError::ShuttingDown),
        }
    }

    /// Handles one dequeued alert: waits out its scheduled delay, delivers,
    /// and on failure schedules a retry while the limit allows.
    async fn process_alert(&self, alert: Alert, worker_id: usize) {
        let now = Utc::now();
        if alert.scheduled_at > now {
            if let Ok(delay) = (alert.scheduled_at - now).to_std() {
                tokio::time::sleep(delay).await;
            }
        }

        match self.processor.process_alert(&alert).await {
            Ok(()) => self.stats.add_processed(1),
            Err(error) => {
                tracing::warn!(worker = worker_id, alert_id = %alert.id, %error, "Failed to process alert");
                self.stats.increment_failed();

                if alert.retries < alert.max_retries {
                    self.schedule_retry(alert);
                } else {
                    tracing::warn!(
                        alert_id = %alert.id,
                        max_retries = alert.max_retries,
                        "Alert exceeded max retries"
                    );
                }
            }
        }
    }

    /// Re-schedules a failed alert with exponential backoff. Retries are
    /// best-effort: when the retry channel is full the alert is dropped.
    fn schedule_retry(&self, mut alert: Alert) {
        alert.retries += 1;
        self.stats.increment_retried();

        let backoff = backoff_for_attempt(alert.retries, self.config.retry_max_backoff);
        alert.scheduled_at = Utc::now()
            + chrono::Duration::from_std(backoff).unwrap_or_else(|_| chrono::Duration::seconds(300));

        tracing::info!(
            alert_id = %alert.id,
            retry = alert.retries,
            max_retries = alert.max_retries,
            backoff_secs = backoff.as_secs(),
            "Scheduling retry"
        );

        match self.retry_tx.try_send(alert) {
            Ok(()) => {}
            Err(TrySendError::Full(alert)) => {
                tracing::warn!(alert_id = %alert.id, "Retry queue full, dropping alert");
            }
            Err(TrySendError::Closed(alert)) => {
                tracing::debug!(alert_id = %alert.id, "Retry queue closed, dropping alert");
            }
        }
    }

    /// Delivers an accumulated batch, degrading a batch failure into
    /// individual re-submissions rather than discarding the batch.
    async fn flush_batch(&self, alerts: Vec<Alert>) {
        tracing::info!(count = alerts.len(), "Processing alert batch");

        match self.processor.process_batch(&alerts).await {
            Ok(()) => {
                self.stats.add_batched(alerts.len() as u64);
                self.stats.add_processed(alerts.len() as u64);
            }
            Err(error) => {
                tracing::warn!(%error, count = alerts.len(), "Batch processing failed, re-enqueueing individually");
                self.stats.increment_failed();

                for alert in alerts {
                    let alert_id = alert.id.clone();
                    if let Err(error) = self.enqueue(alert) {
                        tracing::warn!(alert_id = %alert_id, %error, "Failed to re-enqueue alert from batch");
                    }
                }
            }
        }
    }
}

/// Manages the queue of alerts to be delivered.
///
/// Construction via [`AlertQueue::start`] spawns the worker pool, the retry
/// worker, and the batch aggregator; [`AlertQueue::stop`] signals
/// cancellation and waits for all of them to exit.
pub struct AlertQueue {
    core: Arc<QueueCore>,
    batch_tx: mpsc::Sender<Vec<Alert>>,
    tasks: tokio::sync::Mutex<JoinSet<()>>,
}

impl AlertQueue {
    /// Creates the queue and starts its background tasks.
    pub fn start(config: QueueConfig, processor: Arc<dyn AlertProcessor>) -> Self {
        let (work_tx, work_rx) = mpsc::channel::<Alert>(config.queue_size.max(1));
        let (retry_tx, retry_rx) = mpsc::channel::<Alert>((config.queue_size / 2).max(1));
        let (batch_tx, batch_rx) = mpsc::channel::<Vec<Alert>>(BATCH_INTAKE_CAPACITY);

        let workers = config.workers.max(1);
        let core = Arc::new(QueueCore {
            config,
            processor,
            stats: QueueStats::default(),
            cancellation_token: CancellationToken::new(),
            work_tx,
            retry_tx,
        });

        tracing::info!(workers, "Starting alert queue");

        let mut tasks = JoinSet::new();
        let work_rx = Arc::new(tokio::sync::Mutex::new(work_rx));
        for worker_id in 0..workers {
            let core = Arc::clone(&core);
            let work_rx = Arc::clone(&work_rx);
            tasks.spawn(worker_loop(core, work_rx, worker_id));
        }
        tasks.spawn(retry_loop(Arc::clone(&core), retry_rx));
        tasks.spawn(batch_loop(Arc::clone(&core), batch_rx));

        Self { core, batch_tx, tasks: tokio::sync::Mutex::new(tasks) }
    }

    /// Adds an alert to the queue, applying submission-time defaults.
    ///
    /// Returns [`QueueError::Full`] immediately when the work channel has no
    /// capacity — callers must handle rejection, not wait.
    pub fn enqueue(&self, alert: Alert) -> Result<(), QueueError> {
        self.core.enqueue(alert)
    }

    /// Submits alerts for batch delivery through the aggregator.
    pub fn enqueue_batch(&self, alerts: Vec<Alert>) -> Result<(), QueueError> {
        if self.core.cancellation_token.is_cancelled() {
            return Err(QueueError::ShuttingDown);
        }

        match self.batch_tx.try_send(alerts) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(QueueError::Full),
            Err(TrySendError::Closed(_)) => Err(QueueError::ShuttingDown),
        }
    }

    /// A snapshot of the queue counters.
    pub fn stats(&self) -> QueueStatsSnapshot {
        self.core.stats.snapshot()
    }

    /// Signals cancellation and waits until every worker, the retry worker,
    /// and the batch aggregator have exited. Buffered work is drained once;
    /// the batch aggregator flushes its remainder before exiting.
    pub async fn stop(&self) {
        tracing::info!("Stopping alert queue...");
        self.core.cancellation_token.cancel();

        let mut tasks = self.tasks.lock().await;
        while tasks.join_next().await.is_some() {}
        tracing::info!("Alert queue stopped");
    }
}

impl std::fmt::Debug for AlertQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertQueue").field("stats", &self.core.stats).finish_non_exhaustive()
    }
}

/// One delivery worker: drains the work channel, honoring cancellation only
/// once the buffered items have been consumed.
async fn worker_loop(
    core: Arc<QueueCore>,
    work_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Alert>>>,
    worker_id: usize,
) {
    tracing::debug!(worker = worker_id, "Worker started");

    loop {
        let maybe_alert = {
            let mut work_rx = work_rx.lock().await;
            let received = tokio::select! {
                biased;

                maybe_alert = work_rx.recv() => Some(maybe_alert),

                _ = core.cancellation_token.cancelled() => None,
            };
            match received {
                Some(maybe_alert) => maybe_alert,
                // Cancelled: drain anything already buffered, then exit.
                None => work_rx.try_recv().ok(),
            }
        };

        let alert = match maybe_alert {
            Some(alert) => alert,
            None => break,
        };

        core.stats.decrement_size();
        core.process_alert(alert, worker_id).await;
    }

    tracing::debug!(worker = worker_id, "Worker stopped");
}

/// The retry worker: re-submits retry-scheduled alerts through the normal
/// enqueue path, so a retry can itself be rejected when the queue is full.
async fn retry_loop(core: Arc<QueueCore>, mut retry_rx: mpsc::Receiver<Alert>) {
    tracing::debug!("Retry worker started");

    loop {
        tokio::select! {
            biased;

            maybe_alert = retry_rx.recv() => match maybe_alert {
                Some(alert) => resubmit(&core, alert),
                None => break,
            },

            _ = core.cancellation_token.cancelled() => break,
        }
    }

    // Best-effort: re-submit whatever was already scheduled before the
    // shutdown signal.
    while let Ok(alert) = retry_rx.try_recv() {
        resubmit(&core, alert);
    }

    tracing::debug!("Retry worker stopped");
}

fn resubmit(core: &QueueCore, alert: Alert) {
    let alert_id = alert.id.clone();
    if let Err(error) = core.enqueue(alert) {
        tracing::warn!(alert_id = %alert_id, %error, "Failed to re-enqueue alert");
    }
}

/// The batch aggregator: accumulates batch-intake alerts and flushes on the
/// size threshold or the interval tick, whichever comes first. On shutdown
/// the remainder is flushed exactly once.
async fn batch_loop(core: Arc<QueueCore>, mut batch_rx: mpsc::Receiver<Vec<Alert>>) {
    tracing::debug!("Batch aggregator started");

    let mut ticker = tokio::time::interval(core.config.batch_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut buffer: Vec<Alert> = Vec::new();

    loop {
        tokio::select! {
            biased;

            maybe_alerts = batch_rx.recv() => match maybe_alerts {
                Some(alerts) => {
                    buffer.extend(alerts);
                    if buffer.len() >= core.config.batch_size {
                        core.flush_batch(std::mem::take(&mut buffer)).await;
                    }
                }
                None => break,
            },

            _ = core.cancellation_token.cancelled() => break,

            _ = ticker.tick() => {
                if !buffer.is_empty() {
                    core.flush_batch(std::mem::take(&mut buffer)).await;
                }
            }
        }
    }

    // Fold in anything that arrived before shutdown, then flush the
    // remainder.
    while let Ok(alerts) = batch_rx.try_recv() {
        buffer.extend(alerts);
    }
    if !buffer.is_empty() {
        core.flush_batch(buffer).await;
    }

    tracing::debug!("Batch aggregator stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let cap = Duration::from_secs(300);
        assert_eq!(backoff_for_attempt(1, cap), Duration::from_secs(2));
        assert_eq!(backoff_for_attempt(2, cap), Duration::from_secs(4));
        assert_eq!(backoff_for_attempt(3, cap), Duration::from_secs(8));
    }

    #[test]
    fn backoff_is_capped() {
        let cap = Duration::from_secs(300);
        assert_eq!(backoff_for_attempt(20, cap), cap);
        // Shift widths past the integer size saturate to the cap instead of
        // overflowing.
        assert_eq!(backoff_for_attempt(200, cap), cap);
    }
}
