//! Timed background sweep of the outbox.

use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::lock::DistributedLock;

use super::mediator::OutboxProducerMediator;

const SWEEPER_LOCK_RESOURCE: &str = "outbox-sweeper";

/// Sweep cadence and row selection.
#[derive(Clone, Debug)]
pub struct SweeperConfig {
    /// Pause between sweep ticks.
    pub timer_interval: Duration,
    /// Rows younger than this are left for an explicit clear to handle,
    /// avoiding double sends racing a caller's own post.
    pub minimum_message_age: Duration,
    /// Max rows cleared per tick.
    pub batch_size: usize,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            timer_interval: Duration::from_secs(5),
            minimum_message_age: Duration::from_secs(5),
            batch_size: 100,
        }
    }
}

/// Statistics from the sweeper thread.
#[derive(Debug, Default, Clone)]
pub struct SweeperStats {
    pub sweeps: usize,
    pub cleared: usize,
    pub failed: usize,
    /// Ticks skipped because the distributed lock was held elsewhere.
    pub lock_misses: usize,
}

/// A background thread that re-drives undispatched outbox rows.
///
/// Every tick it advances the circuit breaker one cooldown step and clears
/// outstanding rows through the mediator. Broker downtime is not an error:
/// failed rows stay pending and the next tick retries them.
///
/// ## Example
///
/// ```ignore
/// let sweeper = OutboxSweeper::spawn(mediator.clone(), SweeperConfig::default());
/// // ... run ...
/// let stats = sweeper.stop();
/// println!("swept {} times, cleared {}", stats.sweeps, stats.cleared);
/// ```
pub struct OutboxSweeper {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<SweeperStats>>,
}

impl OutboxSweeper {
    /// Spawn a sweeper with no cross-process coordination.
    pub fn spawn(mediator: Arc<OutboxProducerMediator>, config: SweeperConfig) -> Self {
        Self::spawn_inner(mediator, config, None)
    }

    /// Spawn a sweeper guarded by a distributed lock.
    ///
    /// When several processes each run a sweeper over the same outbox, only
    /// the one holding the lock sweeps; the others skip the tick.
    pub fn spawn_with_lock(
        mediator: Arc<OutboxProducerMediator>,
        config: SweeperConfig,
        lock: Arc<dyn DistributedLock>,
    ) -> Self {
        Self::spawn_inner(mediator, config, Some(lock))
    }

    fn spawn_inner(
        mediator: Arc<OutboxProducerMediator>,
        config: SweeperConfig,
        lock: Option<Arc<dyn DistributedLock>>,
    ) -> Self {
        let (stop_tx, stop_rx) = channel();

        let handle = thread::spawn(move || {
            let mut stats = SweeperStats::default();

            loop {
                match stop_rx.recv_timeout(config.timer_interval) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                }

                let token = match &lock {
                    Some(lock) => match lock.obtain_lock(SWEEPER_LOCK_RESOURCE) {
                        Ok(Some(token)) => Some(token),
                        Ok(None) => {
                            stats.lock_misses += 1;
                            continue;
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "sweeper lock error, skipping tick");
                            stats.lock_misses += 1;
                            continue;
                        }
                    },
                    None => None,
                };

                stats.sweeps += 1;
                mediator.cool_down();

                match mediator.clear_outstanding(config.minimum_message_age, config.batch_size) {
                    Ok(report) => {
                        stats.cleared += report.cleared;
                        stats.failed += report.failed;
                        if report.cleared > 0 || report.failed > 0 {
                            tracing::debug!(
                                cleared = report.cleared,
                                failed = report.failed,
                                "sweep tick"
                            );
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "sweep failed, will retry next tick");
                    }
                }

                if let (Some(lock), Some(token)) = (&lock, token) {
                    if let Err(err) = lock.release_lock(SWEEPER_LOCK_RESOURCE, &token) {
                        tracing::warn!(error = %err, "failed to release sweeper lock");
                    }
                }
            }

            stats
        });

        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Signal the sweeper to stop and wait for it to finish.
    pub fn stop(mut self) -> SweeperStats {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap_or_default()
        } else {
            SweeperStats::default()
        }
    }

    /// Signal the sweeper to stop without waiting.
    pub fn signal_stop(&self) {
        let _ = self.stop_tx.send(());
    }
}

impl Drop for OutboxSweeper {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
        // Don't join on drop - let the thread finish naturally
    }
}
