//! Supervised periodic background tasks.
//!
//! Sweepers listen on a shared [`StopSignal`] and leave their tick loop when
//! it fires. Each sweep runs on the blocking pool, so a long sweep never
//! holds a runtime worker. The owner joins each task with a bounded wait and
//! aborts any task that does not finish in time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::{self, JoinHandle};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// One-shot stop broadcast shared by the sweepers of an auth context.
///
/// Dropping the signal also stops every listener.
#[derive(Debug)]
pub struct StopSignal {
    tx: broadcast::Sender<()>,
}

impl StopSignal {
    /// Create a signal with no listeners.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Receiver handed to a new sweeper.
    #[must_use]
    pub fn listener(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Tell every sweeper to stop after its current sweep.
    pub fn fire(&self) {
        let _ = self.tx.send(());
    }

    /// Sweepers that have not yet exited.
    #[must_use]
    pub fn listeners(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a running periodic task.
#[derive(Debug)]
pub struct PeriodicTask {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// Spawn a task running `work` every `period` until `stop` fires. The
    /// first run happens one period after spawn.
    ///
    /// `work` runs on the blocking pool and is not interrupted; a stop
    /// request takes effect once the sweep in progress returns.
    pub fn spawn<F>(
        name: &'static str,
        period: Duration,
        mut stop: broadcast::Receiver<()>,
        work: F,
    ) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let work = Arc::new(work);
        let handle = tokio::spawn(async move {
            info!(task = name, period_secs = period.as_secs(), "Periodic task starting");
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        debug!(task = name, "Periodic task tick");
                        let job = Arc::clone(&work);
                        if let Err(e) = task::spawn_blocking(move || job()).await {
                            warn!(task = name, error = %e, "Periodic sweep failed");
                        }
                    }
                    _ = stop.recv() => {
                        info!(task = name, "Periodic task stopping");
                        break;
                    }
                }
            }
        });

        Self { name, handle }
    }
    /// Task name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait up to `timeout` for the task to exit, aborting it otherwise.
    ///
    /// Returns `true` if the task exited on its own.
    pub async fn join(mut self, timeout: Duration) -> bool {
        match time::timeout(timeout, &mut self.handle).await {
            Ok(Ok(())) => {
                debug!(task = self.name, "Periodic task joined");
                true
            }
            Ok(Err(e)) => {
                warn!(task = self.name, error = %e, "Periodic task ended abnormally");
                false
            }
            Err(_) => {
                warn!(
                    task = self.name,
                    timeout_ms = timeout.as_millis(),
                    "Periodic task did not stop in time, aborting"
                );
                self.handle.abort();
                false
            }
        }
    }
}
