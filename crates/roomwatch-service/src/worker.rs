//! Background reconciliation worker.

use std::sync::Arc;

use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use roomwatch_core::{Reconciler, TickReport};

use crate::repository::StoreRepository;
use crate::state::{AppState, LiveStateEvent};

/// Background worker that reconciles every room on a fixed tick.
pub struct Worker {
    state: Arc<AppState>,
    reconciler: Reconciler,
}

impl Worker {
    /// Create a worker over the state's SQLite store.
    pub async fn new(state: Arc<AppState>) -> Self {
        let timeout = state.config.read().await.worker.store_timeout();
        let repository = Arc::new(StoreRepository::new(Arc::clone(&state.store), timeout));
        let reconciler = Reconciler::new(repository.clone(), repository);
        Self::with_reconciler(state, reconciler)
    }

    /// Create a worker over any repository pair.
    pub fn with_reconciler(state: Arc<AppState>, reconciler: Reconciler) -> Self {
        Self { state, reconciler }
    }

    /// Start the tick loop.
    ///
    /// Returns immediately; the loop runs until the worker state is
    /// signalled to stop. The first tick fires right away.
    pub async fn start(self) -> JoinHandle<()> {
        let tick_interval = self.state.config.read().await.worker.tick_interval();
        self.state.worker.reset_stop();
        let cancel = self.state.worker.cancel_token();
        self.state.worker.set_running(true);

        info!("Starting worker (tick every {:?})", tick_interval);

        tokio::spawn(async move {
            let mut ticker = interval(tick_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut consecutive_failures = 0u32;

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                self.tick(&cancel, &mut consecutive_failures).await;
            }

            self.state.worker.set_running(false);
            info!("Worker stopped");
        })
    }

    /// Run a single tick and record its outcome.
    async fn tick(&self, cancel: &CancellationToken, consecutive_failures: &mut u32) {
        match self.reconciler.run_tick(cancel).await {
            Ok(report) => {
                *consecutive_failures = 0;
                self.publish(&report);
                self.record_success(&report).await;
            }
            Err(e) => {
                *consecutive_failures += 1;
                if *consecutive_failures <= 3 {
                    warn!("Tick failed: {} (attempt {})", e, consecutive_failures);
                } else if *consecutive_failures == 4 {
                    error!(
                        "Tick failed {} times in a row, will continue trying silently",
                        consecutive_failures
                    );
                }
                self.record_failure(e.to_string()).await;
            }
        }
    }

    fn publish(&self, report: &TickReport) {
        for update in &report.updated {
            // No subscribers is fine
            let _ = self.state.events_tx.send(LiveStateEvent::from(update));
        }
    }

    async fn record_success(&self, report: &TickReport) {
        if !report.updated.is_empty() || !report.failed.is_empty() {
            debug!(
                "Tick: {} updated, {} skipped, {} failed",
                report.updated.len(),
                report.skipped,
                report.failed.len()
            );
        }

        let mut stats = self.state.worker.stats.write().await;
        stats.ticks += 1;
        stats.rooms_updated += report.updated.len() as u64;
        stats.room_failures += report.failed.len() as u64;
        stats.last_tick_at = Some(OffsetDateTime::now_utc());
        if let Some(failure) = report.failed.last() {
            stats.last_error = Some(format!("room {}: {}", failure.room, failure.error));
        }
    }

    async fn record_failure(&self, message: String) {
        let mut stats = self.state.worker.stats.write().await;
        stats.failed_ticks += 1;
        stats.last_error = Some(message);
    }
}
