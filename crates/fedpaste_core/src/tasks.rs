//! Periodic background jobs (expiry sweep, session prune).
//!
//! Each job runs on its own tokio task and fires whenever its [`Ticker`]
//! does. Production uses [`IntervalTicker`]; tests drive a [`ManualTicker`]
//! so no test waits on wall-clock intervals.

use crate::db::log::LogStore;
use crate::db::paste::PasteStore;
use async_trait::async_trait;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Source of ticks for a background job.
#[async_trait]
pub trait Ticker: Send {
    /// Wait for the next tick; `false` once the ticker can never fire again.
    async fn tick(&mut self) -> bool;
}

/// Fires every `period`, first after one full period.
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> bool {
        self.interval.tick().await;
        true
    }
}

/// Ticker advanced by hand through its [`TickHandle`].
pub struct ManualTicker {
    rx: mpsc::UnboundedReceiver<()>,
}

/// Sender side of a [`ManualTicker`].
#[derive(Clone)]
pub struct TickHandle {
    tx: mpsc::UnboundedSender<()>,
}

impl ManualTicker {
    pub fn new() -> (TickHandle, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (TickHandle { tx }, Self { rx })
    }
}

impl TickHandle {
    /// Fire one tick. Returns `false` when the ticker is gone.
    pub fn tick(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

#[async_trait]
impl Ticker for ManualTicker {
    async fn tick(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }
}

/// A running periodic job with explicit stop.
pub struct BackgroundTask {
    name: &'static str,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
    runs: watch::Receiver<u64>,
}

impl BackgroundTask {
    /// Spawn `job` to run on every tick of `ticker`.
    ///
    /// A run in progress finishes before the task observes a stop request.
    pub fn spawn<T, F, Fut>(name: &'static str, mut ticker: T, mut job: F) -> Self
    where
        T: Ticker + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let (runs_tx, runs_rx) = watch::channel(0u64);

        let handle = tokio::spawn(async move {
            tracing::info!("Background task '{}' started", name);
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    ticked = ticker.tick() => {
                        if !ticked {
                            break;
                        }
                        job().await;
                        runs_tx.send_modify(|runs| *runs += 1);
                    }
                }
            }
            tracing::info!("Background task '{}' stopped", name);
        });

        Self {
            name,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
            runs: runs_rx,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Completed runs so far.
    pub fn runs(&self) -> u64 {
        *self.runs.borrow()
    }

    /// Wait until at least `count` runs have completed.
    ///
    /// Returns `false` if the task ended first.
    pub async fn wait_for_runs(&mut self, count: u64) -> bool {
        self.runs.wait_for(|runs| *runs >= count).await.is_ok()
    }

    /// Ask the task to stop and wait for it to finish.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                tracing::error!("Background task '{}' panicked: {}", self.name, err);
            }
        }
    }
}

/// Sweep due expiries on every tick.
pub fn spawn_expiry_sweeper<T: Ticker + 'static>(
    pastes: Arc<PasteStore>,
    ticker: T,
) -> BackgroundTask {
    BackgroundTask::spawn("expiry-sweeper", ticker, move || {
        let pastes = pastes.clone();
        async move {
            match pastes.sweep_expired(Utc::now()).await {
                Ok(report) if !report.deleted.is_empty() || !report.discarded.is_empty() => {
                    tracing::info!(
                        "Expiry sweep deleted {} paste(s), dropped {} record(s)",
                        report.deleted.len(),
                        report.discarded.len()
                    );
                }
                Ok(_) => {}
                Err(err) => tracing::error!("Expiry sweep failed: {}", err),
            }
        }
    })
}

/// Prune year-old sessions on every tick.
pub fn spawn_session_pruner<T: Ticker + 'static>(logs: Arc<LogStore>, ticker: T) -> BackgroundTask {
    BackgroundTask::spawn("session-pruner", ticker, move || {
        let logs = logs.clone();
        async move {
            if let Err(err) = logs.prune_sessions(Utc::now()).await {
                tracing::error!("Session prune failed: {}", err);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[tokio::test]
    async fn manual_ticks_drive_runs_and_stop_ends_task() {
        let (handle, ticker) = ManualTicker::new();
        let counter = Arc::new(AtomicU64::new(0));
        let job_counter = counter.clone();
        let mut task = BackgroundTask::spawn("counter", ticker, move || {
            let counter = job_counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert_eq!(task.name(), "counter");
        assert_eq!(task.runs(), 0);

        assert!(handle.tick());
        assert!(handle.tick());
        assert!(task.wait_for_runs(2).await);
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        task.stop().await;
        assert!(!handle.tick(), "ticker is dropped with the task");
    }

    #[tokio::test]
    async fn task_ends_when_ticker_closes() {
        let (handle, ticker) = ManualTicker::new();
        let mut task = BackgroundTask::spawn("short-lived", ticker, || async {});
        assert!(handle.tick());
        drop(handle);
        assert!(task.wait_for_runs(1).await);
        assert!(!task.wait_for_runs(2).await);
        task.stop().await;
    }
}
