//! Periodic sweep over every registered exchange.
//!
//! A sweep refreshes all exchanges concurrently and waits for all of them. A
//! sweep that is triggered while another is still running is skipped, not
//! queued. The timer fires on a crossbeam `tick` channel and hands each sweep
//! to its own thread so a slow sweep never delays the timer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Sender, select, tick, unbounded};
use log::{error, info, warn};

use crate::coordinator::RefreshCoordinator;

/// Aggregate result of one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Exchanges refreshed successfully.
    pub succeeded: usize,
    /// Exchanges swept.
    pub total: usize,
}

/// Runs sweeps and owns the running flag.
pub struct RefreshScheduler {
    coordinator: Arc<RefreshCoordinator>,
    sweeping: AtomicBool,
}

impl RefreshScheduler {
    /// Creates a scheduler driving `coordinator`.
    pub fn new(coordinator: Arc<RefreshCoordinator>) -> Self {
        Self {
            coordinator,
            sweeping: AtomicBool::new(false),
        }
    }

    /// Whether a sweep is currently running.
    pub fn is_sweeping(&self) -> bool {
        self.sweeping.load(Ordering::SeqCst)
    }

    /// Refreshes every registered exchange concurrently.
    ///
    /// Returns `None` without doing anything when a sweep is already running.
    pub fn sweep_all(&self) -> Option<SweepReport> {
        if self
            .sweeping
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!("Update already in progress, skipping...");
            return None;
        }
        let _running = SweepFlag(&self.sweeping);

        let exchanges = self.coordinator.store().keys();
        info!("Starting symbol update for {} exchanges...", exchanges.len());

        let succeeded = thread::scope(|scope| {
            let handles: Vec<_> = exchanges
                .iter()
                .map(|exchange| {
                    let coordinator = &self.coordinator;
                    (exchange, scope.spawn(move || coordinator.refresh(exchange)))
                })
                .collect();

            handles
                .into_iter()
                .map(|(exchange, handle)| match handle.join() {
                    Ok(ok) => ok,
                    Err(_) => {
                        error!("[{}] Refresh thread panicked", exchange);
                        false
                    }
                })
                .filter(|ok| *ok)
                .count()
        });

        let report = SweepReport {
            succeeded,
            total: exchanges.len(),
        };
        info!(
            "Update completed. Success: {}/{}",
            report.succeeded, report.total
        );
        Some(report)
    }

    /// Starts the periodic timer. The first tick fires after `interval`.
    pub fn start(self: &Arc<Self>, interval: Duration) -> SweepTimer {
        let (stop_tx, stop_rx) = unbounded::<()>();
        let scheduler = Arc::clone(self);

        let handle = thread::spawn(move || {
            let ticker = tick(interval);
            info!("Refresh timer started ({:?} interval)", interval);
            loop {
                select! {
                    recv(stop_rx) -> _ => break,
                    recv(ticker) -> _ => {
                        let scheduler = Arc::clone(&scheduler);
                        let spawned = thread::Builder::new()
                            .name("sweep".into())
                            .spawn(move || {
                                scheduler.sweep_all();
                            });
                        if let Err(e) = spawned {
                            warn!("Failed to spawn sweep thread: {}", e);
                        }
                    },
                }
            }
            info!("Refresh timer stopped");
        });

        SweepTimer {
            stop_tx,
            handle: Some(handle),
        }
    }
}

/// Clears the running flag when a sweep ends, however it ends.
struct SweepFlag<'a>(&'a AtomicBool);

impl Drop for SweepFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Handle to the periodic timer thread.
pub struct SweepTimer {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl SweepTimer {
    /// Cancels the timer and waits for its thread. Sweeps already running are
    /// left to finish on their own.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Refresh timer thread panicked");
            }
        }
    }
}

impl Drop for SweepTimer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
