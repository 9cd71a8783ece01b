// src/scheduler.rs
use crate::pipeline::{CycleError, CycleRunner};
use metrics::gauge;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    Once,
    /// Sleep this long after each cycle completes.
    Every(Duration),
}

/// Requests a stop. Takes effect between cycles, or right away while the
/// scheduler is sleeping.
#[derive(Clone, Debug)]
pub struct StopHandle(Arc<watch::Sender<bool>>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.send_replace(true);
    }
}

pub struct Scheduler {
    mode: RunMode,
    stop: watch::Receiver<bool>,
}

impl Scheduler {
    pub fn new(mode: RunMode) -> (Self, StopHandle) {
        let (tx, rx) = watch::channel(false);
        (Self { mode, stop: rx }, StopHandle(Arc::new(tx)))
    }

    fn stop_requested(&self) -> bool {
        *self.stop.borrow()
    }

    /// Drives cycles until the mode is exhausted or a stop is requested.
    /// Returns the number of completed cycles. A cycle error is logged and
    /// returned as is; no further cycle runs.
    pub async fn run<R: CycleRunner>(&mut self, runner: &mut R) -> Result<u64, CycleError> {
        let mut completed = 0u64;
        loop {
            if self.stop_requested() {
                tracing::info!(completed, "stop requested, leaving scheduler");
                break;
            }

            if let Err(e) = runner.run_cycle().await {
                tracing::error!(error = %e, completed, "cycle failed, stopping");
                return Err(e);
            }
            completed += 1;
            gauge!("scheduler_cycles_completed").set(completed as f64);

            let interval = match self.mode {
                RunMode::Once => break,
                RunMode::Every(d) => d,
            };

            tracing::debug!(?interval, "sleeping until next cycle");
            let stop = &mut self.stop;
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = wait_for_stop(stop) => {
                    tracing::info!(completed, "stop requested during sleep");
                    break;
                }
            }
        }
        Ok(completed)
    }
}

async fn wait_for_stop(rx: &mut watch::Receiver<bool>) {
    // A dropped handle can never request a stop.
    if rx.wait_for(|s| *s).await.is_err() {
        std::future::pending::<()>().await;
    }
}
