use crate::services::staging::ScratchSpace;
use tokio::sync::watch;
use tokio::time::{Duration, sleep};

/// Periodically removes scratch files orphaned by a process that died
/// mid-request, which in-process cleanup can never reach.
pub struct ScratchJanitor {
    scratch: ScratchSpace,
    max_age: Duration,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl ScratchJanitor {
    pub fn new(
        scratch: ScratchSpace,
        max_age: Duration,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            scratch,
            max_age,
            interval,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(
            "🧹 Scratch janitor started (max age {:?}, every {:?})",
            self.max_age,
            self.interval
        );

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("🛑 Scratch janitor shutting down");
                    break;
                }
                _ = sleep(self.interval) => {
                    self.sweep().await;
                }
            }
        }
    }

    /// One sweep pass. Also called once at startup.
    pub async fn sweep(&self) -> usize {
        match self.scratch.sweep_stale(self.max_age).await {
            Ok(0) => 0,
            Ok(removed) => {
                tracing::info!(
                    "Removed {} stale artifact(s) from {}",
                    removed,
                    self.scratch.dir().display()
                );
                removed
            }
            Err(e) => {
                tracing::error!(
                    "Failed to sweep scratch dir {}: {}",
                    self.scratch.dir().display(),
                    e
                );
                0
            }
        }
    }
}
