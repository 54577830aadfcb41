//! Periodic driver for the trash reaper.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tracing::{error, info};

use homedrive_core::config::ReaperConfig;

use crate::reaper::TrashReaper;

/// Runs the reaper on a fixed interval until cancelled.
#[derive(Debug)]
pub struct ReaperRunner {
    reaper: Arc<TrashReaper>,
    config: ReaperConfig,
}

impl ReaperRunner {
    pub fn new(reaper: Arc<TrashReaper>, config: ReaperConfig) -> Self {
        Self { reaper, config }
    }

    /// Sweep immediately, then on every interval tick, until the
    /// cancel signal flips to `true`.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        if !self.config.enabled {
            info!("Reaper disabled by configuration");
            return;
        }

        info!(
            interval_seconds = self.config.interval_seconds,
            retention_days = self.config.retention_days,
            "Reaper started"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_seconds));

        loop {
            tokio::select! {
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        info!("Reaper received shutdown signal");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.reaper.sweep().await {
                        error!(error = %e, "Reaper sweep failed");
                    }
                }
            }
        }

        info!("Reaper shut down");
    }
}
