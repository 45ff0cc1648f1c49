//! ExpirySweeper - physically removes expired records.
//!
//! Expired records are already invisible to every read and transition; the
//! sweeper only reclaims their memory.
//!
//! # フロー
//! 1. every `interval`, call `TaskStore::purge_expired(now)`
//! 2. log how many records went away

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::domain::StoreError;
use crate::ports::{Clock, TaskStore};

pub struct ExpirySweeper {
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(store: Arc<dyn TaskStore>, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            store,
            clock,
            interval,
        }
    }

    pub async fn sweep_once(&self) -> Result<usize, StoreError> {
        let purged = self.store.purge_expired(self.clock.now()).await?;
        if purged > 0 {
            info!(purged, "expired tasks purged");
        } else {
            debug!("nothing to purge");
        }
        Ok(purged)
    }

    /// Sweep until `shutdown` flips to true. Store failures are logged and
    /// the next tick tries again.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => match changed {
                    Ok(()) => continue,
                    Err(_) => break,
                },
                _ = tokio::time::sleep(self.interval) => {}
            }
            if let Err(err) = self.sweep_once().await {
                warn!(error = %err, "expiry sweep failed");
            }
        }
        debug!("expiry sweeper stopped");
    }
}
