//! LeaseReaper - reclaims leases whose holder went away.
//!
//! Opt-in (`lease_timeout_ms`). Without it a worker that dies between
//! PENDING -> TAKEN and its conclusion leaves the record TAKEN until expiry.
//!
//! # フロー
//! 1. every `interval`, read up to `scan_limit` TAKEN records, oldest first
//! 2. conditionally move TAKEN -> PENDING those with
//!    `updated_at + lease_timeout <= now`
//! 3. a reclaimed task keeps its `created_at`, so it regains its place
//!
//! A slow but alive holder may find its conclusion rejected after a reclaim,
//! and the task may run a second time.

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::QueueConfig;
use crate::domain::{StoreError, TaskStatus};
use crate::ports::{Clock, TaskStore, Transition};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaperSettings {
    pub lease_timeout: Duration,
    pub interval: Duration,
    pub scan_limit: usize,
}

impl ReaperSettings {
    /// `None` when no lease timeout is configured.
    pub fn from_config(cfg: &QueueConfig) -> Option<Self> {
        Some(Self {
            lease_timeout: cfg.lease_timeout()?,
            interval: cfg.reap_interval(),
            scan_limit: cfg.reap_scan_limit,
        })
    }
}

pub struct LeaseReaper {
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
    settings: ReaperSettings,
}

impl LeaseReaper {
    pub fn new(store: Arc<dyn TaskStore>, clock: Arc<dyn Clock>, settings: ReaperSettings) -> Self {
        Self {
            store,
            clock,
            settings,
        }
    }

    /// One pass. Returns how many leases were reclaimed. A store failure on
    /// one record is logged and the pass goes on with the next.
    pub async fn reap_once(&self) -> Result<usize, StoreError> {
        let now = self.clock.now();
        let timeout = TimeDelta::from_std(self.settings.lease_timeout).unwrap_or(TimeDelta::MAX);
        let taken = self
            .store
            .query_oldest_first(TaskStatus::Taken, self.settings.scan_limit.max(1))
            .await?;

        let mut reclaimed = 0;
        for record in taken {
            let stale = record
                .updated_at
                .checked_add_signed(timeout)
                .is_some_and(|deadline| deadline <= now);
            if !stale {
                continue;
            }
            match self
                .store
                .transition(&record.task_id, TaskStatus::Taken, TaskStatus::Pending, now)
                .await
            {
                Ok(Transition::Applied(_)) => {
                    reclaimed += 1;
                    info!(task_id = %record.task_id, "stale lease reclaimed");
                }
                Ok(Transition::Rejected(reason)) => {
                    // concluded while we looked
                    debug!(task_id = %record.task_id, ?reason, "lease no longer stale");
                }
                Err(err) => {
                    error!(task_id = %record.task_id, error = %err, "failed to reclaim lease");
                }
            }
        }
        Ok(reclaimed)
    }

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
                _ = tokio::time::sleep(self.settings.interval) => {}
            }
            if let Err(err) = self.reap_once().await {
                warn!(error = %err, "lease reap failed");
            }
        }
        debug!("lease reaper stopped");
    }
}
