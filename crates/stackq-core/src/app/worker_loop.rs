//! WorkerLoop - one bounded activation of the queue worker.
//!
//! # フロー
//! 1. `BatchSelector::next_batch()`: PENDING, newest first. Empty -> IdleExit.
//! 2. Every task of the batch concurrently, task `i` delayed by
//!    `i * task_stagger`: `lease::acquire` -> `TaskRunner::run` ->
//!    `Lease::conclude`.
//! 3. Wait until the whole batch has settled. No task straddles two batches.
//! 4. Budget exceeded: TimeExit with one hand-off signal if PENDING work is
//!    left, IdleExit otherwise.
//! 5. No PENDING work left: IdleExit. Otherwise sleep `inter_batch_delay`
//!    and go back to 1.
//!
//! The loop assumes it is the only activation pacing the downstream (the
//! invoker runs at most one at a time). Correctness does not depend on that:
//! overlapping activations are kept apart by the lease protocol.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::join_all;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use super::batch::BatchSelector;
use super::invoker::Activation;
use super::lease;
use crate::config::QueueConfig;
use crate::domain::{RunOutcome, TaskId, TaskRecord, TriggerSignal};
use crate::error::EngineError;
use crate::ports::{Clock, SignalTransport, TaskRunner, TaskStore, Transition};

/// Pacing knobs of one activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    pub page_limit: usize,
    pub active_budget: Duration,
    pub inter_batch_delay: Duration,
    pub task_stagger: Duration,
}

impl From<&QueueConfig> for WorkerSettings {
    fn from(cfg: &QueueConfig) -> Self {
        Self {
            page_limit: cfg.page_limit,
            active_budget: cfg.active_budget(),
            inter_batch_delay: cfg.inter_batch_delay(),
            task_stagger: cfg.task_stagger(),
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self::from(&QueueConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    /// Selecting, deciding or waiting between batches.
    Running,

    /// A batch is in flight.
    DrainingBatch,

    /// Nothing left to do. No hand-off.
    IdleExit,

    /// Budget used up with work remaining. Hand-off published.
    TimeExit,
}

/// How one task of a batch ended, from the worker's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskDisposition {
    /// Somebody else owns it, or it is gone.
    Skipped,

    /// The store failed while leasing.
    LeaseFailed,

    Concluded(RunOutcome),

    /// The run happened but the record changed under us (e.g. expiry).
    ConclusionRejected(RunOutcome),

    /// The run happened but the store failed while concluding.
    ConclusionFailed(RunOutcome),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskTally {
    pub leased: usize,
    pub skipped: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub requeued: usize,
    pub rejected: usize,
    pub errors: usize,
}

impl TaskTally {
    fn record(&mut self, disposition: TaskDisposition) {
        match disposition {
            TaskDisposition::Skipped => self.skipped += 1,
            TaskDisposition::LeaseFailed => self.errors += 1,
            TaskDisposition::Concluded(outcome) => {
                self.leased += 1;
                match outcome {
                    RunOutcome::Success => self.succeeded += 1,
                    RunOutcome::Failure => self.failed += 1,
                    RunOutcome::Pending => self.requeued += 1,
                }
            }
            TaskDisposition::ConclusionRejected(_) => {
                self.leased += 1;
                self.rejected += 1;
            }
            TaskDisposition::ConclusionFailed(_) => {
                self.leased += 1;
                self.errors += 1;
            }
        }
    }
}

/// What one activation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationReport {
    /// Final state: `IdleExit` or `TimeExit`.
    pub state: ActivationState,

    /// Task ids of every batch, in selection order.
    pub batches: Vec<Vec<TaskId>>,

    pub tally: TaskTally,
    pub handed_off: bool,
    pub elapsed: Duration,
}

impl ActivationReport {
    fn new() -> Self {
        Self {
            state: ActivationState::Running,
            batches: Vec::new(),
            tally: TaskTally::default(),
            handed_off: false,
            elapsed: Duration::ZERO,
        }
    }
}

pub struct WorkerLoop {
    store: Arc<dyn TaskStore>,
    runner: Arc<dyn TaskRunner>,
    hand_off: Arc<dyn SignalTransport>,
    clock: Arc<dyn Clock>,
    selector: BatchSelector,
    settings: WorkerSettings,
}

impl WorkerLoop {
    pub fn new(
        store: Arc<dyn TaskStore>,
        runner: Arc<dyn TaskRunner>,
        hand_off: Arc<dyn SignalTransport>,
        clock: Arc<dyn Clock>,
        settings: WorkerSettings,
    ) -> Self {
        let selector = BatchSelector::new(Arc::clone(&store), settings.page_limit);
        Self {
            store,
            runner,
            hand_off,
            clock,
            selector,
            settings,
        }
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    /// Run one activation to completion.
    ///
    /// Per-task failures are absorbed. An `Err` means the loop itself could
    /// not go on (selection failed, hand-off could not be published); in that
    /// case no hand-off happened.
    #[instrument(skip(self), fields(page_limit = self.settings.page_limit))]
    pub async fn run_activation(&self) -> Result<ActivationReport, EngineError> {
        let started = Instant::now();
        let mut report = ActivationReport::new();

        loop {
            let batch = self.selector.next_batch().await?;
            if batch.is_empty() {
                report.state = ActivationState::IdleExit;
                break;
            }

            report.state = ActivationState::DrainingBatch;
            let ids: Vec<TaskId> = batch.iter().map(|r| r.task_id.clone()).collect();
            debug!(batch_size = ids.len(), "draining batch");
            for disposition in self.drain_batch(batch).await {
                report.tally.record(disposition);
            }
            report.batches.push(ids);
            report.state = ActivationState::Running;

            if started.elapsed() > self.settings.active_budget {
                if self.selector.has_pending().await? {
                    self.hand_off.publish(TriggerSignal::HandOff).await?;
                    report.handed_off = true;
                    report.state = ActivationState::TimeExit;
                    info!("activation budget used up, handed off remaining work");
                } else {
                    report.state = ActivationState::IdleExit;
                }
                break;
            }

            if !self.selector.has_pending().await? {
                report.state = ActivationState::IdleExit;
                break;
            }
            tokio::time::sleep(self.settings.inter_batch_delay).await;
        }

        report.elapsed = started.elapsed();
        info!(
            state = ?report.state,
            batches = report.batches.len(),
            leased = report.tally.leased,
            succeeded = report.tally.succeeded,
            failed = report.tally.failed,
            requeued = report.tally.requeued,
            skipped = report.tally.skipped,
            errors = report.tally.errors,
            handed_off = report.handed_off,
            "activation finished"
        );
        Ok(report)
    }

    /// Process a whole batch; returns once every task has settled.
    async fn drain_batch(&self, batch: Vec<TaskRecord>) -> Vec<TaskDisposition> {
        let stagger = self.settings.task_stagger;
        let work = batch.into_iter().enumerate().map(|(i, record)| async move {
            if !stagger.is_zero() && i > 0 {
                tokio::time::sleep(stagger.saturating_mul(i as u32)).await;
            }
            self.process_task(record).await
        });
        join_all(work).await
    }

    async fn process_task(&self, record: TaskRecord) -> TaskDisposition {
        let task_id = record.task_id;

        let lease = match lease::acquire(&self.store, &task_id, self.clock.now()).await {
            Ok(Some(lease)) => lease,
            Ok(None) => return TaskDisposition::Skipped,
            Err(err) => {
                error!(%task_id, error = %err, "failed to lease task");
                return TaskDisposition::LeaseFailed;
            }
        };

        let outcome = self.execute(lease.record()).await;

        match lease.conclude(outcome, self.clock.now()).await {
            Ok(Transition::Applied(_)) => {
                debug!(%task_id, ?outcome, "task concluded");
                TaskDisposition::Concluded(outcome)
            }
            Ok(Transition::Rejected(reason)) => {
                info!(%task_id, ?outcome, ?reason, "task changed while leased, conclusion dropped");
                TaskDisposition::ConclusionRejected(outcome)
            }
            Err(err) => {
                error!(%task_id, ?outcome, error = %err, "failed to conclude task");
                TaskDisposition::ConclusionFailed(outcome)
            }
        }
    }

    /// Run the task; anything unexpected becomes a requeue.
    async fn execute(&self, record: &TaskRecord) -> RunOutcome {
        match AssertUnwindSafe(self.runner.run(record)).catch_unwind().await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                warn!(task_id = %record.task_id, error = %err, "task runner failed, requeueing");
                RunOutcome::Pending
            }
            Err(_) => {
                error!(task_id = %record.task_id, "task runner panicked, requeueing");
                RunOutcome::Pending
            }
        }
    }
}

#[async_trait]
impl Activation for WorkerLoop {
    async fn activate(&self) -> Result<ActivationReport, EngineError> {
        self.run_activation().await
    }
}
