//! SaturatingRunner - fake downstream with a hard admission limit.
//!
//! Stands in for a real downstream call. Capacity is an injected
//! `Arc<Semaphore>`: when no permit is free the call is rejected the way a
//! saturated service would reject it, and the task goes back to PENDING.
//! Independent runners (e.g. in tests) get independent semaphores.

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::domain::{RunOutcome, RunnerError, TaskRecord};
use crate::ports::TaskRunner;

pub struct SaturatingRunner {
    admission: Arc<Semaphore>,
    latency_ms: Range<u64>,
    failure_rate: f64,
    error_rate: f64,
}

impl SaturatingRunner {
    pub fn new(admission: Arc<Semaphore>) -> Self {
        Self {
            admission,
            latency_ms: 0..1,
            failure_rate: 0.0,
            error_rate: 0.0,
        }
    }

    /// Simulated call latency, drawn uniformly from `range` (milliseconds).
    pub fn with_latency_ms(mut self, range: Range<u64>) -> Self {
        self.latency_ms = if range.is_empty() { 0..1 } else { range };
        self
    }

    /// Share of admitted calls that fail permanently.
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = probability(rate);
        self
    }

    /// Share of admitted calls that blow up unexpectedly.
    pub fn with_error_rate(mut self, rate: f64) -> Self {
        self.error_rate = probability(rate);
        self
    }
}

/// `rate` as a valid `gen_bool` argument. NaN and infinities count as 0.
fn probability(rate: f64) -> f64 {
    if rate.is_finite() {
        rate.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[async_trait]
impl TaskRunner for SaturatingRunner {
    async fn run(&self, task: &TaskRecord) -> Result<RunOutcome, RunnerError> {
        let Ok(_permit) = self.admission.try_acquire() else {
            debug!(task_id = %task.task_id, "downstream saturated, rejecting call");
            return Ok(RunOutcome::Pending);
        };

        // ThreadRng is not Send: draw everything before the first await.
        let (latency, errored, failed) = {
            let mut rng = rand::thread_rng();
            (
                Duration::from_millis(rng.gen_range(self.latency_ms.clone())),
                rng.gen_bool(self.error_rate),
                rng.gen_bool(self.failure_rate),
            )
        };

        tokio::time::sleep(latency).await;

        if errored {
            return Err(RunnerError::new(format!(
                "downstream call for {} blew up",
                task.task_id
            )));
        }
        Ok(if failed {
            RunOutcome::Failure
        } else {
            RunOutcome::Success
        })
    }
}
