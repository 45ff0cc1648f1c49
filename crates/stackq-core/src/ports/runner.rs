//! TaskRunner port - the business logic a leased task is handed to.

use async_trait::async_trait;

use crate::domain::{RunOutcome, RunnerError, TaskRecord};

/// Executes one task attempt.
///
/// A runner may see the same task more than once over its lifetime (a
/// requeue, or a reclaimed lease), so it has to tolerate repeats. An `Err` or
/// a panic is treated by the worker loop as [`RunOutcome::Pending`].
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(&self, task: &TaskRecord) -> Result<RunOutcome, RunnerError>;
}

/// Adapter for synchronous closures. Mostly useful in tests.
pub struct FnRunner<F> {
    f: F,
}

impl<F> FnRunner<F>
where
    F: Fn(&TaskRecord) -> Result<RunOutcome, RunnerError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> TaskRunner for FnRunner<F>
where
    F: Fn(&TaskRecord) -> Result<RunOutcome, RunnerError> + Send + Sync,
{
    async fn run(&self, task: &TaskRecord) -> Result<RunOutcome, RunnerError> {
        (self.f)(task)
    }
}
