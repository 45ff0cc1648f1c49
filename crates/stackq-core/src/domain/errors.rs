//! Error types of the queue's collaborators.
//!
//! A lost race on a conditional transition is NOT an error: it is reported as
//! [`crate::ports::Transition::Rejected`]. Everything here is a real failure.

use thiserror::Error;

use super::{TaskId, TaskStatus};

/// Task store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The id already exists. Generate a new id instead of retrying.
    #[error("task id already exists: {0}")]
    Collision(TaskId),

    #[error("illegal transition {from} -> {to}")]
    IllegalTransition { from: TaskStatus, to: TaskStatus },

    /// Infrastructure failure of the store itself.
    #[error("store i/o failure: {0}")]
    Io(String),
}

/// Unexpected failure raised by a task runner. The worker loop turns it into
/// a requeue.
#[derive(Debug, Error)]
#[error("task runner failed: {message}")]
pub struct RunnerError {
    pub message: String,
}

impl RunnerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,

    #[error("failed to encode signal: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failure to hand an invocation request to the invocation layer.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invocation rejected after {attempts} attempt(s): worker backlog is full")]
    Throttled { attempts: u32 },

    #[error("invoker is shut down")]
    Closed,
}
