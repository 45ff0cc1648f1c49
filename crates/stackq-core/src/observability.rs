//! Logging setup and queue status views.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::domain::TaskStatus;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Default filter when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Install the global tracing subscriber.
///
/// - filter from `RUST_LOG` (falls back to [`DEFAULT_LOG_FILTER`])
/// - JSON lines when `STACKQ_LOG_FORMAT=json`, human readable otherwise
///
/// Safe to call more than once; an already installed subscriber is kept.
pub fn init_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
        let json = std::env::var("STACKQ_LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let result = if json {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_target(true))
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(true))
                .try_init()
        };

        if result.is_err() {
            tracing::debug!("global tracing subscriber already installed, keeping it");
        }
    });
}

/// Number of live records per status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub pending: usize,
    pub taken: usize,
    pub success: usize,
    pub failure: usize,
}

impl QueueCounts {
    pub fn record(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Pending => self.pending += 1,
            TaskStatus::Taken => self.taken += 1,
            TaskStatus::Success => self.success += 1,
            TaskStatus::Failure => self.failure += 1,
        }
    }

    pub fn get(&self, status: TaskStatus) -> usize {
        match status {
            TaskStatus::Pending => self.pending,
            TaskStatus::Taken => self.taken,
            TaskStatus::Success => self.success,
            TaskStatus::Failure => self.failure,
        }
    }

    pub fn total(&self) -> usize {
        self.pending + self.taken + self.success + self.failure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_track_each_status() {
        let mut counts = QueueCounts::default();
        for status in [TaskStatus::Pending, TaskStatus::Pending, TaskStatus::Failure] {
            counts.record(status);
        }

        assert_eq!(counts.get(TaskStatus::Pending), 2);
        assert_eq!(counts.get(TaskStatus::Failure), 1);
        assert_eq!(counts.get(TaskStatus::Success), 0);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn init_logging_twice_is_harmless() {
        init_logging();
        init_logging();
    }
}
