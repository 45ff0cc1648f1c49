//! Queue configuration.
//!
//! Everything here is a deployment constant, not a per-request parameter.
//! Sources, later ones win:
//! 1. built-in defaults
//! 2. a TOML file (`stackq.toml` in the working directory, or an explicit path)
//! 3. environment variables prefixed with `STACKQ_` (`STACKQ_PAGE_LIMIT=20`)
//!
//! Durations are plain milliseconds (`*_ms` keys).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// At most this many activations run at once. Not tunable.
pub const WORKER_CONCURRENCY: usize = 1;

/// Retries the invoker makes when an invocation request is not accepted.
pub const TRIGGER_DISPATCH_RETRIES: u32 = 1;

/// Redeliveries of a transport signal whose handling failed.
pub const TRANSPORT_DISPATCH_RETRIES: u32 = 0;

pub const DEFAULT_CONFIG_FILE: &str = "stackq";
pub const ENV_PREFIX: &str = "STACKQ";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Tasks per batch.
    pub page_limit: usize,

    /// Wall time one activation may keep starting batches.
    pub active_budget_ms: u64,

    /// Pause between two batches of the same activation.
    pub inter_batch_delay_ms: u64,

    /// Task `i` of a batch starts `i * task_stagger_ms` after the batch.
    pub task_stagger_ms: u64,

    /// Records expire this long after creation.
    pub expiry_horizon_ms: u64,

    /// How often the expiry sweeper purges.
    pub sweep_interval_ms: u64,

    /// Reclaim TAKEN records untouched for this long. `None` disables the
    /// lease reaper.
    pub lease_timeout_ms: Option<u64>,

    pub reap_interval_ms: u64,

    /// TAKEN records inspected per reaper pass.
    pub reap_scan_limit: usize,

    /// Invocation requests that may wait for the single activation slot.
    pub invocation_backlog: usize,

    /// Wait before the one dispatch retry.
    pub dispatch_retry_delay_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            page_limit: 10,
            active_budget_ms: 60_000,
            inter_batch_delay_ms: 1_000,
            task_stagger_ms: 100,
            expiry_horizon_ms: 3_600_000,
            sweep_interval_ms: 30_000,
            lease_timeout_ms: None,
            reap_interval_ms: 60_000,
            reap_scan_limit: 100,
            invocation_backlog: 16,
            dispatch_retry_delay_ms: 200,
        }
    }
}

impl QueueConfig {
    /// Load from defaults, the optional file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => config::File::from(path),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        let settings = config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;
        let cfg: QueueConfig = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML document on top of the defaults (no environment).
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?;
        let cfg: QueueConfig = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_limit == 0 {
            return Err(ConfigError::Invalid("page_limit must be at least 1".into()));
        }
        if self.active_budget_ms == 0 {
            return Err(ConfigError::Invalid("active_budget_ms must be positive".into()));
        }
        if self.expiry_horizon_ms == 0 {
            return Err(ConfigError::Invalid("expiry_horizon_ms must be positive".into()));
        }
        if self.invocation_backlog == 0 {
            return Err(ConfigError::Invalid(
                "invocation_backlog must be at least 1".into(),
            ));
        }
        if self.lease_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid("lease_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn active_budget(&self) -> Duration {
        Duration::from_millis(self.active_budget_ms)
    }

    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_millis(self.inter_batch_delay_ms)
    }

    pub fn task_stagger(&self) -> Duration {
        Duration::from_millis(self.task_stagger_ms)
    }

    pub fn expiry_horizon(&self) -> Duration {
        Duration::from_millis(self.expiry_horizon_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn lease_timeout(&self) -> Option<Duration> {
        self.lease_timeout_ms.map(Duration::from_millis)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.reap_interval_ms)
    }

    pub fn dispatch_retry_delay(&self) -> Duration {
        Duration::from_millis(self.dispatch_retry_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults_are_valid() {
        let cfg = QueueConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.page_limit, 10);
        assert_eq!(cfg.expiry_horizon(), Duration::from_secs(3600));
        assert_eq!(cfg.lease_timeout(), None);
    }

    #[test]
    fn toml_overrides_only_given_keys() {
        let cfg = QueueConfig::from_toml(
            r#"
            page_limit = 25
            active_budget_ms = 5000
            lease_timeout_ms = 120000
            "#,
        )
        .unwrap();

        assert_eq!(cfg.page_limit, 25);
        assert_eq!(cfg.active_budget(), Duration::from_secs(5));
        assert_eq!(cfg.lease_timeout(), Some(Duration::from_secs(120)));
        assert_eq!(cfg.inter_batch_delay_ms, QueueConfig::default().inter_batch_delay_ms);
    }

    #[rstest]
    #[case("page_limit = 0")]
    #[case("active_budget_ms = 0")]
    #[case("expiry_horizon_ms = 0")]
    #[case("invocation_backlog = 0")]
    #[case("lease_timeout_ms = 0")]
    fn rejects_degenerate_values(#[case] source: &str) {
        let err = QueueConfig::from_toml(source).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "{err}");
    }
}
