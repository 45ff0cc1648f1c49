use thiserror::Error;

use crate::config::ConfigError;
use crate::domain::{DispatchError, StoreError, TransportError};

/// Errors that escape an activation or a background loop.
///
/// Per-task failures never show up here: they are logged and counted by the
/// worker loop.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
