//! ActivationDispatcher port - "run the worker once", fire-and-forget.

use async_trait::async_trait;

use crate::domain::DispatchError;

/// Requests one worker activation.
///
/// Returning `Ok` means the request was accepted, not that the activation
/// ran or succeeded.
#[async_trait]
pub trait ActivationDispatcher: Send + Sync {
    async fn dispatch(&self) -> Result<(), DispatchError>;
}
