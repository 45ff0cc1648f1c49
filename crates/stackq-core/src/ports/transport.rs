//! SignalTransport port - delivers wake-up signals to the trigger relay.
//!
//! Delivery is at-least-once. Duplicates only cost an extra, mostly idle,
//! activation.

use async_trait::async_trait;

use crate::domain::{TransportError, TriggerSignal};

#[async_trait]
pub trait SignalTransport: Send + Sync {
    async fn publish(&self, signal: TriggerSignal) -> Result<(), TransportError>;

    /// Wait for the next signal. `None` once the transport is closed and
    /// drained.
    async fn recv(&self) -> Option<TriggerSignal>;
}
