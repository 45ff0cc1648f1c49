//! InMemorySignalTransport - 開発用の signal transport
//!
//! # 実装詳細
//! - unbounded tokio mpsc channel; publishing never blocks the store or the
//!   worker loop
//! - a single consumer (the trigger relay) owns `recv`; the receiver sits
//!   behind an async mutex so the transport can be shared as
//!   `Arc<dyn SignalTransport>`
//! - `close` drops the sender. It never touches the receiver lock, so it
//!   does not wait for a pending `recv`

use std::sync::Mutex as SyncMutex;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use crate::domain::{TransportError, TriggerSignal};
use crate::ports::SignalTransport;

pub struct InMemorySignalTransport {
    tx: SyncMutex<Option<mpsc::UnboundedSender<TriggerSignal>>>,
    rx: Mutex<mpsc::UnboundedReceiver<TriggerSignal>>,
}

impl InMemorySignalTransport {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx: SyncMutex::new(Some(tx)),
            rx: Mutex::new(rx),
        }
    }

    /// Non-blocking receive. `None` if nothing is queued or a `recv` is in
    /// progress.
    pub fn try_recv(&self) -> Option<TriggerSignal> {
        let mut rx = self.rx.try_lock().ok()?;
        rx.try_recv().ok()
    }

    /// Stop accepting new signals. Queued ones can still be received, then
    /// `recv` returns `None`.
    pub fn close(&self) {
        self.tx.lock().unwrap_or_else(|e| e.into_inner()).take();
    }
}

impl Default for InMemorySignalTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalTransport for InMemorySignalTransport {
    async fn publish(&self, signal: TriggerSignal) -> Result<(), TransportError> {
        let tx = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        match tx.as_ref() {
            Some(tx) => tx.send(signal).map_err(|_| TransportError::Closed),
            None => Err(TransportError::Closed),
        }
    }

    async fn recv(&self) -> Option<TriggerSignal> {
        self.rx.lock().await.recv().await
    }
}
