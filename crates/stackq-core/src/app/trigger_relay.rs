//! TriggerRelay - wake-up signals in, "run the worker" requests out.
//!
//! # フロー
//! 1. receive a signal from the transport
//! 2. classify it: an insert batch or a hand-off invokes, anything else is
//!    ignored
//! 3. one dispatch per invoking signal, no deduplication across signals
//!
//! A signal whose handling fails is logged and dropped; the transport gets
//! [`TRANSPORT_DISPATCH_RETRIES`] redeliveries.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::TRANSPORT_DISPATCH_RETRIES;
use crate::domain::{DispatchError, TriggerSignal};
use crate::ports::{ActivationDispatcher, SignalTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayDecision {
    Invoke,
    Ignore,
}

pub struct TriggerRelay {
    dispatcher: Arc<dyn ActivationDispatcher>,
}

impl TriggerRelay {
    pub fn new(dispatcher: Arc<dyn ActivationDispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn classify(signal: &TriggerSignal) -> RelayDecision {
        match signal {
            TriggerSignal::HandOff => RelayDecision::Invoke,
            TriggerSignal::StoreChange { .. } if signal.has_insert() => RelayDecision::Invoke,
            TriggerSignal::StoreChange { .. } => RelayDecision::Ignore,
        }
    }

    /// Handle one decoded signal.
    pub async fn handle(&self, signal: &TriggerSignal) -> Result<RelayDecision, DispatchError> {
        let decision = Self::classify(signal);
        if decision == RelayDecision::Invoke {
            self.dispatcher.dispatch().await?;
        }
        Ok(decision)
    }

    /// Handle a raw JSON transport message. Unknown shapes are ignored.
    pub async fn handle_raw(&self, raw: &str) -> Result<RelayDecision, DispatchError> {
        match TriggerSignal::decode(raw) {
            Ok(signal) => self.handle(&signal).await,
            Err(err) => {
                debug!(error = %err, "ignoring undecodable signal");
                Ok(RelayDecision::Ignore)
            }
        }
    }

    /// Consume `transport` until it closes or `shutdown` flips to true.
    pub async fn run(
        &self,
        transport: Arc<dyn SignalTransport>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("trigger relay started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            let signal = tokio::select! {
                changed = shutdown.changed() => match changed {
                    Ok(()) => continue,
                    Err(_) => break,
                },
                signal = transport.recv() => signal,
            };
            let Some(signal) = signal else {
                break;
            };

            match self.handle(&signal).await {
                Ok(RelayDecision::Invoke) => debug!(?signal, "activation requested"),
                Ok(RelayDecision::Ignore) => debug!(?signal, "signal ignored"),
                Err(err) => warn!(
                    error = %err,
                    redeliveries = TRANSPORT_DISPATCH_RETRIES,
                    "dropping signal"
                ),
            }
        }
        info!("trigger relay stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChangeEvent, ChangeKind, TaskId};
    use crate::impls::InMemorySignalTransport;
    use async_trait::async_trait;
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingDispatcher {
        calls: AtomicUsize,
        throttle: bool,
    }

    #[async_trait]
    impl ActivationDispatcher for CountingDispatcher {
        async fn dispatch(&self) -> Result<(), DispatchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.throttle {
                return Err(DispatchError::Throttled { attempts: 2 });
            }
            Ok(())
        }
    }

    fn change(kinds: &[ChangeKind]) -> TriggerSignal {
        TriggerSignal::StoreChange {
            events: kinds
                .iter()
                .enumerate()
                .map(|(i, kind)| ChangeEvent::new(*kind, TaskId::new(format!("t{i}"))))
                .collect(),
        }
    }

    #[rstest]
    #[case::hand_off(TriggerSignal::HandOff, RelayDecision::Invoke)]
    #[case::insert(change(&[ChangeKind::Insert]), RelayDecision::Invoke)]
    #[case::mixed(change(&[ChangeKind::Modify, ChangeKind::Insert]), RelayDecision::Invoke)]
    #[case::modify_only(change(&[ChangeKind::Modify]), RelayDecision::Ignore)]
    #[case::remove_only(change(&[ChangeKind::Remove, ChangeKind::Remove]), RelayDecision::Ignore)]
    #[case::empty(change(&[]), RelayDecision::Ignore)]
    fn classify_signals(#[case] signal: TriggerSignal, #[case] expected: RelayDecision) {
        assert_eq!(TriggerRelay::classify(&signal), expected);
    }

    #[rstest]
    #[case::garbage("not json")]
    #[case::unknown_type(r#"{"type":"reboot"}"#)]
    #[case::missing_events(r#"{"type":"store_change"}"#)]
    #[tokio::test]
    async fn undecodable_messages_are_ignored(#[case] raw: &str) {
        let dispatcher = Arc::new(CountingDispatcher::default());
        let relay = TriggerRelay::new(dispatcher.clone());

        assert_eq!(relay.handle_raw(raw).await.unwrap(), RelayDecision::Ignore);
        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn raw_insert_dispatches_once() {
        let dispatcher = Arc::new(CountingDispatcher::default());
        let relay = TriggerRelay::new(dispatcher.clone());

        let raw = r#"{"type":"store_change","events":[{"kind":"INSERT","taskId":"t1"},{"kind":"INSERT","taskId":"t2"}]}"#;
        assert_eq!(relay.handle_raw(raw).await.unwrap(), RelayDecision::Invoke);
        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn run_dispatches_per_signal_until_closed() {
        let dispatcher = Arc::new(CountingDispatcher::default());
        let relay = TriggerRelay::new(dispatcher.clone());
        let transport = Arc::new(InMemorySignalTransport::new());

        transport.publish(TriggerSignal::insert(TaskId::new("a"))).await.unwrap();
        transport.publish(change(&[ChangeKind::Remove])).await.unwrap();
        transport.publish(TriggerSignal::insert(TaskId::new("b"))).await.unwrap();
        transport.publish(TriggerSignal::HandOff).await.unwrap();
        transport.close();

        let (_tx, rx) = watch::channel(false);
        relay.run(transport, rx).await;

        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failed_dispatch_is_dropped_not_redelivered() {
        let dispatcher = Arc::new(CountingDispatcher {
            throttle: true,
            ..CountingDispatcher::default()
        });
        let relay = TriggerRelay::new(dispatcher.clone());
        let transport = Arc::new(InMemorySignalTransport::new());

        transport.publish(TriggerSignal::HandOff).await.unwrap();
        transport.close();

        let (_tx, rx) = watch::channel(false);
        relay.run(transport, rx).await;

        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shutdown_stops_a_waiting_relay() {
        let relay = TriggerRelay::new(Arc::new(CountingDispatcher::default()));
        let transport = Arc::new(InMemorySignalTransport::new());
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(async move { relay.run(transport, rx).await });
        tx.send(true).unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
