//! Invoker - the invocation layer in front of the worker loop.
//!
//! # 設計原則
//! - Hard concurrency ceiling of [`WORKER_CONCURRENCY`] activations.
//! - Invocation requests wait in a bounded backlog. `dispatch` is
//!   fire-and-forget: a full backlog gets [`TRIGGER_DISPATCH_RETRIES`] more
//!   tries, then the request is dropped and reported as throttled.
//! - An activation that fails or panics is logged and the serving loop goes
//!   on with the next request. Nothing is retried at this level.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, Semaphore, mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::worker_loop::ActivationReport;
use crate::config::{QueueConfig, TRIGGER_DISPATCH_RETRIES, WORKER_CONCURRENCY};
use crate::domain::DispatchError;
use crate::error::EngineError;
use crate::ports::ActivationDispatcher;

/// Something the invoker can run: one bounded activation.
#[async_trait]
pub trait Activation: Send + Sync {
    async fn activate(&self) -> Result<ActivationReport, EngineError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokerSettings {
    pub backlog: usize,
    pub retry_delay: Duration,
}

impl From<&QueueConfig> for InvokerSettings {
    fn from(cfg: &QueueConfig) -> Self {
        Self {
            backlog: cfg.invocation_backlog,
            retry_delay: cfg.dispatch_retry_delay(),
        }
    }
}

#[derive(Debug)]
struct Invocation {
    requested_at: Instant,
}

pub struct Invoker {
    tx: mpsc::Sender<Invocation>,
    shutdown_tx: watch::Sender<bool>,
    serve: Mutex<Option<JoinHandle<()>>>,
    retry_delay: Duration,
}

impl Invoker {
    /// Start serving invocations of `activation`.
    pub fn spawn(activation: Arc<dyn Activation>, settings: InvokerSettings) -> Self {
        let (tx, rx) = mpsc::channel(settings.backlog.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let serve = tokio::spawn(serve(activation, rx, shutdown_rx));
        Self {
            tx,
            shutdown_tx,
            serve: Mutex::new(Some(serve)),
            retry_delay: settings.retry_delay,
        }
    }

    /// Stop taking requests, let in-flight activations finish.
    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(&self) {
        self.request_shutdown();
        if let Some(handle) = self.serve.lock().await.take()
            && let Err(err) = handle.await
        {
            error!(error = %err, "invoker serving task ended abnormally");
        }
    }
}

#[async_trait]
impl ActivationDispatcher for Invoker {
    async fn dispatch(&self) -> Result<(), DispatchError> {
        let mut attempts = 0;
        loop {
            // the serving loop drops whatever is queued once shutdown starts
            if *self.shutdown_tx.borrow() {
                return Err(DispatchError::Closed);
            }
            attempts += 1;
            let invocation = Invocation {
                requested_at: Instant::now(),
            };
            match self.tx.try_send(invocation) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Closed(_)) => return Err(DispatchError::Closed),
                Err(TrySendError::Full(_)) if attempts <= TRIGGER_DISPATCH_RETRIES => {
                    warn!(attempts, "invocation backlog full, retrying dispatch");
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(TrySendError::Full(_)) => {
                    warn!(attempts, "invocation backlog full, dropping request");
                    return Err(DispatchError::Throttled { attempts });
                }
            }
        }
    }
}

async fn serve(
    activation: Arc<dyn Activation>,
    mut rx: mpsc::Receiver<Invocation>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let ceiling = Arc::new(Semaphore::new(WORKER_CONCURRENCY));
    let mut running: JoinSet<()> = JoinSet::new();

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // Hold the slot before taking a request, so surplus requests wait
        // in the bounded backlog rather than here.
        let permit = tokio::select! {
            changed = shutdown_rx.changed() => match changed {
                Ok(()) => continue,
                Err(_) => break,
            },
            permit = Arc::clone(&ceiling).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let invocation = tokio::select! {
            changed = shutdown_rx.changed() => match changed {
                Ok(()) => continue,
                Err(_) => break,
            },
            invocation = rx.recv() => invocation,
        };
        let Some(invocation) = invocation else {
            break;
        };

        let activation = Arc::clone(&activation);
        running.spawn(async move {
            let _permit = permit;
            debug!(
                waited_ms = invocation.requested_at.elapsed().as_millis() as u64,
                "activation starting"
            );
            match activation.activate().await {
                Ok(report) => debug!(state = ?report.state, "activation done"),
                Err(err) => error!(error = %err, "activation failed"),
            }
        });

        while let Some(result) = running.try_join_next() {
            if let Err(err) = result {
                error!(error = %err, "activation task panicked");
            }
        }
    }

    rx.close();
    while let Some(result) = running.join_next().await {
        if let Err(err) = result {
            error!(error = %err, "activation task panicked");
        }
    }
    info!("invoker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::worker_loop::{ActivationState, TaskTally};
    use crate::domain::StoreError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records how many activations overlap.
    #[derive(Default)]
    struct Meter {
        active: AtomicUsize,
        max_active: AtomicUsize,
        runs: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Activation for Meter {
        async fn activate(&self) -> Result<ActivationReport, EngineError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.runs.fetch_add(1, Ordering::SeqCst);

            if self.fail {
                return Err(StoreError::Io("down".into()).into());
            }
            Ok(ActivationReport {
                state: ActivationState::IdleExit,
                batches: Vec::new(),
                tally: TaskTally::default(),
                handed_off: false,
                elapsed: Duration::from_millis(50),
            })
        }
    }

    fn settings(backlog: usize) -> InvokerSettings {
        InvokerSettings {
            backlog,
            retry_delay: Duration::from_millis(10),
        }
    }

    async fn wait_for_runs(meter: &Meter, runs: usize) {
        for _ in 0..1_000 {
            if meter.runs.load(Ordering::SeqCst) >= runs {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {runs} runs, saw {}", meter.runs.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn activations_never_overlap() {
        let meter = Arc::new(Meter::default());
        let invoker = Invoker::spawn(meter.clone(), settings(8));

        for _ in 0..5 {
            invoker.dispatch().await.unwrap();
        }
        wait_for_runs(&meter, 5).await;
        invoker.shutdown_and_join().await;

        assert_eq!(meter.runs.load(Ordering::SeqCst), 5);
        assert_eq!(meter.max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn full_backlog_is_retried_once_then_throttled() {
        let meter = Arc::new(Meter::default());
        let invoker = Invoker::spawn(meter.clone(), settings(1));

        // First request starts running, second fills the backlog.
        invoker.dispatch().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        invoker.dispatch().await.unwrap();

        let err = invoker.dispatch().await.unwrap_err();
        assert!(matches!(err, DispatchError::Throttled { attempts: 2 }));

        invoker.shutdown_and_join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_activation_does_not_stop_the_invoker() {
        let meter = Arc::new(Meter {
            fail: true,
            ..Meter::default()
        });
        let invoker = Invoker::spawn(meter.clone(), settings(4));

        invoker.dispatch().await.unwrap();
        wait_for_runs(&meter, 1).await;
        invoker.dispatch().await.unwrap();
        wait_for_runs(&meter, 2).await;

        invoker.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn dispatch_after_shutdown_is_closed() {
        let invoker = Invoker::spawn(Arc::new(Meter::default()), settings(4));
        invoker.shutdown_and_join().await;

        assert!(matches!(invoker.dispatch().await, Err(DispatchError::Closed)));
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_during_shutdown_is_closed() {
        let meter = Arc::new(Meter::default());
        let invoker = Invoker::spawn(meter.clone(), settings(4));

        invoker.dispatch().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;

        // the serving loop is still draining the running activation
        invoker.request_shutdown();
        assert!(matches!(invoker.dispatch().await, Err(DispatchError::Closed)));

        invoker.shutdown_and_join().await;
        assert_eq!(meter.runs.load(Ordering::SeqCst), 1);
    }
}
