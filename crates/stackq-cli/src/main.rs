//! stackq demo: producer -> store -> relay -> invoker -> worker, against a
//! fake downstream that only admits a few calls at a time.
//!
//! Usage: `stackq-cli [CONFIG_FILE] [TASK_COUNT]`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{Semaphore, watch};
use tokio::time::{Duration, Instant, sleep};
use tracing::info;

use stackq_core::QueueConfig;
use stackq_core::app::{
    ExpirySweeper, Invoker, InvokerSettings, LeaseReaper, ReaperSettings, TriggerRelay,
    WorkerLoop, WorkerSettings,
};
use stackq_core::domain::TaskStatus;
use stackq_core::impls::{
    InMemorySignalTransport, InMemoryTaskStore, SaturatingRunner, TaskProducer,
};
use stackq_core::observability::init_logging;
use stackq_core::ports::{Clock, SignalTransport, SystemClock, TaskStore, UlidGenerator};

const DEFAULT_TASK_COUNT: usize = 25;
const DOWNSTREAM_PERMITS: usize = 3;
const DRAIN_DEADLINE: Duration = Duration::from_secs(120);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let mut args = std::env::args().skip(1);
    let config_path = args.next().map(PathBuf::from);
    let task_count = match args.next() {
        Some(raw) => raw.parse().context("TASK_COUNT must be a number")?,
        None => DEFAULT_TASK_COUNT,
    };

    let cfg = QueueConfig::load(config_path.as_deref()).context("loading configuration")?;
    info!(?cfg, task_count, "starting stackq demo");

    // (A) Store と Transport を用意（store の変更は change feed として transport へ）
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let transport = Arc::new(InMemorySignalTransport::new());
    let store: Arc<dyn TaskStore> = Arc::new(
        InMemoryTaskStore::new(Arc::clone(&clock), cfg.expiry_horizon())
            .with_change_feed(transport.clone()),
    );

    // (B) 下流（同時に DOWNSTREAM_PERMITS 件まで）と worker loop
    let runner = SaturatingRunner::new(Arc::new(Semaphore::new(DOWNSTREAM_PERMITS)))
        .with_latency_ms(50..300)
        .with_failure_rate(0.05)
        .with_error_rate(0.05);
    let worker = Arc::new(WorkerLoop::new(
        Arc::clone(&store),
        Arc::new(runner),
        transport.clone(),
        Arc::clone(&clock),
        WorkerSettings::from(&cfg),
    ));

    // (C) Invoker と relay、背景ループを起動
    let invoker = Arc::new(Invoker::spawn(worker, InvokerSettings::from(&cfg)));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut background = Vec::new();

    let relay = TriggerRelay::new(invoker.clone());
    let relay_transport: Arc<dyn SignalTransport> = transport.clone();
    let rx = shutdown_rx.clone();
    background.push(tokio::spawn(async move {
        relay.run(relay_transport, rx).await;
    }));

    let sweeper = ExpirySweeper::new(Arc::clone(&store), Arc::clone(&clock), cfg.sweep_interval());
    let rx = shutdown_rx.clone();
    background.push(tokio::spawn(async move { sweeper.run(rx).await }));

    if let Some(settings) = ReaperSettings::from_config(&cfg) {
        let reaper = LeaseReaper::new(Arc::clone(&store), Arc::clone(&clock), settings);
        let rx = shutdown_rx.clone();
        background.push(tokio::spawn(async move { reaper.run(rx).await }));
    }

    // (D) タスク投入
    let producer = TaskProducer::new(
        Arc::clone(&store),
        Arc::new(UlidGenerator::new(SystemClock)),
    );
    producer
        .produce_burst(task_count)
        .await
        .context("producing tasks")?;

    // (E) PENDING / TAKEN が無くなるまでポーリング（Ctrl-C か期限で打ち切り）
    let deadline = Instant::now() + DRAIN_DEADLINE;
    loop {
        let counts = store.counts_by_status().await?;
        if counts.get(TaskStatus::Pending) == 0 && counts.get(TaskStatus::Taken) == 0 {
            info!("queue drained");
            break;
        }
        if Instant::now() >= deadline {
            info!(?counts, "deadline reached with work remaining");
            break;
        }
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            _ = sleep(Duration::from_millis(500)) => {}
        }
    }

    let counts = store.counts_by_status().await?;
    println!("{}", serde_json::to_string_pretty(&counts)?);

    // (F) graceful shutdown: 背景ループを止め、実行中の activation を待つ
    let _ = shutdown_tx.send(true);
    for handle in background {
        handle.await.context("background loop panicked")?;
    }
    invoker.shutdown_and_join().await;

    Ok(())
}
