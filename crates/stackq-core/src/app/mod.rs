//! App - アプリケーション層
//!
//! ports を組み合わせてキューエンジンを実装します。
//!
//! # 主要コンポーネント
//! - **lease**: PENDING -> TAKEN -> outcome の条件付き遷移
//! - **BatchSelector**: 次のバッチ（PENDING, 新しい順）
//! - **WorkerLoop**: 時間制限付きの activation（select -> lease -> run -> conclude）
//! - **Invoker**: 同時実行数 1 の invocation layer
//! - **TriggerRelay**: signal -> activation request
//! - **ExpirySweeper**: 期限切れレコードの削除
//! - **LeaseReaper**: 放置された lease の回収（opt-in）

pub mod batch;
pub mod gc_loop;
pub mod invoker;
pub mod lease;
pub mod reaper_loop;
pub mod trigger_relay;
pub mod worker_loop;

// 主要な型を再エクスポート
pub use self::batch::BatchSelector;
pub use self::gc_loop::ExpirySweeper;
pub use self::invoker::{Activation, Invoker, InvokerSettings};
pub use self::lease::Lease;
pub use self::reaper_loop::{LeaseReaper, ReaperSettings};
pub use self::trigger_relay::{RelayDecision, TriggerRelay};
pub use self::worker_loop::{
    ActivationReport, ActivationState, TaskDisposition, TaskTally, WorkerLoop, WorkerSettings,
};
