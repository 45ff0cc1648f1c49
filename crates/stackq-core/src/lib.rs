//! stackq-core
//!
//! A LIFO work queue: the newest PENDING task is served first, each task has
//! at most one owner at a time, and stale backlog expires.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, status, task record, outcome, signal, errors）
//! - **ports**: 抽象化レイヤー（TaskStore, SignalTransport, TaskRunner, Clock, など）
//! - **app**: キューエンジン（lease, batch, worker_loop, invoker, trigger_relay, など）
//! - **impls**: 実装（InMemoryTaskStore など開発用）
//! - **config**: QueueConfig（defaults -> file -> env）
//! - **observability**: logging と状態別カウント

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod observability;
pub mod ports;

pub use crate::config::QueueConfig;
pub use crate::error::EngineError;
