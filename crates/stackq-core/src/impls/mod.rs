//! Impls - 実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryTaskStore**: TaskStore with a status-partitioned index and TTL
//! - **InMemorySignalTransport**: channel based SignalTransport
//! - **SaturatingRunner**: fake downstream with an admission limit
//! - **TaskProducer**: fake producer inserting generated tasks

pub mod inmem_transport;
pub mod memory_store;
pub mod producer;
pub mod saturating_runner;

pub use self::inmem_transport::InMemorySignalTransport;
pub use self::memory_store::InMemoryTaskStore;
pub use self::producer::TaskProducer;
pub use self::saturating_runner::SaturatingRunner;
