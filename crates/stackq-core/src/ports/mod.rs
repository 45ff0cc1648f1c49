//! Ports - 抽象化レイヤー
//!
//! Each trait is the seam to something outside the queue engine: the store
//! holding the records, the transport carrying wake-up signals, the business
//! logic running a task, time and id generation.
//!
//! In-memory implementations live in [`crate::impls`].

pub mod clock;
pub mod dispatch;
pub mod id_generator;
pub mod runner;
pub mod task_store;
pub mod transport;

pub use self::clock::{Clock, ManualClock, SystemClock};
pub use self::dispatch::ActivationDispatcher;
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::runner::{FnRunner, TaskRunner};
pub use self::task_store::{Rejection, TaskStore, Transition};
pub use self::transport::SignalTransport;
