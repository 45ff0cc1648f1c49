//! Domain model (ids, status, records, outcomes, signals, errors).

pub mod errors;
pub mod ids;
pub mod outcome;
pub mod signal;
pub mod status;
pub mod task;

pub use errors::{DispatchError, RunnerError, StoreError, TransportError};
pub use ids::TaskId;
pub use outcome::RunOutcome;
pub use signal::{ChangeEvent, ChangeKind, TriggerSignal};
pub use status::TaskStatus;
pub use task::{NewTask, TaskRecord};
