//! IdGenerator port - task id generation for producers.
//!
//! # 実装
//! - **UlidGenerator**: ULID based. The timestamp part comes from a `Clock`,
//!   so tests with a `ManualClock` get a predictable prefix.

use ulid::Ulid;

use crate::domain::TaskId;
use crate::ports::Clock;

pub trait IdGenerator: Send + Sync {
    fn generate_task_id(&self) -> TaskId;
}

pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_task_id(&self) -> TaskId {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        TaskId::from_ulid(Ulid::from_parts(timestamp_ms, rand::random()))
    }
}
