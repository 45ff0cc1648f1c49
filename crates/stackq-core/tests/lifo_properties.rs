use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, TimeZone, Utc};
use proptest::prelude::*;
use stackq_core::domain::{NewTask, TaskId, TaskStatus};
use stackq_core::impls::InMemoryTaskStore;
use stackq_core::ports::{Clock, ManualClock, TaskStore};

/// Distinct creation offsets (ms), in a random insertion order.
fn creation_offsets() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::btree_set(0i64..10_000, 1..40)
        .prop_map(|offsets| offsets.into_iter().collect::<Vec<_>>())
        .prop_shuffle()
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

/// Inserts one task per offset and takes those flagged in `taken`.
async fn populate(offsets: &[i64], taken: &[bool]) -> InMemoryTaskStore {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let clock = ManualClock::new(base);
    let store = InMemoryTaskStore::new(Arc::new(clock.clone()), Duration::from_secs(3600));
    for (i, offset) in offsets.iter().enumerate() {
        clock.set(base + TimeDelta::milliseconds(*offset));
        let id = TaskId::new(format!("t{offset}"));
        store
            .insert(NewTask::new(id.clone(), serde_json::json!({})))
            .await
            .unwrap();
        if taken.get(i).copied().unwrap_or(false) {
            let result = store
                .transition(&id, TaskStatus::Pending, TaskStatus::Taken, clock.now())
                .await
                .unwrap();
            assert!(result.is_applied());
        }
    }
    store
}

proptest! {
    /// Property: a page is the `limit` newest PENDING tasks, newest first,
    /// whatever order they were inserted in
    #[test]
    fn page_is_newest_pending_prefix(
        offsets in creation_offsets(),
        taken in prop::collection::vec(any::<bool>(), 40),
        limit in 1usize..15,
    ) {
        let page = block_on(async {
            let store = populate(&offsets, &taken).await;
            store.query_newest_first(TaskStatus::Pending, limit).await.unwrap()
        });

        let mut expected: Vec<i64> = offsets
            .iter()
            .enumerate()
            .filter(|(i, _)| !taken[*i])
            .map(|(_, offset)| *offset)
            .collect();
        expected.sort_unstable_by(|a, b| b.cmp(a));
        expected.truncate(limit);

        let got: Vec<String> = page.iter().map(|r| r.task_id.to_string()).collect();
        let want: Vec<String> = expected.iter().map(|o| format!("t{o}")).collect();
        prop_assert_eq!(got, want);
        prop_assert!(page.iter().all(|r| r.status == TaskStatus::Pending));
    }

    /// Property: oldest-first is the mirror image of newest-first
    #[test]
    fn oldest_first_mirrors_newest_first(offsets in creation_offsets()) {
        let (newest, oldest) = block_on(async {
            let store = populate(&offsets, &[]).await;
            let n = offsets.len();
            (
                store.query_newest_first(TaskStatus::Pending, n).await.unwrap(),
                store.query_oldest_first(TaskStatus::Pending, n).await.unwrap(),
            )
        });

        let mut reversed = newest;
        reversed.reverse();
        prop_assert_eq!(reversed, oldest);
    }
}
