//! Per-course-instance async write locks.
//!
//! Assignment holds the lock for its course instance across check, stage and
//! commit, so two assignments to the same instance run one after the other.
//! An entry lives in the map only while some caller holds or waits for it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = HashMap<i64, Arc<AsyncMutex<()>>>;

#[derive(Debug, Default)]
pub struct InstanceLocks {
    // Never held across an await.
    locks: Mutex<LockMap>,
}

impl InstanceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, LockMap> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for exclusive access to `course_instance_id`. Released when the guard drops.
    pub async fn acquire(&self, course_instance_id: i64) -> InstanceGuard<'_> {
        let lock = Arc::clone(self.map().entry(course_instance_id).or_default());
        let guard = lock.lock_owned().await;
        InstanceGuard {
            locks: self,
            course_instance_id,
            guard: Some(guard),
        }
    }

    /// Number of instances currently locked or awaited.
    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive access to one course instance.
pub struct InstanceGuard<'a> {
    locks: &'a InstanceLocks,
    course_instance_id: i64,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for InstanceGuard<'_> {
    fn drop(&mut self) {
        // Release the instance first so the map holds the last reference when idle.
        drop(self.guard.take());
        let mut map = self.locks.map();
        if map
            .get(&self.course_instance_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(&self.course_instance_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_is_exclusive_other_keys_are_not() {
        let locks = Arc::new(InstanceLocks::new());
        let held = locks.acquire(1).await;

        // A different instance is free.
        let other = tokio::time::timeout(Duration::from_millis(50), locks.acquire(2)).await;
        assert!(other.is_ok());

        // The same instance waits until the guard is dropped.
        let blocked = tokio::time::timeout(Duration::from_millis(50), locks.acquire(1)).await;
        assert!(blocked.is_err());

        drop(held);
        let reacquired = tokio::time::timeout(Duration::from_millis(50), locks.acquire(1)).await;
        assert!(reacquired.is_ok());
    }

    #[tokio::test]
    async fn released_instances_leave_no_entries() {
        let locks = InstanceLocks::new();
        for id in 0..10_000 {
            let guard = locks.acquire(id).await;
            assert_eq!(locks.len(), 1);
            drop(guard);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn entry_survives_while_a_waiter_queues() {
        let locks = Arc::new(InstanceLocks::new());
        let held = locks.acquire(7).await;

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire(7).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(held);
        // The waiter still references the entry, so it is not removed yet.
        waiter.await.unwrap();
        assert!(locks.is_empty());
    }
}
