//! In-flight registry for auto-bind runs
//!
//! A task id is claimed with an atomic insert-if-absent and released when
//! the returned guard drops, so a panic or early return never leaks a claim.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct InFlightRegistry {
    running: Arc<DashMap<i64, ()>>,
}

/// Claim on a task id; released on drop
#[derive(Debug)]
pub struct InFlightGuard {
    running: Arc<DashMap<i64, ()>>,
    task_id: i64,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `task_id`; `None` when another run already holds it
    pub fn try_acquire(&self, task_id: i64) -> Option<InFlightGuard> {
        match self.running.entry(task_id) {
            Entry::Occupied(_) => {
                debug!(task_id, "Task already in flight");
                None
            }
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(InFlightGuard {
                    running: Arc::clone(&self.running),
                    task_id,
                })
            }
        }
    }

    pub fn contains(&self, task_id: i64) -> bool {
        self.running.contains_key(&task_id)
    }

    /// Ids currently claimed
    pub fn ids(&self) -> Vec<i64> {
        self.running.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.running.len()
    }

    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }
}

impl InFlightGuard {
    pub fn task_id(&self) -> i64 {
        self.task_id
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.running.remove(&self.task_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_rejected() {
        let registry = InFlightRegistry::new();

        let guard = registry.try_acquire(7).expect("first claim");
        assert!(registry.try_acquire(7).is_none());
        assert!(registry.contains(7));
        assert_eq!(guard.task_id(), 7);

        // Other ids are independent
        let other = registry.try_acquire(8);
        assert!(other.is_some());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_drop_releases_claim() {
        let registry = InFlightRegistry::new();

        {
            let _guard = registry.try_acquire(1).unwrap();
            assert_eq!(registry.ids(), vec![1]);
        }

        assert!(registry.is_empty());
        assert!(registry.try_acquire(1).is_some());
    }

    #[tokio::test]
    async fn test_concurrent_claims_admit_one() {
        let registry = InFlightRegistry::new();
        let barrier = Arc::new(tokio::sync::Barrier::new(16));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            let barrier = barrier.clone();
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                let guard = registry.try_acquire(42);
                let acquired = guard.is_some();
                // Hold the claim long enough for every contender to try
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                drop(guard);
                acquired
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert!(registry.is_empty());
    }
}
