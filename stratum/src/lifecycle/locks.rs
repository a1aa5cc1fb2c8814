//! Per-container serialization (spec §5: "operations against the same
//! container serialize through a per-container lock; operations against
//! distinct containers proceed concurrently").

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct ContainerLocks {
    table: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ContainerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `id`, creating its entry on first use. The
    /// table itself is guarded by a short-lived std mutex since inserting
    /// an `Arc` is never contended long enough to justify an async lock.
    pub async fn acquire(&self, id: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut table = self.table.lock().unwrap();
            table.entry(id.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
        };
        entry.lock_owned().await
    }

    /// Drop the table entry for a removed container so the map doesn't
    /// grow without bound over a long-running daemon's lifetime.
    pub fn forget(&self, id: &str) {
        self.table.lock().unwrap().remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn distinct_containers_do_not_contend() {
        let locks = ContainerLocks::new();
        let _a = locks.acquire("one").await;
        let _b = locks.acquire("two").await;
    }

    #[tokio::test]
    async fn forgetting_an_id_drops_its_entry() {
        let locks = ContainerLocks::new();
        {
            let _guard = locks.acquire("one").await;
        }
        locks.forget("one");
        assert!(locks.table.lock().unwrap().is_empty());
    }
}
