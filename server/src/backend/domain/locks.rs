use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per caregiver.
///
/// Holding the guard serializes every read-modify-write of that caregiver's
/// program state; different caregivers never wait on each other.
#[derive(Clone, Default)]
pub struct CaregiverLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl CaregiverLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, caregiver_id: &str) -> OwnedMutexGuard<()> {
        // The map entry guard must be released before awaiting the mutex
        let lock = Arc::clone(&self.locks.entry(caregiver_id.to_string()).or_default());
        lock.lock_owned().await
    }
}
