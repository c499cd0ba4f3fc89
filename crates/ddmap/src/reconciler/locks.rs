//! Process-wide advisory locks for kinds sharing a server-side collection.
//!
//! Hosts running several engine processes against one account must add their
//! own serialization on top.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

static GROUP_LOCKS: LazyLock<Mutex<HashMap<&'static str, Arc<AsyncMutex<()>>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// The lock shared by every kind in `group`.
pub fn group_lock(group: &'static str) -> Arc<AsyncMutex<()>> {
    let mut locks = GROUP_LOCKS.lock().unwrap_or_else(|e| e.into_inner());
    locks
        .entry(group)
        .or_insert_with(|| Arc::new(AsyncMutex::new(())))
        .clone()
}

/// Holds the group lock, if any, until the guard drops.
pub async fn acquire(group: Option<&'static str>) -> Option<OwnedMutexGuard<()>> {
    let group = group?;
    log::debug!("waiting for lock group {}", group);
    Some(group_lock(group).lock_owned().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_same_group_same_lock() {
        let a = group_lock("webhooks");
        let b = group_lock("webhooks");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &group_lock("pagerduty")));
    }

    #[tokio::test]
    #[serial]
    async fn test_acquire_excludes() {
        let guard = acquire(Some("logs_indexes")).await;
        assert!(guard.is_some());
        assert!(group_lock("logs_indexes").try_lock().is_err());
        drop(guard);
        assert!(group_lock("logs_indexes").try_lock().is_ok());
        assert!(acquire(None).await.is_none());
    }
}
