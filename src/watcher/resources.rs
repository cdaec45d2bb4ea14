// Resource registry - watchers handed out to callers by id until released

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use super::NotifyWatcher;

pub type SharedWatcher = Arc<NotifyWatcher>;

/// Watchers registered on behalf of remote callers. Every registered watcher
/// runs until `stop` or `stop_all` releases it.
#[derive(Debug, Default)]
pub struct Resources {
    next_id: AtomicU64,
    watchers: Mutex<HashMap<String, SharedWatcher>>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    fn watchers(&self) -> MutexGuard<'_, HashMap<String, SharedWatcher>> {
        // A panic while holding the map cannot leave it half-updated.
        self.watchers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Takes ownership of the watcher and returns its id.
    pub fn register(&self, watcher: NotifyWatcher) -> String {
        let id = (self.next_id.fetch_add(1, Ordering::Relaxed) + 1).to_string();
        self.watchers().insert(id.clone(), Arc::new(watcher));
        debug!(resource_id = %id, "registered watcher");
        id
    }

    pub fn get(&self, id: &str) -> Option<SharedWatcher> {
        self.watchers().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.watchers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.watchers().is_empty()
    }

    /// Releases one watcher, waking any caller blocked on it. Returns false
    /// for an unknown id.
    pub async fn stop(&self, id: &str) -> bool {
        let removed = self.watchers().remove(id);
        match removed {
            Some(watcher) => {
                watcher.stop().await;
                debug!(resource_id = %id, "stopped watcher");
                true
            }
            None => false,
        }
    }

    pub async fn stop_all(&self) {
        let drained: Vec<(String, SharedWatcher)> = self.watchers().drain().collect();
        let count = drained.len();
        for (_, watcher) in drained {
            watcher.stop().await;
        }
        if count > 0 {
            info!(count, "stopped all watchers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::change_feed;
    use std::time::Duration;

    async fn watcher() -> (crate::watcher::FeedSender, NotifyWatcher) {
        let (tx, feed) = change_feed();
        tx.notify();
        (tx, NotifyWatcher::start(feed).await.unwrap())
    }

    #[tokio::test]
    async fn test_register_assigns_distinct_ids() {
        let resources = Resources::new();
        let (_a, first) = watcher().await;
        let (_b, second) = watcher().await;
        let id1 = resources.register(first);
        let id2 = resources.register(second);
        assert_ne!(id1, id2);
        assert_eq!(resources.len(), 2);
        assert!(resources.get(&id1).is_some());
        assert!(resources.get("nope").is_none());
    }

    #[tokio::test]
    async fn test_stop_releases_watcher_and_its_feed() {
        let resources = Resources::new();
        let (tx, w) = watcher().await;
        let id = resources.register(w);

        assert!(resources.stop(&id).await);
        assert!(!resources.stop(&id).await);
        assert!(resources.is_empty());
        tokio::task::yield_now().await;
        assert!(!tx.notify());
    }

    #[tokio::test]
    async fn test_stop_all() {
        let resources = Resources::new();
        let (tx1, w1) = watcher().await;
        let (tx2, w2) = watcher().await;
        resources.register(w1);
        resources.register(w2);

        resources.stop_all().await;
        assert!(resources.is_empty());
        assert!(tx1.is_closed());
        assert!(tx2.is_closed());
    }

    #[tokio::test]
    async fn test_stop_while_caller_is_waiting() {
        let resources = Resources::new();
        let (tx, w) = watcher().await;
        let id = resources.register(w);
        let waiting = resources.get(&id).unwrap();
        let waiter = tokio::spawn(async move { waiting.next().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let stopped = tokio::time::timeout(Duration::from_secs(2), resources.stop(&id))
            .await
            .expect("stop blocked by a pending next");
        assert!(stopped);

        let woken = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(woken, None);
        assert!(tx.is_closed());
        assert!(resources.is_empty());
    }
}
