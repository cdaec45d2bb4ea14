//! Change notification
//!
//! Backing stores publish low-level change feeds: a stream of unit events
//! whose first event describes the state at subscription time. A
//! [`NotifyWatcher`] wraps one feed, swallows that initial event and then
//! delivers at most one pending notification at a time, coalescing bursts of
//! underlying changes until the caller drains the previous one.

pub mod resources;

pub use resources::Resources;

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WatchError {
    #[error("change feed closed before initial event")]
    Closed,
    #[error("no initial event within {0:?}")]
    Timeout(Duration),
}

/// Creates a connected feed. The sender side belongs to the backing store.
pub fn change_feed() -> (FeedSender, ChangeFeed) {
    let (tx, rx) = mpsc::channel(1);
    (FeedSender { tx }, ChangeFeed { events: rx })
}

/// Producer half of a change feed.
#[derive(Debug, Clone)]
pub struct FeedSender {
    tx: mpsc::Sender<()>,
}

impl FeedSender {
    /// Signals a change. A change already pending absorbs this one.
    /// Returns false once the consumer has gone away.
    pub fn notify(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(())) => true,
            Err(mpsc::error::TrySendError::Closed(())) => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half of a change feed.
#[derive(Debug)]
pub struct ChangeFeed {
    events: mpsc::Receiver<()>,
}

impl ChangeFeed {
    /// Resolves to `None` when the producer is gone.
    pub async fn next(&mut self) -> Option<()> {
        self.events.recv().await
    }
}

/// Single-shot-then-recurring notifier over a [`ChangeFeed`].
///
/// Waiting and stopping take separate locks, so a watcher can be stopped
/// while another task is blocked in [`NotifyWatcher::next`]; that waiter
/// then resolves to `None`.
#[derive(Debug)]
pub struct NotifyWatcher {
    changes: AsyncMutex<mpsc::Receiver<()>>,
    worker: Mutex<Option<Worker>>,
}

#[derive(Debug)]
struct Worker {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl NotifyWatcher {
    /// Consumes the feed's initial event, then forwards later changes from a
    /// background task. Waits as long as the feed takes to produce it.
    pub async fn start(mut feed: ChangeFeed) -> Result<Self, WatchError> {
        feed.next().await.ok_or(WatchError::Closed)?;
        Ok(Self::spawn(feed))
    }

    pub async fn start_with_timeout(
        mut feed: ChangeFeed,
        limit: Duration,
    ) -> Result<Self, WatchError> {
        match tokio::time::timeout(limit, feed.next()).await {
            Ok(Some(())) => Ok(Self::spawn(feed)),
            Ok(None) => Err(WatchError::Closed),
            Err(_) => Err(WatchError::Timeout(limit)),
        }
    }

    fn spawn(mut feed: ChangeFeed) -> Self {
        let (tx, rx) = mpsc::channel(1);
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    event = feed.next() => match event {
                        Some(()) => {
                            if let Err(mpsc::error::TrySendError::Closed(())) = tx.try_send(()) {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
            debug!("notify watcher loop finished");
        });
        Self {
            changes: AsyncMutex::new(rx),
            worker: Mutex::new(Some(Worker {
                stop: stop_tx,
                task,
            })),
        }
    }

    fn worker(&self) -> MutexGuard<'_, Option<Worker>> {
        self.worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Waits for the next change. `None` means the watcher has stopped and
    /// no notification is pending.
    pub async fn next(&self) -> Option<()> {
        self.changes.lock().await.recv().await
    }

    /// Takes a pending notification without waiting. Returns `None` while
    /// another task is waiting in `next`.
    pub fn try_next(&self) -> Option<()> {
        self.changes.try_lock().ok()?.try_recv().ok()
    }

    /// Stops the background task and waits for it to exit. Dropping the
    /// task's sender wakes any pending `next`.
    pub async fn stop(&self) {
        let worker = self.worker().take();
        if let Some(Worker { stop, task }) = worker {
            let _ = stop.send(());
            if let Err(e) = task.await {
                debug!(error = %e, "notify watcher task ended abnormally");
            }
        }
        if let Ok(mut changes) = self.changes.try_lock() {
            changes.close();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.worker()
            .as_ref()
            .map_or(true, |worker| worker.task.is_finished())
    }
}

impl Drop for NotifyWatcher {
    fn drop(&mut self) {
        let worker = self
            .worker
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(worker) = worker {
            worker.task.abort();
        }
    }
}
