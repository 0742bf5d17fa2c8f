use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::extract::ItemExtractor;
use crate::models::Snapshot;
use crate::renderer::PageRenderer;
use crate::utils::error::{AppError, Result};

/// A live registration for snapshot broadcasts. Dropping the handle (or
/// calling [`ItemStore::unsubscribe`] with its id) ends delivery; other
/// registrations are never affected.
pub struct Subscription {
    id: Uuid,
    rx: mpsc::Receiver<Snapshot>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Waits for the next broadcast snapshot. Returns `None` once the
    /// subscription has been removed and all pending deliveries drained.
    pub async fn recv(&mut self) -> Option<Snapshot> {
        self.rx.recv().await
    }
}

struct RefreshWorker {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Owns the ranked snapshot and the refresh cycle that produces it.
///
/// One background worker per store refreshes the snapshot on a fixed period;
/// any number of concurrent callers may read [`items`](Self::items),
/// [`subscribe`](Self::subscribe) and [`unsubscribe`](Self::unsubscribe)
/// while it runs. Constructed once per process and passed by reference to
/// every interface boundary.
pub struct ItemStore {
    extractor: ItemExtractor,
    snapshot_tx: watch::Sender<Snapshot>,
    snapshot_rx: watch::Receiver<Snapshot>,
    subscribers: Mutex<HashMap<Uuid, mpsc::Sender<Snapshot>>>,
    worker: Mutex<Option<RefreshWorker>>,
}

impl Default for ItemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemStore {
    pub fn new() -> Self {
        let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot::default());
        ItemStore {
            extractor: ItemExtractor::new(),
            snapshot_tx,
            snapshot_rx,
            subscribers: Mutex::new(HashMap::new()),
            worker: Mutex::new(None),
        }
    }

    /// Runs one immediate refresh so the first read returns real data, then
    /// launches the periodic worker. Errors if the store is already running.
    ///
    /// The worker owns the renderer; it is released before [`stop`](Self::stop)
    /// returns.
    pub async fn start(
        self: &Arc<Self>,
        renderer: Box<dyn PageRenderer>,
        period: Duration,
        pages: u32,
    ) -> Result<()> {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            return Err(AppError::AlreadyRunning);
        }

        info!("item store starting, initial refresh");
        self.refresh(renderer.as_ref(), pages).await;

        let store = Arc::clone(self);
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(period) => {
                        store.refresh(renderer.as_ref(), pages).await;
                    }
                    _ = &mut stop_rx => {
                        break;
                    }
                }
            }
            drop(renderer);
            info!("item store refresh worker exiting");
        });
        *worker = Some(RefreshWorker {
            stop: stop_tx,
            handle,
        });

        Ok(())
    }

    /// Signals the worker and waits for it to confirm exit. Any in-flight
    /// cycle runs to completion (including delivery) and the renderer is
    /// released before this returns; no further cycle starts.
    pub async fn stop(&self) {
        let worker = self.worker.lock().await.take();
        if let Some(RefreshWorker { stop, handle }) = worker {
            let _ = stop.send(());
            if let Err(e) = handle.await {
                error!("refresh worker did not shut down cleanly: {e}");
            }
        }
    }

    /// The current snapshot. Never suspends, never observes a partially
    /// built list.
    pub fn items(&self) -> Snapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Registers a new observer for future snapshot broadcasts.
    ///
    /// Delivery is blocking by choice: each sink holds one undelivered
    /// snapshot and the refresh cycle waits until every sink has accepted the
    /// new one, so an observer that stops draining delays the next cycle
    /// rather than silently missing updates. A subscription created while a
    /// cycle is in flight only receives cycles that start afterwards.
    pub async fn subscribe(&self) -> Subscription {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(1);
        self.subscribers.lock().await.insert(id, tx);
        debug!("registered subscriber {id}");
        Subscription { id, rx }
    }

    /// Removes a registration by key. Removing an unknown or already removed
    /// id is a no-op.
    pub async fn unsubscribe(&self, id: Uuid) {
        if self.subscribers.lock().await.remove(&id).is_some() {
            debug!("removed subscriber {id}");
        }
    }

    /// One refresh cycle: render and extract every configured page, publish
    /// the re-ranked snapshot, deliver it to the sinks registered when the
    /// cycle began. A failed page is skipped so partial results still
    /// publish; a cycle where every page fails publishes whatever is left
    /// (possibly nothing) and is reported, not raised.
    async fn refresh(&self, renderer: &dyn PageRenderer, pages: u32) {
        debug!("item store refreshing");
        let sinks: Vec<(Uuid, mpsc::Sender<Snapshot>)> = self
            .subscribers
            .lock()
            .await
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut items = Vec::new();
        let mut failed_pages = 0u32;
        for page in 1..=pages {
            match renderer.render(page).await {
                Ok(markup) => items.extend(self.extractor.extract(&markup)),
                Err(e) => {
                    warn!("skipping results page {page}: {e}");
                    failed_pages += 1;
                }
            }
        }
        if pages > 0 && failed_pages == pages {
            error!("every results page failed this cycle, publishing degraded snapshot");
        }

        // Stable sort keeps discovery order among equal prices, so identical
        // inputs always publish identical snapshots
        items.sort_by(|a, b| a.price_per_terabyte.cmp(&b.price_per_terabyte));
        let snapshot: Snapshot = Arc::new(items);
        self.snapshot_tx.send_replace(snapshot.clone());
        info!("item store refreshed with {} items", snapshot.len());

        self.broadcast(sinks, snapshot).await;
    }

    /// Delivers `snapshot` to each sink in turn, waiting for every sink to
    /// accept it. Sinks whose receiver has gone away are pruned.
    async fn broadcast(&self, sinks: Vec<(Uuid, mpsc::Sender<Snapshot>)>, snapshot: Snapshot) {
        let mut dead = Vec::new();
        for (id, tx) in sinks {
            if tx.send(snapshot.clone()).await.is_err() {
                dead.push(id);
            }
        }
        if !dead.is_empty() {
            let mut subscribers = self.subscribers.lock().await;
            for id in dead {
                if subscribers.remove(&id).is_some() {
                    debug!("pruned disconnected subscriber {id}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct NoopRenderer;

    #[async_trait]
    impl PageRenderer for NoopRenderer {
        async fn render(&self, page: u32) -> Result<String> {
            Err(AppError::render(page, "no pages in this test"))
        }
    }

    #[tokio::test]
    async fn test_double_start_is_rejected() {
        let store = Arc::new(ItemStore::new());
        store
            .start(Box::new(NoopRenderer), Duration::from_secs(600), 1)
            .await
            .unwrap();
        let second = store
            .start(Box::new(NoopRenderer), Duration::from_secs(600), 1)
            .await;
        assert!(matches!(second, Err(AppError::AlreadyRunning)));
        store.stop().await;
    }

    #[tokio::test]
    async fn test_stop_without_running_worker_is_a_noop() {
        let store = ItemStore::new();
        store.stop().await;
        assert!(store.items().is_empty());
    }

    #[tokio::test]
    async fn test_unsubscribe_unknown_id_is_a_noop() {
        let store = ItemStore::new();
        store.unsubscribe(Uuid::new_v4()).await;

        let sub = store.subscribe().await;
        store.unsubscribe(Uuid::new_v4()).await;
        assert_eq!(store.subscribers.lock().await.len(), 1);
        store.unsubscribe(sub.id()).await;
        assert!(store.subscribers.lock().await.is_empty());
    }
}
