//! The client queue and its per-item state machine.

use thiserror::Error;
use tracing::{debug, info, warn};

use super::models::{NewItem, QueueItem, QueueSnapshot, QueueStatus};
use super::persistence::QueueBackend;

pub const STARTING_MESSAGE: &str = "Starting download...";
pub const TRANSPORT_ERROR_MESSAGE: &str = "Connection error";
const INTERRUPTED_MESSAGE: &str = "Interrupted before completion";

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("URL already in queue: {0}")]
    DuplicateUrl(String),

    #[error("no queue item with id {0}")]
    NotFound(u64),

    #[error("item {id} cannot go from {from} to {to}")]
    InvalidTransition {
        id: u64,
        from: QueueStatus,
        to: QueueStatus,
    },

    #[error("a download-all batch is already running")]
    BatchInProgress,

    #[error("clearing the queue requires confirmation")]
    ClearNotConfirmed,

    #[error("failed to persist queue: {0:#}")]
    Persistence(anyhow::Error),
}

/// Result of inserting several items at once.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    pub added: Vec<u64>,
    pub skipped_duplicates: usize,
}

pub struct QueueStore {
    backend: Box<dyn QueueBackend>,
    snapshot: QueueSnapshot,
    batch_running: bool,
}

impl QueueStore {
    /// Loads the queue; items left downloading by a previous session become errors.
    pub fn open(backend: Box<dyn QueueBackend>) -> Result<Self, QueueError> {
        let mut snapshot = backend.load().map_err(QueueError::Persistence)?;
        let mut interrupted = 0;
        for item in snapshot
            .items
            .iter_mut()
            .filter(|i| i.status == QueueStatus::Downloading)
        {
            item.status = QueueStatus::Error;
            item.error = Some(INTERRUPTED_MESSAGE.to_string());
            item.filename = None;
            item.progress = Some(0);
            item.progress_message = None;
            interrupted += 1;
        }
        if let Some(max_id) = snapshot.items.iter().map(|i| i.id).max() {
            snapshot.next_id = snapshot.next_id.max(max_id + 1);
        }

        let store = Self {
            backend,
            snapshot,
            batch_running: false,
        };
        if interrupted > 0 {
            warn!("Marked {} interrupted downloads as failed", interrupted);
            store.persist()?;
        }
        debug!("Opened queue with {} items", store.len());
        Ok(store)
    }

    fn persist(&self) -> Result<(), QueueError> {
        self.backend
            .save(&self.snapshot)
            .map_err(QueueError::Persistence)
    }

    /// Applies `change` to a copy of the queue and adopts it only once saved.
    fn commit<T>(
        &mut self,
        change: impl FnOnce(&mut QueueSnapshot) -> Result<T, QueueError>,
    ) -> Result<T, QueueError> {
        let mut staged = self.snapshot.clone();
        let value = change(&mut staged)?;
        self.backend.save(&staged).map_err(QueueError::Persistence)?;
        self.snapshot = staged;
        Ok(value)
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.snapshot.items
    }

    pub fn get(&self, id: u64) -> Option<&QueueItem> {
        self.snapshot.items.iter().find(|i| i.id == id)
    }

    pub fn len(&self) -> usize {
        self.snapshot.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.items.is_empty()
    }

    pub fn next_id(&self) -> u64 {
        self.snapshot.next_id
    }

    pub fn contains_url(&self, url: &str) -> bool {
        self.snapshot.items.iter().any(|i| i.url == url)
    }

    pub fn ids_with_status(&self, status: QueueStatus) -> Vec<u64> {
        self.snapshot
            .items
            .iter()
            .filter(|i| i.status == status)
            .map(|i| i.id)
            .collect()
    }

    pub fn is_batch_running(&self) -> bool {
        self.batch_running
    }

    /// Appends a `pending` item, rejecting urls already queued.
    pub fn insert(&mut self, item: NewItem) -> Result<u64, QueueError> {
        if self.contains_url(&item.url) {
            return Err(QueueError::DuplicateUrl(item.url));
        }
        let id = self.commit(|snapshot| Ok(push(snapshot, item)))?;
        info!("Queued item {}", id);
        Ok(id)
    }

    /// Appends every item whose url is not queued yet, in order.
    pub fn insert_many(&mut self, items: Vec<NewItem>) -> Result<InsertOutcome, QueueError> {
        let mut fresh = Vec::with_capacity(items.len());
        let mut skipped_duplicates = 0;
        for item in items {
            if self.contains_url(&item.url) || fresh.iter().any(|f: &NewItem| f.url == item.url) {
                skipped_duplicates += 1;
            } else {
                fresh.push(item);
            }
        }
        let added: Vec<u64> = if fresh.is_empty() {
            Vec::new()
        } else {
            self.commit(|snapshot| {
                Ok(fresh
                    .into_iter()
                    .map(|item| push(snapshot, item))
                    .collect())
            })?
        };
        info!(
            "Queued {} items, skipped {} duplicates",
            added.len(),
            skipped_duplicates
        );
        Ok(InsertOutcome {
            added,
            skipped_duplicates,
        })
    }

    /// Moves an idle or finished item into `downloading`.
    pub fn begin_download(&mut self, id: u64) -> Result<(), QueueError> {
        self.commit(|snapshot| {
            let item = item_mut(snapshot, id)?;
            if item.status == QueueStatus::Downloading {
                return Err(QueueError::InvalidTransition {
                    id,
                    from: item.status,
                    to: QueueStatus::Downloading,
                });
            }
            item.status = QueueStatus::Downloading;
            item.progress = Some(0);
            item.progress_message = Some(STARTING_MESSAGE.to_string());
            item.error = None;
            item.filename = None;
            Ok(())
        })
    }

    /// Transient progress; kept in memory only.
    pub fn record_progress(
        &mut self,
        id: u64,
        percent: u8,
        message: impl Into<String>,
    ) -> Result<(), QueueError> {
        let item = downloading_mut(&mut self.snapshot, id, QueueStatus::Downloading)?;
        item.progress = Some(percent.min(100));
        item.progress_message = Some(message.into());
        Ok(())
    }

    pub fn complete(
        &mut self,
        id: u64,
        filename: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<(), QueueError> {
        let (filename, title) = (filename.into(), title.into());
        self.commit(|snapshot| {
            let item = downloading_mut(snapshot, id, QueueStatus::Completed)?;
            item.status = QueueStatus::Completed;
            item.filename = Some(filename);
            item.title = Some(title);
            item.error = None;
            item.progress = Some(100);
            item.progress_message = None;
            Ok(())
        })
    }

    pub fn fail(&mut self, id: u64, error: impl Into<String>) -> Result<(), QueueError> {
        let error = error.into();
        self.commit(|snapshot| {
            let item = downloading_mut(snapshot, id, QueueStatus::Error)?;
            item.status = QueueStatus::Error;
            item.error = Some(error);
            item.filename = None;
            item.progress = Some(0);
            item.progress_message = None;
            Ok(())
        })
    }

    /// The progress channel dropped before a terminal event.
    pub fn fail_transport(&mut self, id: u64) -> Result<(), QueueError> {
        self.fail(id, TRANSPORT_ERROR_MESSAGE)
    }

    pub fn remove(&mut self, id: u64) -> Result<QueueItem, QueueError> {
        self.commit(|snapshot| {
            let pos = snapshot
                .items
                .iter()
                .position(|i| i.id == id)
                .ok_or(QueueError::NotFound(id))?;
            Ok(snapshot.items.remove(pos))
        })
    }

    /// Empties the queue; the id counter keeps counting.
    pub fn clear(&mut self, confirmed: bool) -> Result<usize, QueueError> {
        if !confirmed {
            return Err(QueueError::ClearNotConfirmed);
        }
        self.commit(|snapshot| {
            let removed = snapshot.items.len();
            snapshot.items.clear();
            Ok(removed)
        })
    }

    pub fn begin_batch(&mut self) -> Result<(), QueueError> {
        if self.batch_running {
            return Err(QueueError::BatchInProgress);
        }
        self.batch_running = true;
        Ok(())
    }

    pub fn end_batch(&mut self) {
        self.batch_running = false;
    }
}

fn push(snapshot: &mut QueueSnapshot, item: NewItem) -> u64 {
    let id = snapshot.next_id;
    snapshot.next_id += 1;
    snapshot.items.push(QueueItem::new(id, item));
    id
}

fn item_mut(snapshot: &mut QueueSnapshot, id: u64) -> Result<&mut QueueItem, QueueError> {
    snapshot
        .items
        .iter_mut()
        .find(|i| i.id == id)
        .ok_or(QueueError::NotFound(id))
}

fn downloading_mut(
    snapshot: &mut QueueSnapshot,
    id: u64,
    to: QueueStatus,
) -> Result<&mut QueueItem, QueueError> {
    let item = item_mut(snapshot, id)?;
    if item.status != QueueStatus::Downloading {
        return Err(QueueError::InvalidTransition {
            id,
            from: item.status,
            to,
        });
    }
    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::persistence::MemoryBackend;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Lets a test inspect what the store saved.
    struct SharedBackend(Arc<MemoryBackend>);

    impl QueueBackend for SharedBackend {
        fn load(&self) -> anyhow::Result<QueueSnapshot> {
            self.0.load()
        }

        fn save(&self, snapshot: &QueueSnapshot) -> anyhow::Result<()> {
            self.0.save(snapshot)
        }
    }

    /// Refuses to save while `broken` is set.
    #[derive(Default)]
    struct FlakyBackend {
        inner: MemoryBackend,
        broken: AtomicBool,
    }

    impl QueueBackend for Arc<FlakyBackend> {
        fn load(&self) -> anyhow::Result<QueueSnapshot> {
            self.inner.load()
        }

        fn save(&self, snapshot: &QueueSnapshot) -> anyhow::Result<()> {
            if self.broken.load(Ordering::SeqCst) {
                anyhow::bail!("disk full");
            }
            self.inner.save(snapshot)
        }
    }

    fn store() -> (QueueStore, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::default());
        let store = QueueStore::open(Box::new(SharedBackend(backend.clone()))).unwrap();
        (store, backend)
    }

    fn url(n: u32) -> String {
        format!("https://soundcloud.com/artist/song-{}", n)
    }

    #[test]
    fn duplicate_urls_are_rejected() {
        let (mut store, _) = store();
        store.insert(NewItem::bare(url(1))).unwrap();
        let err = store.insert(NewItem::bare(url(1))).unwrap_err();
        assert!(matches!(err, QueueError::DuplicateUrl(_)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn insert_many_skips_known_urls() {
        let (mut store, _) = store();
        store.insert(NewItem::bare(url(2))).unwrap();
        let outcome = store
            .insert_many(vec![
                NewItem::bare(url(1)),
                NewItem::bare(url(2)),
                NewItem::bare(url(3)),
                NewItem::bare(url(1)),
            ])
            .unwrap();
        assert_eq!(outcome.added, vec![2, 3]);
        assert_eq!(outcome.skipped_duplicates, 2);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn full_lifecycle_keeps_terminal_fields_exclusive() {
        let (mut store, backend) = store();
        let id = store.insert(NewItem::bare(url(1))).unwrap();

        store.begin_download(id).unwrap();
        assert_eq!(store.get(id).unwrap().progress, Some(0));
        store.record_progress(id, 63, "Downloading... 55.0%").unwrap();
        assert_eq!(
            backend.saved().unwrap().items[0].progress,
            Some(0),
            "progress ticks are not persisted"
        );

        store.fail(id, "download process exited with code 1").unwrap();
        let item = store.get(id).unwrap();
        assert_eq!(item.status, QueueStatus::Error);
        assert_eq!(item.progress, Some(0));
        assert!(item.filename.is_none());

        store.begin_download(id).unwrap();
        store.complete(id, "Song.mp3", "Artist - Song").unwrap();
        let item = store.get(id).unwrap();
        assert_eq!(item.status, QueueStatus::Completed);
        assert_eq!(item.filename.as_deref(), Some("Song.mp3"));
        assert!(item.error.is_none());
        assert_eq!(item.progress, Some(100));
    }

    #[test]
    fn rejects_invalid_transitions() {
        let (mut store, _) = store();
        let id = store.insert(NewItem::bare(url(1))).unwrap();
        assert!(matches!(
            store.complete(id, "x.mp3", "x"),
            Err(QueueError::InvalidTransition { .. })
        ));
        store.begin_download(id).unwrap();
        assert!(matches!(
            store.begin_download(id),
            Err(QueueError::InvalidTransition { .. })
        ));
        assert!(matches!(
            store.record_progress(99, 1, "x"),
            Err(QueueError::NotFound(99))
        ));
    }

    #[test]
    fn transport_failure_uses_connection_error() {
        let (mut store, _) = store();
        let id = store.insert(NewItem::bare(url(1))).unwrap();
        store.begin_download(id).unwrap();
        store.fail_transport(id).unwrap();
        assert_eq!(
            store.get(id).unwrap().error.as_deref(),
            Some(TRANSPORT_ERROR_MESSAGE)
        );
    }

    #[test]
    fn removal_keeps_other_ids() {
        let (mut store, _) = store();
        for n in 1..=4 {
            store.insert(NewItem::bare(url(n))).unwrap();
        }
        store.remove(2).unwrap();
        let ids: Vec<u64> = store.items().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 3, 4]);
        assert!(matches!(store.remove(2), Err(QueueError::NotFound(2))));
    }

    #[test]
    fn clear_needs_confirmation_and_keeps_counter() {
        let (mut store, backend) = store();
        store.insert(NewItem::bare(url(1))).unwrap();
        store.insert(NewItem::bare(url(2))).unwrap();

        assert!(matches!(store.clear(false), Err(QueueError::ClearNotConfirmed)));
        assert_eq!(store.clear(true).unwrap(), 2);
        assert!(store.is_empty());
        assert_eq!(store.next_id(), 3);
        assert_eq!(backend.saved().unwrap().next_id, 3);

        assert_eq!(store.insert(NewItem::bare(url(1))).unwrap(), 3);
    }

    #[test]
    fn reopening_fails_interrupted_downloads() {
        let mut downloading = QueueItem::new(5, NewItem::bare(url(5)));
        downloading.status = QueueStatus::Downloading;
        downloading.progress = Some(40);
        let backend = MemoryBackend::with_snapshot(QueueSnapshot {
            items: vec![downloading, QueueItem::new(6, NewItem::bare(url(6)))],
            next_id: 2,
        });

        let store = QueueStore::open(Box::new(backend)).unwrap();
        let item = store.get(5).unwrap();
        assert_eq!(item.status, QueueStatus::Error);
        assert_eq!(item.error.as_deref(), Some(INTERRUPTED_MESSAGE));
        assert_eq!(store.get(6).unwrap().status, QueueStatus::Pending);
        assert_eq!(store.next_id(), 7);
    }

    #[test]
    fn batches_do_not_nest() {
        let (mut store, _) = store();
        store.begin_batch().unwrap();
        assert!(matches!(store.begin_batch(), Err(QueueError::BatchInProgress)));
        store.end_batch();
        assert!(store.begin_batch().is_ok());
    }

    #[test]
    fn failed_saves_leave_the_queue_untouched() {
        let backend = Arc::new(FlakyBackend::default());
        let mut store = QueueStore::open(Box::new(backend.clone())).unwrap();
        let id = store.insert(NewItem::bare(url(1))).unwrap();
        backend.broken.store(true, Ordering::SeqCst);

        let err = store.insert(NewItem::bare(url(2))).unwrap_err();
        assert!(matches!(err, QueueError::Persistence(_)));
        assert_eq!(store.len(), 1);
        assert_eq!(store.next_id(), 2);

        assert!(store.begin_download(id).is_err());
        assert_eq!(store.get(id).unwrap().status, QueueStatus::Pending);
        assert!(store.remove(id).is_err());
        assert!(store.clear(true).is_err());
        assert_eq!(store.len(), 1);

        backend.broken.store(false, Ordering::SeqCst);
        store.begin_download(id).unwrap();
        assert_eq!(
            backend.inner.saved().unwrap().items[0].status,
            QueueStatus::Downloading
        );
    }
}
