//! Drives queue items through the server: resolve, convert, fetch.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use super::api::ApiClient;
use super::error::ClientError;
use super::events::StreamEvent;
use crate::conversion::sanitize_filename;
use crate::link::LinkRules;
use crate::metadata::ResolvedMetadata;
use crate::queue::{
    InsertOutcome, NewItem, QueueError, QueueItem, QueueStatus, QueueStore, QueueView,
};

pub const DEFAULT_BATCH_PAUSE: Duration = Duration::from_secs(1);

/// User actions on the queue.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueCommand {
    Add { url: String },
    Download { id: u64 },
    DownloadAll,
    DownloadCompleted { dest: PathBuf },
    Remove { id: u64 },
    Clear { confirmed: bool },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug)]
pub enum CommandOutcome {
    Added(InsertOutcome),
    Finished { id: u64, status: QueueStatus },
    Batch(BatchReport),
    Saved(Vec<PathBuf>),
    Removed(QueueItem),
    Cleared(usize),
}

pub struct QueueDriver {
    api: ApiClient,
    store: QueueStore,
    rules: LinkRules,
    batch_pause: Duration,
}

impl QueueDriver {
    pub fn new(api: ApiClient, store: QueueStore, rules: LinkRules) -> Self {
        Self {
            api,
            store,
            rules,
            batch_pause: DEFAULT_BATCH_PAUSE,
        }
    }

    pub fn with_batch_pause(mut self, pause: Duration) -> Self {
        self.batch_pause = pause;
        self
    }

    pub fn store(&self) -> &QueueStore {
        &self.store
    }

    pub fn view(&self) -> QueueView {
        QueueView::of(&self.store)
    }

    pub async fn dispatch(&mut self, command: QueueCommand) -> Result<CommandOutcome, ClientError> {
        match command {
            QueueCommand::Add { url } => self.submit(&url).await.map(CommandOutcome::Added),
            QueueCommand::Download { id } => {
                let status = self.download(id).await?;
                Ok(CommandOutcome::Finished { id, status })
            }
            QueueCommand::DownloadAll => self.download_all().await.map(CommandOutcome::Batch),
            QueueCommand::DownloadCompleted { dest } => self
                .download_completed(&dest)
                .await
                .map(CommandOutcome::Saved),
            QueueCommand::Remove { id } => Ok(CommandOutcome::Removed(self.store.remove(id)?)),
            QueueCommand::Clear { confirmed } => {
                Ok(CommandOutcome::Cleared(self.store.clear(confirmed)?))
            }
        }
    }

    /// Queues a link, expanding collections into their members.
    ///
    /// Duplicates are rejected before the server is contacted; when
    /// resolution fails the link is still queued without metadata.
    pub async fn submit(&mut self, raw: &str) -> Result<InsertOutcome, ClientError> {
        let url = self.rules.validate(Some(raw))?.to_string();
        if self.store.contains_url(&url) {
            return Err(QueueError::DuplicateUrl(url).into());
        }

        let outcome = match self.api.track_info(&url).await {
            Ok(ResolvedMetadata::Single(item)) => {
                let id = self.store.insert(NewItem::from_resolved(&item, None))?;
                InsertOutcome {
                    added: vec![id],
                    skipped_duplicates: 0,
                }
            }
            Ok(ResolvedMetadata::Collection(collection)) => {
                info!(
                    "Expanding {} with {} members",
                    collection.display_title(),
                    collection.count
                );
                self.store
                    .insert_many(NewItem::from_collection(&collection))?
            }
            Err(e) => {
                warn!("Could not fetch track info for {}: {}", url, e);
                let id = self.store.insert(NewItem::bare(url))?;
                InsertOutcome {
                    added: vec![id],
                    skipped_duplicates: 0,
                }
            }
        };
        Ok(outcome)
    }

    /// Converts one item, following its progress stream to the end.
    pub async fn download(&mut self, id: u64) -> Result<QueueStatus, ClientError> {
        let url = self
            .store
            .get(id)
            .map(|item| item.url.clone())
            .ok_or(QueueError::NotFound(id))?;
        self.store.begin_download(id)?;

        let mut subscription = match self.api.subscribe_progress(&url).await {
            Ok(subscription) => subscription,
            Err(ClientError::Server { message, .. }) => {
                self.store.fail(id, message)?;
                return Ok(QueueStatus::Error);
            }
            Err(e) => {
                warn!("Could not open progress stream for item {}: {}", id, e);
                self.store.fail_transport(id)?;
                return Ok(QueueStatus::Error);
            }
        };

        loop {
            match subscription.next_event().await {
                Ok(Some(StreamEvent::Progress(update))) => {
                    self.store
                        .record_progress(id, update.percent, update.message)?;
                }
                Ok(Some(StreamEvent::Completed { filename, title })) => {
                    info!("Item {} completed as {}", id, filename);
                    self.store.complete(id, filename, title)?;
                    return Ok(QueueStatus::Completed);
                }
                Ok(Some(StreamEvent::Failed { error })) => {
                    warn!("Item {} failed: {}", id, error);
                    self.store.fail(id, error)?;
                    return Ok(QueueStatus::Error);
                }
                Ok(None) | Err(_) => {
                    warn!("Progress stream for item {} dropped", id);
                    self.store.fail_transport(id)?;
                    return Ok(QueueStatus::Error);
                }
            }
        }
    }

    /// Converts every pending item, one at a time.
    pub async fn download_all(&mut self) -> Result<BatchReport, ClientError> {
        self.store.begin_batch()?;
        let result = self.run_batch().await;
        self.store.end_batch();
        result
    }

    async fn run_batch(&mut self) -> Result<BatchReport, ClientError> {
        let ids = self.store.ids_with_status(QueueStatus::Pending);
        info!("Downloading {} pending items", ids.len());

        let mut report = BatchReport::default();
        for (index, id) in ids.into_iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.batch_pause).await;
            }
            match self.download(id).await? {
                QueueStatus::Completed => report.completed += 1,
                _ => report.failed += 1,
            }
        }
        Ok(report)
    }

    /// Saves every completed artifact under `dest` as `<title>.mp3`.
    pub async fn download_completed(&mut self, dest: &Path) -> Result<Vec<PathBuf>, ClientError> {
        tokio::fs::create_dir_all(dest).await?;

        let completed: Vec<(String, String)> = self
            .store
            .items()
            .iter()
            .filter(|item| item.status == QueueStatus::Completed)
            .filter_map(|item| {
                let filename = item.filename.clone()?;
                Some((filename, local_name(item)))
            })
            .collect();

        let mut saved = Vec::new();
        for (filename, name) in completed {
            let target = dest.join(name);
            match self.api.fetch_artifact(&filename, &target).await {
                Ok(bytes) => {
                    info!("Saved {} ({} bytes)", target.display(), bytes);
                    saved.push(target);
                }
                Err(e) => warn!("Could not fetch {}: {}", filename, e),
            }
        }
        Ok(saved)
    }
}

fn local_name(item: &QueueItem) -> String {
    let stem = sanitize_filename(item.display_title());
    if stem.is_empty() {
        item.filename.clone().unwrap_or_else(|| "track.mp3".to_string())
    } else {
        format!("{}.mp3", stem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MemoryBackend;

    fn driver() -> QueueDriver {
        // Nothing listens on port 9; every request fails to connect.
        let api = ApiClient::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let store = QueueStore::open(Box::new(MemoryBackend::default())).unwrap();
        QueueDriver::new(api, store, LinkRules::default()).with_batch_pause(Duration::ZERO)
    }

    #[test]
    fn local_names_follow_the_title() {
        let mut item = QueueItem::new(1, NewItem::bare("https://soundcloud.com/a/b"));
        item.title = Some("Alice - Song".to_string());
        item.filename = Some("Alice_-_Song.mp3".to_string());
        assert_eq!(local_name(&item), "Alice_-_Song.mp3");

        item.title = Some("???".to_string());
        assert_eq!(local_name(&item), "Alice_-_Song.mp3");
    }

    #[tokio::test]
    async fn foreign_links_are_rejected_locally() {
        let mut driver = driver();
        let err = driver.submit("https://example.com/a/b").await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        assert!(driver.store().is_empty());
    }

    #[tokio::test]
    async fn unreachable_server_still_queues_then_fails_with_connection_error() {
        let mut driver = driver();
        let url = "https://soundcloud.com/alice/song";

        let outcome = driver.submit(url).await.unwrap();
        assert_eq!(outcome.added, vec![1]);
        assert_eq!(driver.store().get(1).unwrap().status, QueueStatus::Pending);

        let dup = driver.submit(url).await.unwrap_err();
        assert!(matches!(dup, ClientError::Queue(QueueError::DuplicateUrl(_))));
        assert_eq!(driver.store().len(), 1);

        let report = driver.download_all().await.unwrap();
        assert_eq!(report, BatchReport { completed: 0, failed: 1 });
        let item = driver.store().get(1).unwrap();
        assert_eq!(item.status, QueueStatus::Error);
        assert_eq!(item.error.as_deref(), Some("Connection error"));
        assert!(!driver.store().is_batch_running());
    }

    #[tokio::test]
    async fn commands_route_to_the_store() {
        let mut driver = driver();
        driver.submit("https://soundcloud.com/a/one").await.unwrap();
        driver.submit("https://soundcloud.com/a/two").await.unwrap();

        let removed = driver.dispatch(QueueCommand::Remove { id: 1 }).await.unwrap();
        assert!(matches!(removed, CommandOutcome::Removed(item) if item.id == 1));

        let refused = driver
            .dispatch(QueueCommand::Clear { confirmed: false })
            .await
            .unwrap_err();
        assert!(matches!(refused, ClientError::Queue(QueueError::ClearNotConfirmed)));

        let cleared = driver
            .dispatch(QueueCommand::Clear { confirmed: true })
            .await
            .unwrap();
        assert!(matches!(cleared, CommandOutcome::Cleared(1)));
        assert_eq!(driver.view().download_all.label, "Download all");
    }
}
