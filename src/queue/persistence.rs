//! Queue persistence backends.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;

use super::models::QueueSnapshot;

/// Storage for the queue between sessions.
pub trait QueueBackend: Send {
    /// Returns an empty snapshot when nothing was saved yet.
    fn load(&self) -> Result<QueueSnapshot>;

    fn save(&self, snapshot: &QueueSnapshot) -> Result<()>;
}

/// Flat JSON file, replaced atomically on every save.
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl QueueBackend for JsonFileBackend {
    fn load(&self) -> Result<QueueSnapshot> {
        if !self.path.exists() {
            return Ok(QueueSnapshot::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read queue file: {:?}", self.path))?;
        if content.trim().is_empty() {
            return Ok(QueueSnapshot::default());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse queue file: {:?}", self.path))
    }

    fn save(&self, snapshot: &QueueSnapshot) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory {:?}", dir))?;

        let mut file = NamedTempFile::new_in(&dir)
            .with_context(|| format!("Failed to create temp file in {:?}", dir))?;
        serde_json::to_writer_pretty(&mut file, snapshot)?;
        file.flush()?;
        file.persist(&self.path)
            .with_context(|| format!("Failed to replace queue file: {:?}", self.path))?;
        Ok(())
    }
}

/// Keeps the snapshot in memory only.
#[derive(Default)]
pub struct MemoryBackend {
    snapshot: Mutex<Option<QueueSnapshot>>,
}

impl MemoryBackend {
    pub fn with_snapshot(snapshot: QueueSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
        }
    }

    /// Last saved snapshot, if any.
    pub fn saved(&self) -> Option<QueueSnapshot> {
        self.snapshot.lock().ok().and_then(|s| s.clone())
    }
}

impl QueueBackend for MemoryBackend {
    fn load(&self) -> Result<QueueSnapshot> {
        Ok(self.saved().unwrap_or_default())
    }

    fn save(&self, snapshot: &QueueSnapshot) -> Result<()> {
        let mut guard = self
            .snapshot
            .lock()
            .map_err(|_| anyhow::anyhow!("memory backend lock poisoned"))?;
        *guard = Some(snapshot.clone());
        Ok(())
    }
}
