use super::types::{LocalEntry, ProgressKey, ProgressRecord};
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum LocalTierError {
    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to write {path}: {message}")]
    Write { path: String, message: String },
}

type Entries = Arc<Mutex<HashMap<ProgressKey, LocalEntry>>>;

/// Per-browser-profile progress records, one per (viewer, course, lecture).
///
/// Writes land in memory immediately and are persisted to `progress.json` by a
/// background task, so a tick never waits on disk. The file is a list of
/// entries, each carrying its own (viewer, course, lecture) ids. Last write
/// wins between processes sharing the same file.
#[derive(Debug, Clone)]
pub struct LocalTier {
    entries: Entries,
    path: Option<PathBuf>,
    writer: Option<mpsc::UnboundedSender<()>>,
}

impl LocalTier {
    pub fn in_memory() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            path: None,
            writer: None,
        }
    }

    /// Load `path` (if present) and start the background writer.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, LocalTierError> {
        let path = path.into();
        let entries = load_entries(&path).await?;
        tracing::info!(
            "Local progress tier opened: {} ({} records)",
            path.display(),
            entries.len()
        );

        let entries: Entries = Arc::new(Mutex::new(entries));
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();

        let task_entries = entries.clone();
        let task_path = path.clone();
        tokio::spawn(async move {
            while rx.recv().await.is_some() {
                // Coalesce whatever queued up while the last write ran.
                while rx.try_recv().is_ok() {}

                if let Err(e) = persist(&task_path, &task_entries).await {
                    tracing::warn!("Local progress write failed: {}", e);
                }
            }
            tracing::debug!("Local progress writer stopped");
        });

        Ok(Self {
            entries,
            path: Some(path),
            writer: Some(tx),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Store `elapsed_secs` for `key`. Returns false when the stored value is
    /// already identical, in which case nothing changes.
    pub fn write(&self, key: &ProgressKey, elapsed_secs: f64) -> bool {
        let Ok(mut entries) = self.entries.lock() else {
            tracing::warn!("Local progress tier lock poisoned, dropping tick");
            return false;
        };

        if let Some(existing) = entries.get(key) {
            if existing.current_time == elapsed_secs {
                return false;
            }
        }

        entries.insert(
            key.clone(),
            LocalEntry {
                current_time: elapsed_secs,
                user_id: key.viewer.clone(),
                course_id: key.course.clone(),
                lecture_id: key.lecture.clone(),
                updated_at: Utc::now(),
            },
        );
        drop(entries);

        self.schedule_persist();
        true
    }

    pub fn get(&self, key: &ProgressKey) -> Option<LocalEntry> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }

    /// Most recently touched lecture for (viewer, course).
    pub fn latest_for(&self, viewer: &str, course: &str) -> Option<LocalEntry> {
        let entries = self.entries.lock().ok()?;
        entries
            .values()
            .filter(|entry| entry.user_id == viewer && entry.course_id == course)
            .max_by_key(|entry| entry.updated_at)
            .cloned()
    }

    pub fn records_for(&self, viewer: &str, course: &str) -> Vec<ProgressRecord> {
        let Ok(entries) = self.entries.lock() else {
            return Vec::new();
        };

        entries
            .values()
            .filter(|entry| entry.user_id == viewer && entry.course_id == course)
            .map(|entry| ProgressRecord {
                lecture_id: entry.lecture_id.clone(),
                elapsed_secs: entry.current_time,
            })
            .collect()
    }

    /// Drop the record for `key` unless it moved past `flushed_secs`.
    pub fn prune_flushed(&self, key: &ProgressKey, flushed_secs: f64) -> bool {
        let Ok(mut entries) = self.entries.lock() else {
            return false;
        };

        let removable = entries
            .get(key)
            .map_or(false, |entry| entry.current_time <= flushed_secs);
        if removable {
            entries.remove(key);
        }
        drop(entries);

        if removable {
            self.schedule_persist();
        }
        removable
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the current state to disk now, bypassing the background writer.
    pub async fn sync(&self) -> Result<(), LocalTierError> {
        match &self.path {
            Some(path) => persist(path, &self.entries).await,
            None => Ok(()),
        }
    }

    fn schedule_persist(&self) {
        if let Some(tx) = &self.writer {
            let _ = tx.send(());
        }
    }
}

async fn load_entries(path: &Path) -> Result<HashMap<ProgressKey, LocalEntry>, LocalTierError> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => {
            return Err(LocalTierError::Read {
                path: path.display().to_string(),
                message: e.to_string(),
            })
        }
    };

    match serde_json::from_str::<Vec<LocalEntry>>(&raw) {
        Ok(entries) => Ok(entries
            .into_iter()
            .map(|entry| (entry.key(), entry))
            .collect()),
        Err(e) => {
            tracing::warn!(
                "Local progress file {} is corrupt ({}), starting empty",
                path.display(),
                e
            );
            let backup = path.with_extension("json.bak");
            let _ = tokio::fs::copy(path, backup).await;
            Ok(HashMap::new())
        }
    }
}

async fn persist(path: &Path, entries: &Entries) -> Result<(), LocalTierError> {
    let write_err = |message: String| LocalTierError::Write {
        path: path.display().to_string(),
        message,
    };

    let json = {
        let snapshot = entries
            .lock()
            .map_err(|e| write_err(e.to_string()))?;
        let list: Vec<&LocalEntry> = snapshot.values().collect();
        serde_json::to_string_pretty(&list).map_err(|e| write_err(e.to_string()))?
    };

    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| write_err(e.to_string()))?;
    }

    let tmp = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
    tokio::fs::write(&tmp, json)
        .await
        .map_err(|e| write_err(e.to_string()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| write_err(e.to_string()))
}
