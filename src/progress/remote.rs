use crate::api::{ApiError, ProgressUpdate, RemoteProgressEntry};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Durable, cross-device progress storage.
#[async_trait]
pub trait RemoteProgress: Send + Sync {
    async fn push(&self, update: &ProgressUpdate) -> Result<(), ApiError>;

    async fn fetch(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<Vec<RemoteProgressEntry>, ApiError>;

    fn name(&self) -> &str;
}

/// Process-local remote tier. Keeps one record per (viewer, course) the way
/// the backend does, and can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct MemoryRemote {
    inner: Arc<Mutex<MemoryRemoteState>>,
}

#[derive(Debug, Default)]
struct MemoryRemoteState {
    records: HashMap<(String, String), RemoteProgressEntry>,
    fail_pushes: bool,
    fail_fetches: bool,
    pushes: Vec<ProgressUpdate>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, user_id: &str, course_id: &str, lecture_id: &str, played_seconds: f64) {
        if let Ok(mut state) = self.inner.lock() {
            state.records.insert(
                (user_id.to_string(), course_id.to_string()),
                RemoteProgressEntry {
                    lecture_id: lecture_id.to_string(),
                    played_seconds,
                },
            );
        }
    }

    pub fn set_fail_pushes(&self, fail: bool) {
        if let Ok(mut state) = self.inner.lock() {
            state.fail_pushes = fail;
        }
    }

    pub fn set_fail_fetches(&self, fail: bool) {
        if let Ok(mut state) = self.inner.lock() {
            state.fail_fetches = fail;
        }
    }

    pub fn pushes(&self) -> Vec<ProgressUpdate> {
        self.inner
            .lock()
            .map(|state| state.pushes.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RemoteProgress for MemoryRemote {
    async fn push(&self, update: &ProgressUpdate) -> Result<(), ApiError> {
        let mut state = self
            .inner
            .lock()
            .map_err(|e| ApiError::NetworkError(e.to_string()))?;

        if state.fail_pushes {
            return Err(ApiError::NetworkError("remote unavailable".to_string()));
        }

        state.pushes.push(update.clone());
        state.records.insert(
            (update.user_id.clone(), update.course_id.clone()),
            RemoteProgressEntry {
                lecture_id: update.lecture_id.clone(),
                played_seconds: update.played_seconds,
            },
        );
        Ok(())
    }

    async fn fetch(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<Vec<RemoteProgressEntry>, ApiError> {
        let state = self
            .inner
            .lock()
            .map_err(|e| ApiError::NetworkError(e.to_string()))?;

        if state.fail_fetches {
            return Err(ApiError::NetworkError("remote unavailable".to_string()));
        }

        Ok(state
            .records
            .get(&(user_id.to_string(), course_id.to_string()))
            .cloned()
            .into_iter()
            .collect())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
