// src/catalog/mod.rs
// Ordered lecture list for a course

mod types;

pub use types::{Lecture, VideoSource};

use crate::api::{ApiError, RetryPolicy};
use crate::error::PlayerError;
use async_trait::async_trait;
use std::sync::Arc;

/// Anything that can list a course's lectures in unlock order.
#[async_trait]
pub trait LectureCatalog: Send + Sync {
    async fn lectures(&self, course_id: &str) -> Result<Vec<Lecture>, ApiError>;

    fn name(&self) -> &str;
}

/// Fetches lectures, retrying transient failures before giving up.
#[derive(Clone)]
pub struct CatalogLoader {
    source: Arc<dyn LectureCatalog>,
    retry_policy: RetryPolicy,
}

impl CatalogLoader {
    pub fn new(source: Arc<dyn LectureCatalog>, retry_policy: RetryPolicy) -> Self {
        Self {
            source,
            retry_policy,
        }
    }

    /// An empty list is a valid answer, not an error.
    pub async fn load(&self, course_id: &str) -> Result<Vec<Lecture>, PlayerError> {
        let mut attempt = 0u8;

        loop {
            match self.source.lectures(course_id).await {
                Ok(lectures) => {
                    tracing::info!(
                        "Catalog {}: {} lectures for course {}",
                        self.source.name(),
                        lectures.len(),
                        course_id
                    );
                    return Ok(lectures);
                }
                Err(e) => {
                    tracing::warn!(
                        "Catalog {} attempt {}/{} failed for course {}: {}",
                        self.source.name(),
                        attempt + 1,
                        self.retry_policy.max_retries() + 1,
                        course_id,
                        e
                    );

                    if self.retry_policy.should_retry(attempt, &e) {
                        self.retry_policy.wait_before_retry(attempt).await;
                        attempt += 1;
                        continue;
                    }

                    return Err(PlayerError::from_fetch(e));
                }
            }
        }
    }
}

impl std::fmt::Debug for CatalogLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogLoader")
            .field("source", &self.source.name())
            .field("retry_policy", &self.retry_policy)
            .finish()
    }
}
