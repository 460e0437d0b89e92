// src/progress/mod.rs
// Two-tier progress persistence: per-tick local writes, event-driven remote flushes

pub mod circuit_breaker;
mod local;
pub mod metrics;
mod remote;
mod types;

pub use local::{LocalTier, LocalTierError};
pub use remote::{MemoryRemote, RemoteProgress};
pub use types::{
    LocalEntry, ProgressKey, ProgressRecord, RestoreSource, Restored, ResumePoint,
};

use self::circuit_breaker::CircuitBreaker;
use self::metrics::FlushMetrics;
use crate::api::{ApiError, ProgressUpdate, RemoteProgressEntry};
use crate::catalog::Lecture;
use crate::error::PlayerError;
use crate::notify::Notifier;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// Completes when the remote push finished (or was skipped). Dropping it does
/// not cancel the flush.
pub type FlushHandle = JoinHandle<Result<(), PlayerError>>;

#[derive(Clone)]
pub struct ProgressStore {
    local: LocalTier,
    remote: Arc<dyn RemoteProgress>,
    breaker: Arc<Mutex<CircuitBreaker>>,
    metrics: Arc<Mutex<FlushMetrics>>,
    notifier: Notifier,
}

impl std::fmt::Debug for ProgressStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressStore")
            .field("local", &self.local.path())
            .field("remote", &self.remote.name())
            .finish()
    }
}

impl ProgressStore {
    pub fn new(
        local: LocalTier,
        remote: Arc<dyn RemoteProgress>,
        flush_failure_threshold: u8,
        notifier: Notifier,
    ) -> Self {
        Self::with_breaker(local, remote, CircuitBreaker::new(flush_failure_threshold), notifier)
    }

    pub fn with_breaker(
        local: LocalTier,
        remote: Arc<dyn RemoteProgress>,
        breaker: CircuitBreaker,
        notifier: Notifier,
    ) -> Self {
        Self {
            local,
            remote,
            breaker: Arc::new(Mutex::new(breaker)),
            metrics: Arc::new(Mutex::new(FlushMetrics::new())),
            notifier,
        }
    }

    pub fn local(&self) -> &LocalTier {
        &self.local
    }

    /// Record the position locally. Never waits on disk or network.
    ///
    /// Returns the clamped value that was stored.
    pub fn record_tick(&self, viewer: &str, course: &str, lecture: &Lecture, elapsed_secs: f64) -> f64 {
        let elapsed = lecture.clamp_elapsed(elapsed_secs);
        self.local
            .write(&ProgressKey::new(viewer, course, &lecture.id), elapsed);
        elapsed
    }

    /// Push the position to the remote tier in the background.
    pub fn flush(&self, viewer: &str, course: &str, lecture: &Lecture, elapsed_secs: f64) -> FlushHandle {
        let store = self.clone();
        let update = ProgressUpdate {
            user_id: viewer.to_string(),
            course_id: course.to_string(),
            lecture_id: lecture.id.clone(),
            played_seconds: lecture.clamp_elapsed(elapsed_secs),
        };

        tokio::spawn(async move { store.flush_update(update).await })
    }

    /// Awaitable flush. Failures are logged and turned into a warning notice;
    /// the returned error is informational.
    pub async fn flush_now(
        &self,
        viewer: &str,
        course: &str,
        lecture: &Lecture,
        elapsed_secs: f64,
    ) -> Result<(), PlayerError> {
        self.flush_update(ProgressUpdate {
            user_id: viewer.to_string(),
            course_id: course.to_string(),
            lecture_id: lecture.id.clone(),
            played_seconds: lecture.clamp_elapsed(elapsed_secs),
        })
        .await
    }

    async fn flush_update(&self, update: ProgressUpdate) -> Result<(), PlayerError> {
        let allowed = self
            .breaker
            .lock()
            .map(|mut breaker| breaker.is_request_allowed())
            .unwrap_or(true);

        if !allowed {
            tracing::warn!(
                "Remote progress circuit open, skipping flush for course {}",
                update.course_id
            );
            self.with_metrics(|m| m.record_skipped(&update.course_id));
            self.notifier
                .warning("Progress sync paused, your position is kept on this device");
            return Err(PlayerError::Persistence("remote progress unavailable".to_string()));
        }

        match self.remote.push(&update).await {
            Ok(()) => {
                if let Ok(mut breaker) = self.breaker.lock() {
                    breaker.record_success();
                }
                self.with_metrics(|m| m.record_success(&update.course_id));

                let key = ProgressKey::new(&update.user_id, &update.course_id, &update.lecture_id);
                self.local.prune_flushed(&key, update.played_seconds);

                tracing::info!(
                    "Flushed progress: course={}, lecture={}, seconds={:.1}",
                    update.course_id,
                    update.lecture_id,
                    update.played_seconds
                );
                Ok(())
            }
            Err(e) => {
                if let Ok(mut breaker) = self.breaker.lock() {
                    breaker.record_failure();
                }
                self.with_metrics(|m| m.record_failure(&update.course_id));

                tracing::warn!(
                    "Remote progress flush via {} failed for course {}: {}",
                    self.remote.name(),
                    update.course_id,
                    e
                );
                self.notifier.warning("Could not save your progress to the server");
                Err(PlayerError::from_persistence(e))
            }
        }
    }

    /// Where to resume (viewer, course).
    ///
    /// The remote tier wins whenever it has anything. Otherwise the most
    /// recently touched local record is used.
    pub async fn restore(&self, viewer: &str, course: &str) -> Restored {
        match self.remote.fetch(viewer, course).await {
            Ok(entries) if !entries.is_empty() => {
                let restored = self.merge_remote(viewer, course, entries);
                if let Some(resume) = &restored.resume {
                    tracing::info!(
                        "Restored from remote: course={}, lecture={}, seconds={:.1}",
                        course,
                        resume.lecture_id,
                        resume.elapsed_secs
                    );
                }
                return restored;
            }
            Ok(_) | Err(ApiError::NotFound(_)) => {
                tracing::debug!("No remote progress for course {}", course);
            }
            Err(e) => {
                tracing::warn!(
                    "Remote progress fetch via {} failed for course {}: {}",
                    self.remote.name(),
                    course,
                    e
                );
                self.notifier
                    .warning("Could not load saved progress, using this device's copy");
            }
        }

        self.restore_local(viewer, course)
    }

    fn merge_remote(&self, viewer: &str, course: &str, entries: Vec<RemoteProgressEntry>) -> Restored {
        let resume = entries.last().map(|entry| ResumePoint {
            lecture_id: entry.lecture_id.clone(),
            elapsed_secs: entry.played_seconds,
        });

        let mut records: Vec<ProgressRecord> = entries
            .into_iter()
            .map(|entry| ProgressRecord {
                lecture_id: entry.lecture_id,
                elapsed_secs: entry.played_seconds,
            })
            .collect();

        for local in self.local.records_for(viewer, course) {
            if !records.iter().any(|r| r.lecture_id == local.lecture_id) {
                records.push(local);
            }
        }

        Restored {
            resume,
            records,
            source: RestoreSource::Remote,
        }
    }

    fn restore_local(&self, viewer: &str, course: &str) -> Restored {
        let Some(latest) = self.local.latest_for(viewer, course) else {
            tracing::debug!("No local progress for course {}", course);
            return Restored::nothing();
        };

        tracing::info!(
            "Restored from local tier: course={}, lecture={}, seconds={:.1}",
            course,
            latest.lecture_id,
            latest.current_time
        );

        Restored {
            resume: Some(ResumePoint {
                lecture_id: latest.lecture_id,
                elapsed_secs: latest.current_time,
            }),
            records: self.local.records_for(viewer, course),
            source: RestoreSource::Local,
        }
    }

    pub fn flush_counts(&self, course: &str) -> (u64, u64, u64) {
        self.metrics
            .lock()
            .map(|m| {
                (
                    m.get_success_count(course),
                    m.get_failure_count(course),
                    m.get_skipped_count(course),
                )
            })
            .unwrap_or_default()
    }

    pub fn flush_success_rate(&self, course: &str) -> f32 {
        self.metrics
            .lock()
            .map(|m| m.get_success_rate(course))
            .unwrap_or(0.0)
    }

    fn with_metrics(&self, f: impl FnOnce(&mut FlushMetrics)) {
        if let Ok(mut metrics) = self.metrics.lock() {
            f(&mut metrics);
        }
    }
}

/// Share of total course duration watched, 0-100.
pub fn course_progress(lectures: &[Lecture], records: &[ProgressRecord]) -> f64 {
    let total: f64 = lectures.iter().map(Lecture::duration).sum();
    if total <= 0.0 {
        return 0.0;
    }

    let watched: f64 = lectures
        .iter()
        .filter_map(|lecture| {
            records
                .iter()
                .find(|r| r.lecture_id == lecture.id)
                .map(|r| lecture.clamp_elapsed(r.elapsed_secs))
        })
        .sum();

    (watched / total * 100.0).clamp(0.0, 100.0)
}
