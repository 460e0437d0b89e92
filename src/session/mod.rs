// src/session/mod.rs
// Playback state machine for one opened course

mod completion;
mod state;

pub use completion::CompletionSet;
pub use state::{SessionState, Transition};

use crate::catalog::Lecture;
use crate::error::PlayerError;
use crate::notify::Notifier;
use crate::progress::{FlushHandle, ProgressStore, Restored};

/// Which lecture is current, how far into it the viewer is, and what is
/// unlocked.
///
/// All methods react synchronously to one event. Remote persistence is handed
/// to the [`ProgressStore`] and never awaited, except by [`save`] and
/// [`unload`]. Background flushes are kept until [`unload`] waits for them.
///
/// [`save`]: PlaybackSession::save
/// [`unload`]: PlaybackSession::unload
pub struct PlaybackSession {
    viewer: String,
    course_id: String,
    lectures: Vec<Lecture>,
    state: SessionState,
    completed: CompletionSet,
    playback_error: Option<PlayerError>,
    store: ProgressStore,
    notifier: Notifier,
    pending_flushes: Vec<FlushHandle>,
}

impl PlaybackSession {
    pub fn new(
        viewer: impl Into<String>,
        course_id: impl Into<String>,
        store: ProgressStore,
        notifier: Notifier,
    ) -> Self {
        Self {
            viewer: viewer.into(),
            course_id: course_id.into(),
            lectures: Vec::new(),
            state: SessionState::Loading,
            completed: CompletionSet::new(),
            playback_error: None,
            store,
            notifier,
            pending_flushes: Vec::new(),
        }
    }

    /// Leave `Loading` with the catalog and whatever was restored.
    pub fn start(&mut self, lectures: Vec<Lecture>, restored: &Restored) -> Transition {
        self.completed = CompletionSet::new();
        self.playback_error = None;

        if lectures.is_empty() {
            tracing::info!("Course {} has no lectures", self.course_id);
            self.lectures = lectures;
            self.state = SessionState::Empty;
            return Transition::Empty;
        }
        self.lectures = lectures;

        let (mut index, mut elapsed) = match &restored.resume {
            Some(resume) => match self.position_of(&resume.lecture_id) {
                Some(index) => (index, self.lectures[index].clamp_elapsed(resume.elapsed_secs)),
                None => {
                    tracing::warn!(
                        "Resume lecture {} is not part of course {}, starting over",
                        resume.lecture_id,
                        self.course_id
                    );
                    (0, 0.0)
                }
            },
            None => (0, 0.0),
        };

        for (i, lecture) in self.lectures.iter().enumerate() {
            let watched = if i == index {
                Some(elapsed)
            } else {
                restored.elapsed_for(&lecture.id)
            };
            if i < index || watched.map_or(false, |secs| is_finished(lecture, secs)) {
                self.completed.insert(&lecture.id);
            }
        }

        if self.completed.contains(&self.lectures[index].id) {
            if index + 1 < self.lectures.len() {
                index += 1;
                elapsed = 0.0;
            } else {
                tracing::info!("Course {} already finished", self.course_id);
                self.state = SessionState::Completed;
                return Transition::Finished;
            }
        }

        tracing::info!(
            "Session started: course={}, lecture={}, elapsed={:.1}, completed={}/{}",
            self.course_id,
            self.lectures[index].id,
            elapsed,
            self.completed.len(),
            self.lectures.len()
        );

        self.state = SessionState::Ready {
            index,
            elapsed_secs: elapsed,
            playing: false,
        };
        Transition::Loaded {
            index,
            resume_at: elapsed,
        }
    }

    pub fn fail(&mut self, error: PlayerError) -> Transition {
        tracing::warn!("Course {} failed to load: {}", self.course_id, error);
        self.state = SessionState::Failed {
            error: error.clone(),
        };
        Transition::Failed(error)
    }

    /// Back to `Loading` before a retry.
    pub fn reset(&mut self) {
        self.state = SessionState::Loading;
        self.playback_error = None;
    }

    /// Duration reported by the media engine. A video shorter than the
    /// catalog says ends the lecture at its real end.
    pub fn on_duration(&mut self, duration_secs: f64) {
        let SessionState::Ready { index, .. } = self.state else {
            return;
        };

        let lecture = &mut self.lectures[index];
        if lecture.set_media_duration(duration_secs) {
            tracing::debug!(
                "Lecture {} media duration {:.1}s (catalog {}s)",
                lecture.id,
                duration_secs,
                lecture.duration_secs
            );
        }
    }

    pub fn on_time_update(&mut self, elapsed_secs: f64) -> Transition {
        let SessionState::Ready { index, playing, .. } = self.state else {
            return Transition::Unchanged;
        };

        let lecture = &self.lectures[index];
        let elapsed = self
            .store
            .record_tick(&self.viewer, &self.course_id, lecture, elapsed_secs);

        if !is_finished(lecture, elapsed) {
            self.state = SessionState::Ready {
                index,
                elapsed_secs: elapsed,
                playing,
            };
            return Transition::Progressed {
                elapsed_secs: elapsed,
            };
        }

        self.finish_current(index, playing, elapsed)
    }

    /// The media engine reached the end of the source. Completes the lecture
    /// even when the position falls short of the catalog duration.
    pub fn on_ended(&mut self, position_secs: f64) -> Transition {
        let SessionState::Ready { index, playing, .. } = self.state else {
            return Transition::Unchanged;
        };

        let lecture = &self.lectures[index];
        let elapsed = self
            .store
            .record_tick(&self.viewer, &self.course_id, lecture, position_secs);
        tracing::debug!("Lecture {} ended at {:.1}s", lecture.id, elapsed);

        self.finish_current(index, playing, elapsed)
    }

    fn finish_current(&mut self, index: usize, playing: bool, elapsed: f64) -> Transition {
        let lecture = &self.lectures[index];
        if self.completed.insert(&lecture.id) {
            tracing::info!("Lecture {} completed", lecture.id);
        }
        // Reaching the end is a save point like a pause.
        let handle = self
            .store
            .flush(&self.viewer, &self.course_id, lecture, elapsed);
        self.track_flush(handle);

        if index + 1 < self.lectures.len() {
            self.state = SessionState::Ready {
                index: index + 1,
                elapsed_secs: 0.0,
                playing,
            };
            self.playback_error = None;
            return Transition::Advanced {
                completed: index,
                index: index + 1,
            };
        }

        tracing::info!("Course {} completed", self.course_id);
        self.state = SessionState::Completed;
        self.notifier
            .success("Congratulations, you have completed every lecture in this course");
        Transition::Finished
    }

    /// Jump to lecture `index`. Earlier lectures and the one right after a
    /// completed lecture are always reachable.
    pub fn select(&mut self, index: usize) -> Transition {
        let (current, playing) = match self.state {
            SessionState::Ready { index, playing, .. } => (index, playing),
            SessionState::Completed => (self.lectures.len().saturating_sub(1), false),
            _ => return Transition::Unchanged,
        };

        if index >= self.lectures.len() {
            tracing::warn!("Lecture index {} out of range", index);
            self.notifier.warning("That lecture does not exist");
            return Transition::Rejected { requested: index };
        }

        let unlocked = index <= current || self.completed.contains(&self.lectures[index - 1].id);
        if !unlocked {
            tracing::info!(
                "Selection of lecture {} rejected, lecture {} not completed",
                index,
                current
            );
            self.notifier.warning(format!(
                "Please complete \"{}\" before moving on",
                self.lectures[current].title
            ));
            return Transition::Rejected { requested: index };
        }

        self.playback_error = None;
        self.state = SessionState::Ready {
            index,
            elapsed_secs: 0.0,
            playing,
        };
        Transition::Loaded {
            index,
            resume_at: 0.0,
        }
    }

    pub fn play(&mut self) {
        if let SessionState::Ready { playing, .. } = &mut self.state {
            *playing = true;
        }
    }

    /// Pause and push the position to the remote tier in the background.
    pub fn pause(&mut self) {
        let SessionState::Ready {
            index,
            elapsed_secs,
            ..
        } = self.state
        else {
            return;
        };

        self.state = SessionState::Ready {
            index,
            elapsed_secs,
            playing: false,
        };
        let handle = self
            .store
            .flush(&self.viewer, &self.course_id, &self.lectures[index], elapsed_secs);
        self.track_flush(handle);
    }

    /// Wait for every background flush started so far.
    pub async fn settle(&mut self) {
        for handle in std::mem::take(&mut self.pending_flushes) {
            // Flush failures were already reported by the store.
            if let Err(e) = handle.await {
                tracing::warn!("Progress flush task for course {} died: {}", self.course_id, e);
            }
        }
    }

    fn track_flush(&mut self, handle: FlushHandle) {
        self.pending_flushes.retain(|pending| !pending.is_finished());
        self.pending_flushes.push(handle);
    }

    /// Explicit save. Failures are already reported by the store.
    pub async fn save(&self) -> Result<(), PlayerError> {
        let Some((lecture, elapsed)) = self.position() else {
            return Ok(());
        };

        self.store
            .flush_now(&self.viewer, &self.course_id, lecture, elapsed)
            .await?;
        self.notifier.success("Progress saved");
        Ok(())
    }

    /// Final flush before the view goes away. Background flushes (pause,
    /// lecture completion) are awaited first, so the save made when the
    /// course was finished lands before the process exits.
    pub async fn unload(&mut self) -> Result<(), PlayerError> {
        self.settle().await;

        let SessionState::Ready {
            index,
            elapsed_secs,
            ..
        } = self.state
        else {
            return Ok(());
        };

        self.state = SessionState::Ready {
            index,
            elapsed_secs,
            playing: false,
        };
        tracing::info!(
            "Unloading course {} at lecture {} ({:.1}s)",
            self.course_id,
            self.lectures[index].id,
            elapsed_secs
        );
        self.store
            .flush_now(&self.viewer, &self.course_id, &self.lectures[index], elapsed_secs)
            .await
    }

    /// The media element could not play the current source. The session stays
    /// usable; another lecture may be selected.
    pub fn on_playback_error(&mut self, error: PlayerError) {
        if let SessionState::Ready { playing, .. } = &mut self.state {
            *playing = false;
        }
        tracing::warn!("Playback error in course {}: {}", self.course_id, error);
        self.playback_error = Some(error);
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn lectures(&self) -> &[Lecture] {
        &self.lectures
    }

    pub fn completed(&self) -> &CompletionSet {
        &self.completed
    }

    pub fn is_completed(&self, index: usize) -> bool {
        self.lectures
            .get(index)
            .map_or(false, |lecture| self.completed.contains(&lecture.id))
    }

    pub fn playback_error(&self) -> Option<&PlayerError> {
        self.playback_error.as_ref()
    }

    pub fn current_index(&self) -> Option<usize> {
        match self.state {
            SessionState::Ready { index, .. } => Some(index),
            _ => None,
        }
    }

    pub fn current_lecture(&self) -> Option<&Lecture> {
        self.current_index().and_then(|index| self.lectures.get(index))
    }

    pub fn elapsed(&self) -> f64 {
        match self.state {
            SessionState::Ready { elapsed_secs, .. } => elapsed_secs,
            _ => 0.0,
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state, SessionState::Ready { playing: true, .. })
    }

    /// Scrubbing is locked until the current lecture has been watched through.
    pub fn seeking_restricted(&self) -> bool {
        self.current_index()
            .map_or(false, |index| !self.is_completed(index))
    }

    pub fn viewer(&self) -> &str {
        &self.viewer
    }

    pub fn course_id(&self) -> &str {
        &self.course_id
    }

    fn position(&self) -> Option<(&Lecture, f64)> {
        match self.state {
            SessionState::Ready {
                index,
                elapsed_secs,
                ..
            } => self.lectures.get(index).map(|lecture| (lecture, elapsed_secs)),
            _ => None,
        }
    }

    fn position_of(&self, lecture_id: &str) -> Option<usize> {
        self.lectures.iter().position(|lecture| lecture.id == lecture_id)
    }
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("viewer", &self.viewer)
            .field("course_id", &self.course_id)
            .field("lectures", &self.lectures.len())
            .field("state", &self.state)
            .field("completed", &self.completed.len())
            .finish()
    }
}

fn is_finished(lecture: &Lecture, elapsed_secs: f64) -> bool {
    lecture.has_duration() && elapsed_secs >= lecture.duration()
}
