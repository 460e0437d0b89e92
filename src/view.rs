// src/view.rs
// One opened course: catalog -> session -> surface -> store

use crate::catalog::CatalogLoader;
use crate::error::PlayerError;
use crate::notify::Notifier;
use crate::progress::{ProgressStore, Restored};
use crate::session::{PlaybackSession, SessionState, Transition};
use crate::video::{MediaCommand, MediaEvent, MediaSample, SurfaceOutput, VideoSurface};

/// The lecture view for `/courses/{id}/lectures`.
///
/// Every input returns the commands the media engine should run next, so the
/// host only shuttles events in and commands out.
#[derive(Debug)]
pub struct LectureView {
    course_id: String,
    loader: CatalogLoader,
    store: ProgressStore,
    session: PlaybackSession,
    surface: VideoSurface,
    notifier: Notifier,
    restored: Option<Restored>,
}

impl LectureView {
    pub fn new(
        viewer: &str,
        course_id: &str,
        loader: CatalogLoader,
        store: ProgressStore,
        notifier: Notifier,
    ) -> Self {
        Self {
            course_id: course_id.to_string(),
            session: PlaybackSession::new(viewer, course_id, store.clone(), notifier.clone()),
            loader,
            store,
            surface: VideoSurface::new(),
            notifier,
            restored: None,
        }
    }

    /// Load the catalog, restore progress and put the first lecture on the
    /// surface.
    pub async fn open(&mut self) -> Vec<MediaCommand> {
        let lectures = match self.loader.load(&self.course_id).await {
            Ok(lectures) => lectures,
            Err(e) => {
                self.notifier.error(e.to_string());
                self.session.fail(e);
                return Vec::new();
            }
        };

        let restored = if lectures.is_empty() {
            Restored::nothing()
        } else {
            self.store.restore(self.session.viewer(), &self.course_id).await
        };

        let transition = self.session.start(lectures, &restored);
        self.restored = Some(restored);
        self.apply(transition)
    }

    /// Retry after a failed catalog load. No-op in any other state.
    pub async fn retry(&mut self) -> Vec<MediaCommand> {
        if !matches!(self.session.state(), SessionState::Failed { .. }) {
            return Vec::new();
        }
        tracing::info!("Retrying course {}", self.course_id);
        self.session.reset();
        self.open().await
    }

    /// Feed an engine sample, dropping it if it belongs to an earlier source.
    pub fn media_sample(&mut self, sample: MediaSample) -> Vec<MediaCommand> {
        if !self.surface.is_current(sample.generation) {
            return Vec::new();
        }
        self.media(sample.event)
    }

    pub fn media(&mut self, event: MediaEvent) -> Vec<MediaCommand> {
        match self.surface.handle(event) {
            SurfaceOutput::Duration(duration) => {
                self.session.on_duration(duration);
                Vec::new()
            }
            SurfaceOutput::Time(position) => {
                let transition = self.session.on_time_update(position);
                self.apply(transition)
            }
            SurfaceOutput::Reverted(command) => vec![command],
            SurfaceOutput::Playing => {
                self.session.play();
                Vec::new()
            }
            SurfaceOutput::Paused => {
                self.session.pause();
                Vec::new()
            }
            SurfaceOutput::Ended(position) => {
                let transition = self.session.on_ended(position);
                self.apply(transition)
            }
            SurfaceOutput::Failed(e) => {
                self.notifier.error(e.to_string());
                self.session.on_playback_error(e);
                Vec::new()
            }
            SurfaceOutput::Ignored => Vec::new(),
        }
    }

    pub fn select(&mut self, index: usize) -> Vec<MediaCommand> {
        let transition = self.session.select(index);
        self.apply(transition)
    }

    /// Ask the engine to play. The session follows once the engine reports it.
    pub fn play(&self) -> Vec<MediaCommand> {
        if self.session.state().is_ready() && self.session.playback_error().is_none() {
            vec![MediaCommand::Play]
        } else {
            Vec::new()
        }
    }

    pub fn pause(&self) -> Vec<MediaCommand> {
        if self.session.is_playing() {
            vec![MediaCommand::Pause]
        } else {
            Vec::new()
        }
    }

    pub async fn save(&self) -> Result<(), PlayerError> {
        self.session.save().await
    }

    /// Flush before the view is torn down.
    pub async fn unload(&mut self) -> Result<(), PlayerError> {
        self.session.unload().await
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn surface(&self) -> &VideoSurface {
        &self.surface
    }

    pub fn restored(&self) -> Option<&Restored> {
        self.restored.as_ref()
    }

    pub fn course_id(&self) -> &str {
        &self.course_id
    }

    fn apply(&mut self, transition: Transition) -> Vec<MediaCommand> {
        let mut commands = Vec::new();

        match transition {
            Transition::Loaded { index, resume_at } => {
                self.load_lecture(index, resume_at, &mut commands);
            }
            Transition::Advanced { completed, index } => {
                tracing::info!(
                    "Advancing from lecture {} to {} in course {}",
                    completed,
                    index,
                    self.course_id
                );
                self.load_lecture(index, 0.0, &mut commands);
            }
            Transition::Finished => commands.push(MediaCommand::Pause),
            Transition::Empty => {
                self.notifier.info("This course has no lectures yet");
            }
            Transition::Unchanged
            | Transition::Progressed { .. }
            | Transition::Rejected { .. }
            | Transition::Failed(_) => {}
        }

        self.surface
            .set_seeking_disabled(self.session.seeking_restricted());
        commands
    }

    fn load_lecture(&mut self, index: usize, resume_at: f64, commands: &mut Vec<MediaCommand>) {
        let Some(lecture) = self.session.lectures().get(index).cloned() else {
            return;
        };

        match self.surface.load(&lecture) {
            Ok(load) => {
                commands.push(load);
                if resume_at > 0.0 {
                    commands.push(self.surface.seek(resume_at));
                }
                if self.session.is_playing() {
                    commands.push(MediaCommand::Play);
                }
            }
            Err(e) => {
                self.notifier.error(e.to_string());
                self.session.on_playback_error(e);
            }
        }
    }
}
