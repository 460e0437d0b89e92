use super::{MediaCommand, MediaEvent};
use crate::catalog::Lecture;
use crate::error::PlayerError;

/// Positions closer than this are the same point.
const SEEK_TOLERANCE_SECS: f64 = 0.5;

/// What the surface passes on to the session after filtering an event.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOutput {
    Duration(f64),
    Time(f64),
    /// A restricted scrub was undone; send the command to the engine.
    Reverted(MediaCommand),
    Playing,
    Paused,
    /// The source played to its end at this position.
    Ended(f64),
    Failed(PlayerError),
    Ignored,
}

/// Wraps one playable source at a time.
///
/// Emits duration at most once per source, forwards time updates untouched,
/// and reverts viewer scrubs while seeking is restricted.
#[derive(Debug, Default)]
pub struct VideoSurface {
    generation: u64,
    loaded: bool,
    duration_emitted: bool,
    duration_secs: Option<f64>,
    last_position: f64,
    seeking_disabled: bool,
}

impl VideoSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch to `lecture`'s source. Every call starts a new generation.
    pub fn load(&mut self, lecture: &Lecture) -> Result<MediaCommand, PlayerError> {
        self.generation += 1;
        self.duration_emitted = false;
        self.duration_secs = None;
        self.last_position = 0.0;
        self.loaded = false;

        if !lecture.source.is_playable() {
            tracing::warn!("Lecture {} has no playable source", lecture.id);
            return Err(PlayerError::Playback(format!(
                "\"{}\" has no video attached",
                lecture.title
            )));
        }

        self.loaded = true;
        tracing::debug!(
            "Surface generation {}: loading {} ({})",
            self.generation,
            lecture.id,
            lecture.source
        );
        Ok(MediaCommand::Load {
            generation: self.generation,
            source: lecture.source.clone(),
            duration_hint_secs: lecture.duration(),
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.loaded && generation == self.generation
    }

    pub fn set_seeking_disabled(&mut self, disabled: bool) {
        self.seeking_disabled = disabled;
    }

    pub fn seeking_disabled(&self) -> bool {
        self.seeking_disabled
    }

    pub fn last_position(&self) -> f64 {
        self.last_position
    }

    /// Programmatic seek, e.g. to a resume point. Not subject to restriction.
    pub fn seek(&mut self, position_secs: f64) -> MediaCommand {
        let position_secs = position_secs.max(0.0);
        self.last_position = position_secs;
        MediaCommand::Seek { position_secs }
    }

    pub fn handle(&mut self, event: MediaEvent) -> SurfaceOutput {
        if !self.loaded {
            return SurfaceOutput::Ignored;
        }

        match event {
            MediaEvent::LoadedMetadata { duration_secs } => {
                if self.duration_emitted || !duration_secs.is_finite() || duration_secs <= 0.0 {
                    return SurfaceOutput::Ignored;
                }
                self.duration_emitted = true;
                self.duration_secs = Some(duration_secs);
                SurfaceOutput::Duration(duration_secs)
            }
            MediaEvent::TimeUpdate { position_secs } => {
                self.last_position = position_secs;
                SurfaceOutput::Time(position_secs)
            }
            MediaEvent::Seeking { position_secs } => {
                if self.seeking_disabled
                    && (position_secs - self.last_position).abs() > SEEK_TOLERANCE_SECS
                {
                    tracing::debug!(
                        "Scrub to {:.1}s reverted to {:.1}s",
                        position_secs,
                        self.last_position
                    );
                    return SurfaceOutput::Reverted(MediaCommand::Seek {
                        position_secs: self.last_position,
                    });
                }
                self.last_position = position_secs;
                SurfaceOutput::Time(position_secs)
            }
            MediaEvent::Playing => SurfaceOutput::Playing,
            MediaEvent::Pause => SurfaceOutput::Paused,
            MediaEvent::Ended => {
                if let Some(duration) = self.duration_secs {
                    self.last_position = duration;
                }
                SurfaceOutput::Ended(self.last_position)
            }
            MediaEvent::Error { message } => {
                self.loaded = false;
                SurfaceOutput::Failed(PlayerError::Playback(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::VideoSource;

    fn playable() -> Lecture {
        Lecture::new("L1", "Intro", 300).with_source(VideoSource::parse("https://cdn.example.com/l1.mp4"))
    }

    #[test]
    fn duration_fires_once_per_source() {
        let mut surface = VideoSurface::new();
        surface.load(&playable()).unwrap();

        let meta = MediaEvent::LoadedMetadata { duration_secs: 300.0 };
        assert_eq!(surface.handle(meta.clone()), SurfaceOutput::Duration(300.0));
        assert_eq!(surface.handle(meta.clone()), SurfaceOutput::Ignored);

        surface.load(&playable()).unwrap();
        assert_eq!(surface.handle(meta), SurfaceOutput::Duration(300.0));
    }

    #[test]
    fn restricted_scrub_is_reverted() {
        let mut surface = VideoSurface::new();
        surface.load(&playable()).unwrap();
        surface.set_seeking_disabled(true);
        surface.handle(MediaEvent::TimeUpdate { position_secs: 40.0 });

        let output = surface.handle(MediaEvent::Seeking { position_secs: 250.0 });
        assert_eq!(
            output,
            SurfaceOutput::Reverted(MediaCommand::Seek { position_secs: 40.0 })
        );
        assert_eq!(surface.last_position(), 40.0);
    }

    #[test]
    fn free_scrub_passes_through() {
        let mut surface = VideoSurface::new();
        surface.load(&playable()).unwrap();
        surface.set_seeking_disabled(false);

        let output = surface.handle(MediaEvent::Seeking { position_secs: 250.0 });
        assert_eq!(output, SurfaceOutput::Time(250.0));
    }

    #[test]
    fn programmatic_seek_moves_the_bookmark() {
        let mut surface = VideoSurface::new();
        surface.load(&playable()).unwrap();
        surface.set_seeking_disabled(true);

        assert_eq!(surface.seek(120.0), MediaCommand::Seek { position_secs: 120.0 });
        assert_eq!(
            surface.handle(MediaEvent::Seeking { position_secs: 120.2 }),
            SurfaceOutput::Time(120.2)
        );
    }

    #[test]
    fn missing_source_is_a_playback_error() {
        let mut surface = VideoSurface::new();
        let result = surface.load(&Lecture::new("L1", "Intro", 300));
        assert!(matches!(result, Err(PlayerError::Playback(_))));
        assert_eq!(
            surface.handle(MediaEvent::TimeUpdate { position_secs: 1.0 }),
            SurfaceOutput::Ignored
        );
    }

    #[test]
    fn ended_reports_full_duration() {
        let mut surface = VideoSurface::new();
        surface.load(&playable()).unwrap();
        surface.handle(MediaEvent::LoadedMetadata { duration_secs: 299.6 });
        assert_eq!(surface.handle(MediaEvent::Ended), SurfaceOutput::Ended(299.6));
    }

    #[test]
    fn ended_without_metadata_uses_last_position() {
        let mut surface = VideoSurface::new();
        surface.load(&playable()).unwrap();
        surface.handle(MediaEvent::TimeUpdate { position_secs: 42.0 });
        assert_eq!(surface.handle(MediaEvent::Ended), SurfaceOutput::Ended(42.0));
    }

    #[test]
    fn media_error_stops_the_surface() {
        let mut surface = VideoSurface::new();
        surface.load(&playable()).unwrap();
        let generation = surface.generation();

        let output = surface.handle(MediaEvent::Error {
            message: "decode failed".to_string(),
        });
        assert_eq!(
            output,
            SurfaceOutput::Failed(PlayerError::Playback("decode failed".to_string()))
        );
        assert!(!surface.is_current(generation));
    }
}
