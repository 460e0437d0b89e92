// src/video/mod.rs
// Media element contract: events in, commands out

mod simulated;
mod surface;

pub use simulated::{MediaHandle, SimulatedMedia};
pub use surface::{SurfaceOutput, VideoSurface};

use crate::catalog::VideoSource;
use serde::Serialize;

/// Something the media engine reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MediaEvent {
    LoadedMetadata { duration_secs: f64 },
    TimeUpdate { position_secs: f64 },
    /// The viewer dragged the scrubber.
    Seeking { position_secs: f64 },
    Playing,
    Pause,
    Ended,
    Error { message: String },
}

/// An event tagged with the source load it belongs to. Samples from an
/// earlier load are stale and get dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSample {
    pub generation: u64,
    pub event: MediaEvent,
}

impl MediaSample {
    pub fn new(generation: u64, event: MediaEvent) -> Self {
        Self { generation, event }
    }
}

/// Something the media engine is told to do.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaCommand {
    Load {
        generation: u64,
        source: VideoSource,
        duration_hint_secs: f64,
    },
    Play,
    Pause,
    Seek { position_secs: f64 },
}
