use crate::api::LectureDto;
use serde::Serialize;
use std::fmt;
use url::Url;

/// Where a lecture's video lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum VideoSource {
    /// Directly playable URL
    Url(Url),
    /// Opaque storage reference resolved by the media host
    Storage(String),
    /// The backend did not attach a video yet
    Missing,
}

impl VideoSource {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return VideoSource::Missing;
        }

        match Url::parse(trimmed) {
            Ok(url) if matches!(url.scheme(), "http" | "https" | "file") => VideoSource::Url(url),
            _ => VideoSource::Storage(trimmed.to_string()),
        }
    }

    pub fn is_playable(&self) -> bool {
        !matches!(self, VideoSource::Missing)
    }
}

impl fmt::Display for VideoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoSource::Url(url) => write!(f, "{}", url),
            VideoSource::Storage(reference) => write!(f, "storage:{}", reference),
            VideoSource::Missing => f.write_str("<missing>"),
        }
    }
}

/// One watchable unit of a course. Read-only for playback, except for the
/// length the media engine reports once the source is loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lecture {
    pub id: String,
    pub title: String,
    pub source: VideoSource,
    /// Whole seconds, rounded down; 0 means the backend does not know yet.
    pub duration_secs: u32,
    /// Length of the actual video, once the media engine reported it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_duration_secs: Option<f64>,
    pub preview_free: bool,
}

impl Lecture {
    pub fn new(id: impl Into<String>, title: impl Into<String>, duration_secs: u32) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            source: VideoSource::Missing,
            duration_secs,
            media_duration_secs: None,
            preview_free: false,
        }
    }

    pub fn with_source(mut self, source: VideoSource) -> Self {
        self.source = source;
        self
    }

    /// Effective length: the shorter of the catalog value and what the media
    /// engine reported, so a video that ends early can still be completed.
    pub fn duration(&self) -> f64 {
        let catalog = f64::from(self.duration_secs);
        match self.media_duration_secs {
            Some(media) if catalog > 0.0 => catalog.min(media),
            Some(media) => media,
            None => catalog,
        }
    }

    pub fn has_duration(&self) -> bool {
        self.duration() > 0.0
    }

    /// Record the length reported by the media engine. Non-positive or
    /// non-finite values are ignored.
    pub fn set_media_duration(&mut self, duration_secs: f64) -> bool {
        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            return false;
        }
        self.media_duration_secs = Some(duration_secs);
        true
    }

    /// Clamp an elapsed position into `[0, duration]`. Unknown durations only
    /// clamp from below.
    pub fn clamp_elapsed(&self, elapsed_secs: f64) -> f64 {
        let elapsed = if elapsed_secs.is_finite() {
            elapsed_secs.max(0.0)
        } else {
            0.0
        };

        if !self.has_duration() {
            elapsed
        } else {
            elapsed.min(self.duration())
        }
    }
}

impl From<LectureDto> for Lecture {
    fn from(dto: LectureDto) -> Self {
        let url = dto
            .video_info
            .as_ref()
            .and_then(|info| info.video_url.clone())
            .or(dto.video_file);
        let reference = dto
            .video_info
            .and_then(|info| info.public_id)
            .or(dto.public_id);

        let source = match (url, reference) {
            (Some(url), _) if !url.trim().is_empty() => VideoSource::parse(&url),
            (_, Some(reference)) => VideoSource::parse(&reference),
            _ => VideoSource::Missing,
        };

        let duration_secs = if dto.duration.is_finite() && dto.duration > 0.0 {
            // Rounding up would put the end past the last frame.
            dto.duration.floor().min(f64::from(u32::MAX)) as u32
        } else {
            0
        };

        Self {
            id: dto.id,
            title: dto.lecture_title,
            source,
            duration_secs,
            media_duration_secs: None,
            preview_free: dto.is_preview_free,
        }
    }
}
