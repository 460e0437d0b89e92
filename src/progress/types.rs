use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies one local-tier record: (viewer, course, lecture).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgressKey {
    pub viewer: String,
    pub course: String,
    pub lecture: String,
}

impl ProgressKey {
    pub fn new(viewer: &str, course: &str, lecture: &str) -> Self {
        Self {
            viewer: viewer.to_string(),
            course: course.to_string(),
            lecture: lecture.to_string(),
        }
    }
}

/// Value stored per key in the local tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalEntry {
    pub current_time: f64,
    pub user_id: String,
    pub course_id: String,
    pub lecture_id: String,
    pub updated_at: DateTime<Utc>,
}

impl LocalEntry {
    pub fn key(&self) -> ProgressKey {
        ProgressKey::new(&self.user_id, &self.course_id, &self.lecture_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub lecture_id: String,
    pub elapsed_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumePoint {
    pub lecture_id: String,
    pub elapsed_secs: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RestoreSource {
    Remote,
    Local,
    None,
}

/// What a session starts from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Restored {
    pub resume: Option<ResumePoint>,
    pub records: Vec<ProgressRecord>,
    pub source: RestoreSource,
}

impl Restored {
    pub fn nothing() -> Self {
        Self {
            resume: None,
            records: Vec::new(),
            source: RestoreSource::None,
        }
    }

    pub fn elapsed_for(&self, lecture_id: &str) -> Option<f64> {
        self.records
            .iter()
            .find(|record| record.lecture_id == lecture_id)
            .map(|record| record.elapsed_secs)
    }
}
