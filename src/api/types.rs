// src/api/types.rs
// Wire types and error definitions for the REST backend

use crate::auth::UserProfile;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// REST client error types with retry classification
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    TimeoutError,

    #[error("Authentication failed")]
    AuthenticationError,

    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Rate limit exceeded")]
    RateLimitError,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::NetworkError(_) | ApiError::TimeoutError | ApiError::RateLimitError => true,
            ApiError::HttpError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::TimeoutError
        } else if err.is_decode() {
            ApiError::InvalidResponse(err.to_string())
        } else {
            ApiError::NetworkError(err.to_string())
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Body of `POST /progress`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub user_id: String,
    pub course_id: String,
    pub lecture_id: String,
    pub played_seconds: f64,
}

/// One entry of `GET /progress/{userId}/{courseId}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteProgressEntry {
    pub lecture_id: String,
    pub played_seconds: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgressListResponse {
    #[serde(default)]
    pub progress: Vec<RemoteProgressEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub public_id: Option<String>,
}

/// Lecture as the backend serializes it
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LectureDto {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(alias = "title")]
    pub lecture_title: String,
    #[serde(default)]
    pub video_info: Option<VideoInfo>,
    #[serde(default)]
    pub video_file: Option<String>,
    #[serde(default)]
    pub public_id: Option<String>,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub is_preview_free: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LectureListResponse {
    #[serde(default)]
    pub lectures: Vec<LectureDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CourseCreator {
    Id(String),
    Profile {
        #[serde(default)]
        name: String,
        #[serde(default)]
        email: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub course_title: String,
    #[serde(default)]
    pub sub_title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub course_level: Option<String>,
    #[serde(default)]
    pub course_price: Option<f64>,
    #[serde(default)]
    pub course_thumbnail: Option<String>,
    #[serde(default)]
    pub creator: Option<CourseCreator>,
    #[serde(default)]
    pub enrolled_students: Vec<String>,
    #[serde(default)]
    pub is_published: bool,
}

/// Course lists come back either bare or wrapped in `{ "courses": [...] }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CourseListResponse {
    Wrapped { courses: Vec<CourseSummary> },
    Bare(Vec<CourseSummary>),
}

impl CourseListResponse {
    pub fn into_courses(self) -> Vec<CourseSummary> {
        match self {
            CourseListResponse::Wrapped { courses } => courses,
            CourseListResponse::Bare(courses) => courses,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CourseResponse {
    Wrapped { course: CourseSummary },
    Bare(CourseSummary),
}

impl CourseResponse {
    pub fn into_course(self) -> CourseSummary {
        match self {
            CourseResponse::Wrapped { course } => course,
            CourseResponse::Bare(course) => course,
        }
    }
}
