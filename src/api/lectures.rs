use super::types::LectureListResponse;
use super::{routes, ApiClient, ApiError};
use crate::catalog::{Lecture, LectureCatalog};
use async_trait::async_trait;

#[async_trait]
impl LectureCatalog for ApiClient {
    async fn lectures(&self, course_id: &str) -> Result<Vec<Lecture>, ApiError> {
        let response: LectureListResponse = self.get_json(&routes::lectures(course_id)).await?;
        Ok(response.lectures.into_iter().map(Lecture::from).collect())
    }

    fn name(&self) -> &str {
        "rest"
    }
}
