use super::types::{ProgressListResponse, ProgressUpdate, RemoteProgressEntry};
use super::{routes, ApiClient, ApiError};
use crate::progress::RemoteProgress;
use async_trait::async_trait;

#[async_trait]
impl RemoteProgress for ApiClient {
    async fn push(&self, update: &ProgressUpdate) -> Result<(), ApiError> {
        self.post_unit(routes::PROGRESS, update).await
    }

    async fn fetch(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> Result<Vec<RemoteProgressEntry>, ApiError> {
        let response: ProgressListResponse = self
            .get_json(&routes::progress_for(user_id, course_id))
            .await?;
        Ok(response.progress)
    }

    fn name(&self) -> &str {
        "rest"
    }
}
