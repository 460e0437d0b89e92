use super::types::{CourseListResponse, CourseResponse, CourseSummary};
use super::{routes, ApiClient, ApiError};

impl ApiClient {
    pub async fn published_courses(&self) -> Result<Vec<CourseSummary>, ApiError> {
        let response: CourseListResponse = self.get_json(routes::PUBLISHED_COURSES).await?;
        let courses: Vec<CourseSummary> = response
            .into_courses()
            .into_iter()
            .filter(|course| course.is_published)
            .collect();

        tracing::debug!("Fetched {} published courses", courses.len());
        Ok(courses)
    }

    pub async fn course(&self, course_id: &str) -> Result<CourseSummary, ApiError> {
        let response: CourseResponse = self.get_json(&routes::course(course_id)).await?;
        Ok(response.into_course())
    }

    /// Courses authored by the signed-in teacher.
    pub async fn my_courses(&self) -> Result<Vec<CourseSummary>, ApiError> {
        let user_id = self
            .session()
            .user_id()
            .ok_or(ApiError::NotAuthenticated)?
            .to_string();
        let response: CourseListResponse = self.get_json(&routes::my_courses(&user_id)).await?;
        Ok(response.into_courses())
    }
}
