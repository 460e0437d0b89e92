// Relative to the API base URL, which always ends in `/`.

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api/v1/";

pub const AUTH_LOGIN: &str = "auth/login";
pub const AUTH_REGISTER: &str = "auth/register";
pub const AUTH_LOGOUT: &str = "auth/logout";
pub const AUTH_REFRESH: &str = "auth/refresh";

pub const PUBLISHED_COURSES: &str = "courses/published-courses";
pub const PROGRESS: &str = "progress";

pub fn course(course_id: &str) -> String {
    format!("courses/{}", course_id)
}

pub fn my_courses(user_id: &str) -> String {
    format!("courses/my-courses/{}", user_id)
}

pub fn lectures(course_id: &str) -> String {
    format!("lectures/{}", course_id)
}

pub fn progress_for(user_id: &str, course_id: &str) -> String {
    format!("progress/{}/{}", user_id, course_id)
}
