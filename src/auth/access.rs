use super::Role;

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Allow,
    Redirect(String),
}

/// Capability check run before a protected view renders.
pub fn authorize(role: Option<Role>, required: &[Role]) -> Access {
    if required.is_empty() {
        return Access::Allow;
    }

    match role {
        None => Access::Redirect(LOGIN_PATH.to_string()),
        Some(role) if required.contains(&role) => Access::Allow,
        Some(_) => Access::Redirect(HOME_PATH.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,
    Profile,
    Settings,
    StudentDashboard,
    TeacherDashboard,
    AdminDashboard,
    CourseLectures { course_id: String },
}

const ANY_ROLE: &[Role] = &[Role::Student, Role::Teacher, Role::Admin];

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Home => HOME_PATH.to_string(),
            Route::Login => LOGIN_PATH.to_string(),
            Route::Profile => "/profile".to_string(),
            Route::Settings => "/settings".to_string(),
            Route::StudentDashboard => "/student-dashboard".to_string(),
            Route::TeacherDashboard => "/teacher-dashboard".to_string(),
            Route::AdminDashboard => "/admin-dashboard".to_string(),
            Route::CourseLectures { course_id } => format!("/courses/{}/lectures", course_id),
        }
    }

    pub fn required_roles(&self) -> &'static [Role] {
        match self {
            Route::Home | Route::Login => &[],
            Route::Profile | Route::Settings => ANY_ROLE,
            Route::StudentDashboard | Route::CourseLectures { .. } => &[Role::Student, Role::Admin],
            Route::TeacherDashboard => &[Role::Teacher, Role::Admin],
            Route::AdminDashboard => &[Role::Admin],
        }
    }

    pub fn authorize(&self, role: Option<Role>) -> Access {
        let access = authorize(role, self.required_roles());
        if let Access::Redirect(target) = &access {
            tracing::debug!("Route {} redirected to {}", self.path(), target);
        }
        access
    }
}
