use crate::api::profile::PhotoReq;
use crate::auth::session::Session;
use crate::model::attendance::DayState;
use crate::model::project::{AssignedUser, ProjectStatus};
use crate::model::role::Role;
use crate::model::user::UserProfile;
use crate::service::accounting::{AttendanceStatus, WorkedTimeView};
use crate::service::attendance::{AttendanceDay, MonthlyRow, RosterRow};
use crate::service::project::{NewProject, ProjectView};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "WorkTrack API",
        version = "1.0.0",
        description = r#"
## Attendance & Project Tracking

Backend for a small workplace: employees check in and out once per day and
follow the projects they are assigned to; managers see everyone's attendance
and run the project lifecycle.

### 🔹 Key Features
- **Attendance**
  - One record per user per day, check-in then check-out
  - Worked time as decimal hours and `Xh Ym`, live while checked in
  - Monthly log per user and a daily roster of all employees
- **Projects**
  - Create, assign, hold, resume, complete and terminate
  - Live change feed as server-sent events
- **Profile**
  - Names and a profile photo

### 🔐 Security
Endpoints under `/api` require a **JWT Bearer** access token from
`/auth/login`. Roster, project management and other users' logs are
**manager** only.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::session,

        crate::api::profile::get_profile,
        crate::api::profile::update_profile,
        crate::api::profile::set_photo,
        crate::api::profile::delete_photo,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::today,
        crate::api::attendance::monthly,
        crate::api::attendance::daily,

        crate::api::project::create_project,
        crate::api::project::list_projects,
        crate::api::project::my_projects,
        crate::api::project::stream_projects,
        crate::api::project::complete_project,
        crate::api::project::hold_project,
        crate::api::project::resume_project,
        crate::api::project::terminate_project
    ),
    components(
        schemas(
            Session,
            Role,
            UserProfile,
            PhotoReq,
            DayState,
            AttendanceStatus,
            WorkedTimeView,
            AttendanceDay,
            MonthlyRow,
            RosterRow,
            ProjectStatus,
            AssignedUser,
            NewProject,
            ProjectView
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Session", description = "Caller identity"),
        (name = "Profile", description = "Profile management APIs"),
        (name = "Attendance", description = "Attendance management APIs"),
        (name = "Project", description = "Project management APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
