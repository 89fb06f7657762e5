use crate::auth::auth::AuthUser;
use crate::error::ApiError;
use crate::model::project::{AssignedUser, Project, ProjectStatus, StatusChange};
use crate::model::user::UserProfile;
use crate::store::{
    ChangeStream, CollectionPath, DocumentStore, KeyRange, Precondition, StoreError, list_as,
    read, write,
};
use crate::utils::dates::{WorkCalendar, day_key, parse_day_key};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    #[schema(example = "Warehouse audit")]
    pub title: String,
    #[schema(example = "Quarterly stock audit")]
    pub description: String,
    #[schema(example = "2025-05-01", format = "date")]
    pub start_date: String,
    #[schema(example = "Dhaka")]
    pub location: String,
    #[schema(example = json!(["8f14e45f"]))]
    pub assigned_user_ids: Vec<String>,
}

/// A stored project together with its id.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: ProjectStatus,
    pub start_date: String,
    pub end_date: Option<String>,
    pub location: String,
    pub assigned_users: Vec<AssignedUser>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProjectView {
    fn new(id: String, p: Project) -> Self {
        Self {
            id,
            title: p.title,
            description: p.description,
            status: p.status,
            start_date: p.start_date,
            end_date: p.end_date,
            location: p.location,
            assigned_users: p.assigned_users,
            created_at: p.created_at,
            created_by: p.created_by,
            completed_at: p.completed_at,
        }
    }
}

fn required(value: &str, field: &str) -> Result<String, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::BadRequest(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

/// Creates a project in `In Progress`, resolving assignee names from
/// their profiles.
pub async fn create(
    store: &dyn DocumentStore,
    manager: &AuthUser,
    input: NewProject,
    now: DateTime<Utc>,
) -> Result<ProjectView, ApiError> {
    manager.require_manager()?;

    let title = required(&input.title, "Title")?;
    let description = required(&input.description, "Description")?;
    let start_date = required(&input.start_date, "Start date")?;
    let location = required(&input.location, "Location")?;
    if parse_day_key(&start_date).is_none() {
        return Err(ApiError::BadRequest(
            "Start date must be formatted YYYY-MM-DD".into(),
        ));
    }

    let mut ids: Vec<String> = Vec::with_capacity(input.assigned_user_ids.len());
    for id in input.assigned_user_ids {
        let id = id.trim().to_string();
        if !id.is_empty() && !ids.contains(&id) {
            ids.push(id);
        }
    }
    if ids.is_empty() {
        return Err(ApiError::BadRequest(
            "At least one user must be assigned".into(),
        ));
    }

    let profiles = futures::future::try_join_all(
        ids.iter()
            .map(|id| async move { read::<UserProfile>(store, &CollectionPath::users().doc(id.as_str())).await }),
    )
    .await?;

    let mut assigned_users = Vec::with_capacity(ids.len());
    for (id, profile) in ids.into_iter().zip(profiles) {
        match profile {
            Some((profile, _)) => assigned_users.push(AssignedUser {
                name: profile.display_name(),
                id,
            }),
            None => return Err(ApiError::BadRequest(format!("Unknown user `{}`", id))),
        }
    }

    let project = Project {
        title,
        description,
        status: ProjectStatus::InProgress,
        start_date,
        end_date: None,
        location,
        assigned_users,
        created_at: Some(now),
        created_by: Some(manager.uid.clone()),
        completed_at: None,
    };

    let id = Uuid::new_v4().to_string();
    write(
        store,
        &CollectionPath::projects().doc(id.as_str()),
        &project,
        Precondition::Absent,
    )
    .await?;

    tracing::info!(project_id = %id, assignees = project.assigned_users.len(), "Project created");
    Ok(ProjectView::new(id, project))
}

fn newest_first(mut projects: Vec<ProjectView>) -> Vec<ProjectView> {
    // undated projects sort last
    projects.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    projects
}

pub async fn list_all(store: &dyn DocumentStore) -> Result<Vec<ProjectView>, ApiError> {
    let projects = list_as::<Project>(store, &CollectionPath::projects(), &KeyRange::all()).await?;
    Ok(newest_first(
        projects
            .into_iter()
            .map(|(id, p)| ProjectView::new(id, p))
            .collect(),
    ))
}

/// Projects whose assignees include `uid`.
pub async fn list_assigned(
    store: &dyn DocumentStore,
    uid: &str,
) -> Result<Vec<ProjectView>, ApiError> {
    let projects = list_as::<Project>(store, &CollectionPath::projects(), &KeyRange::all()).await?;
    Ok(newest_first(
        projects
            .into_iter()
            .filter(|(_, p)| p.is_assigned(uid))
            .map(|(id, p)| ProjectView::new(id, p))
            .collect(),
    ))
}

/// Applies a status transition. Completing is open to assignees as well
/// as managers.
pub async fn change_status(
    store: &dyn DocumentStore,
    calendar: &WorkCalendar,
    caller: &AuthUser,
    id: &str,
    change: StatusChange,
    now: DateTime<Utc>,
) -> Result<ProjectView, ApiError> {
    let path = CollectionPath::projects().doc(id);
    let (mut project, version) = read::<Project>(store, &path)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".into()))?;

    let allowed = match change {
        StatusChange::Complete => caller.is_manager() || project.is_assigned(&caller.uid),
        StatusChange::Hold | StatusChange::Resume => caller.is_manager(),
    };
    if !allowed {
        return Err(ApiError::Forbidden(
            "Not allowed to change this project".into(),
        ));
    }

    project.status = project.status.apply(change)?;
    if change == StatusChange::Complete {
        project.end_date = Some(day_key(calendar.day_of(now)));
        project.completed_at = Some(now);
    }

    match write(store, &path, &project, Precondition::Version(version)).await {
        Ok(_) => {}
        Err(StoreError::PreconditionFailed(_)) => {
            return Err(ApiError::Conflict(
                "Project was modified concurrently, please retry".into(),
            ));
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(project_id = %id, uid = %caller.uid, status = %project.status, "Project status changed");
    Ok(ProjectView::new(id.to_string(), project))
}

/// Deletes a project that has not been completed.
pub async fn terminate(
    store: &dyn DocumentStore,
    manager: &AuthUser,
    id: &str,
) -> Result<(), ApiError> {
    manager.require_manager()?;
    let path = CollectionPath::projects().doc(id);
    let (project, version) = read::<Project>(store, &path)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".into()))?;
    project.status.ensure_mutable()?;

    // only the version that passed the check may be removed
    match store.delete(&path, Precondition::Version(version)).await {
        Ok(_) => {}
        Err(StoreError::PreconditionFailed(_)) => {
            return Err(ApiError::Conflict(
                "Project was modified concurrently, please retry".into(),
            ));
        }
        Err(e) => return Err(e.into()),
    }
    tracing::info!(project_id = %id, uid = %manager.uid, "Project terminated");
    Ok(())
}

pub fn subscribe(store: &dyn DocumentStore) -> ChangeStream {
    store.subscribe(&CollectionPath::projects())
}
