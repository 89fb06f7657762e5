use super::timestamp::flexible;
use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum_macros::EnumString;
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Default, Serialize, Deserialize, EnumString, ToSchema,
    strum_macros::Display,
)]
pub enum ProjectStatus {
    #[default]
    #[serde(rename = "In Progress")]
    #[strum(serialize = "In Progress")]
    InProgress,
    #[serde(rename = "On Hold")]
    #[strum(serialize = "On Hold")]
    OnHold,
    #[serde(rename = "Completed")]
    #[strum(serialize = "Completed")]
    Completed,
}

/// Manager or assignee triggered status transitions.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum StatusChange {
    Hold,
    Resume,
    Complete,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Display)]
pub enum ProjectError {
    #[display(fmt = "Completed projects cannot be modified")]
    Finished,
    #[display(fmt = "Cannot move a project from {} to {}", from, to)]
    InvalidTransition {
        from: ProjectStatus,
        to: ProjectStatus,
    },
}

impl std::error::Error for ProjectError {}

impl ProjectStatus {
    /// `InProgress <-> OnHold`, either of them `-> Completed`; `Completed` is terminal.
    pub fn apply(self, change: StatusChange) -> Result<Self, ProjectError> {
        use ProjectStatus::*;
        match (self, change) {
            (Completed, _) => Err(ProjectError::Finished),
            (InProgress, StatusChange::Hold) => Ok(OnHold),
            (OnHold, StatusChange::Resume) => Ok(InProgress),
            (InProgress | OnHold, StatusChange::Complete) => Ok(Completed),
            (from, StatusChange::Hold) => Err(ProjectError::InvalidTransition { from, to: OnHold }),
            (from, StatusChange::Resume) => Err(ProjectError::InvalidTransition {
                from,
                to: InProgress,
            }),
        }
    }

    pub fn ensure_mutable(self) -> Result<(), ProjectError> {
        match self {
            ProjectStatus::Completed => Err(ProjectError::Finished),
            _ => Ok(()),
        }
    }
}

/// Denormalised at assignment time to avoid joins against `users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AssignedUser {
    #[schema(example = "8f14e45f")]
    pub id: String,
    #[schema(example = "John Doe")]
    pub name: String,
}

/// `projects/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default)]
    pub start_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub assigned_users: Vec<AssignedUser>,
    #[serde(default, with = "flexible", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, with = "flexible", skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Project {
    pub fn is_assigned(&self, uid: &str) -> bool {
        self.assigned_users.iter().any(|u| u.id == uid)
    }
}
