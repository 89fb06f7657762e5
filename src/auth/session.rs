use crate::auth::auth::AuthUser;
use crate::error::ApiError;
use crate::model::role::Role;
use crate::model::user::UserProfile;
use crate::service::profile;
use crate::store::DocumentStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Caller state resolved per request from the bearer token plus the stored
/// profile. Started by login, ended by logout revoking the refresh token.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Session {
    pub uid: String,
    pub email: String,
    pub role: Role,
    /// `manager` or `employee`; the dashboard the client should open.
    pub dashboard: String,
    pub profile: UserProfile,
}

impl Session {
    pub async fn load(
        store: &dyn DocumentStore,
        user: &AuthUser,
        now: DateTime<Utc>,
    ) -> Result<Self, ApiError> {
        let profile = profile::load_or_create(store, &user.uid, &user.email, now).await?;
        Ok(Self {
            uid: user.uid.clone(),
            email: user.email.clone(),
            role: user.role,
            dashboard: user.role.to_string(),
            profile,
        })
    }
}
