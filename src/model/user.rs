use super::role::Role;
use super::timestamp::flexible;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

/// `users/{uid}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", from = "StoredProfile")]
#[schema(example = json!({
    "firstName": "John",
    "lastName": "Doe",
    "email": "john.doe@company.com",
    "role": "employee",
    "profilePhoto": null,
    "createdAt": "2025-05-01T09:00:00.000Z"
}))]
pub struct UserProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    pub profile_photo: Option<String>,
    #[serde(with = "flexible", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = "date-time")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(with = "flexible", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = "date-time")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(with = "flexible", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = "date-time")]
    pub last_login_at: Option<DateTime<Utc>>,
}

/// A `users/{uid}` document as it may be found on disk. Older clients wrote
/// the photo as `profilePicture`; both spellings can coexist on one document
/// and `profilePhoto` wins.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredProfile {
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    role: Role,
    /// Cleared photos were historically stored as `""`, which reads as none.
    #[serde(default, deserialize_with = "empty_as_none")]
    profile_photo: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    profile_picture: Option<String>,
    #[serde(default, with = "flexible")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "flexible")]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default, with = "flexible")]
    last_login_at: Option<DateTime<Utc>>,
}

impl From<StoredProfile> for UserProfile {
    fn from(stored: StoredProfile) -> Self {
        Self {
            first_name: stored.first_name,
            last_name: stored.last_name,
            email: stored.email,
            role: stored.role,
            profile_photo: stored.profile_photo.or(stored.profile_picture),
            created_at: stored.created_at,
            updated_at: stored.updated_at,
            last_login_at: stored.last_login_at,
        }
    }
}

impl UserProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }

    /// Name denormalised onto projects: full name, else email, else a placeholder.
    pub fn display_name(&self) -> String {
        let name = self.full_name();
        if !name.is_empty() {
            name
        } else if !self.email.trim().is_empty() {
            self.email.trim().to_string()
        } else {
            "Unknown User".to_string()
        }
    }
}

fn empty_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.trim().is_empty()))
}

/// `credentials/{lowercased email}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub uid: String,
    pub password_hash: String,
}

/// `refresh_tokens/{jti}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRecord {
    pub uid: String,
    /// Unix seconds.
    pub expires_at: i64,
    #[serde(default)]
    pub revoked: bool,
}

/// `password_resets/{token}`, consumed by the first successful reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetRecord {
    pub email: String,
    /// Unix seconds.
    pub expires_at: i64,
    #[serde(default)]
    pub used: bool,
}
