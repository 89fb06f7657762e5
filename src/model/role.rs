use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Default, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    #[default]
    Employee,
    Manager,
}

impl Role {
    pub fn from_claim(role: &str) -> Option<Self> {
        Role::from_str(role).ok()
    }

    /// Effective role of an account: listed manager emails are managers
    /// whatever their stored role says, everyone else keeps `stored`.
    pub fn resolve(stored: Role, email: &str, manager_emails: &[String]) -> Self {
        if manager_emails
            .iter()
            .any(|m| m.eq_ignore_ascii_case(email.trim()))
        {
            Role::Manager
        } else {
            stored
        }
    }
}
