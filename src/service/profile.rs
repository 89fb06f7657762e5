use crate::error::ApiError;
use crate::model::timestamp::format_timestamp;
use crate::model::user::UserProfile;
use crate::store::{CollectionPath, DocumentStore, read};
use crate::utils::doc_merge::build_merge_patch;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};

const EDITABLE_FIELDS: &[&str] = &["firstName", "lastName"];

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub async fn get(store: &dyn DocumentStore, uid: &str) -> Result<Option<UserProfile>, ApiError> {
    Ok(read::<UserProfile>(store, &CollectionPath::users().doc(uid))
        .await?
        .map(|(profile, _)| profile))
}

/// Returns the profile, writing a stub `{email, createdAt}` when none exists.
pub async fn load_or_create(
    store: &dyn DocumentStore,
    uid: &str,
    email: &str,
    now: DateTime<Utc>,
) -> Result<UserProfile, ApiError> {
    if let Some(profile) = get(store, uid).await? {
        return Ok(profile);
    }

    tracing::info!(uid, "Creating missing profile document");
    store
        .merge(
            &CollectionPath::users().doc(uid),
            object(json!({
                "email": email,
                "createdAt": format_timestamp(&now),
            })),
        )
        .await?;

    Ok(UserProfile {
        email: email.to_string(),
        created_at: Some(now),
        ..UserProfile::default()
    })
}

/// Merges `firstName` / `lastName` from a client payload.
pub async fn update(
    store: &dyn DocumentStore,
    uid: &str,
    payload: &Value,
    now: DateTime<Utc>,
) -> Result<UserProfile, ApiError> {
    let mut patch = build_merge_patch(payload, EDITABLE_FIELDS)?;
    if patch.values().any(|v| !v.is_string()) {
        return Err(ApiError::BadRequest("Names must be strings".into()));
    }
    patch.insert("updatedAt".into(), Value::String(format_timestamp(&now)));

    let path = CollectionPath::users().doc(uid);
    store.merge(&path, patch).await?;
    get(store, uid)
        .await?
        .ok_or_else(|| ApiError::NotFound("Profile not found".into()))
}

/// Validates a `data:image/<type>;base64,<payload>` URI.
fn validate_photo(data_uri: &str, max_bytes: usize) -> Result<(), ApiError> {
    if data_uri.len() > max_bytes {
        return Err(ApiError::PayloadTooLarge(
            "Image is too large. Please select a smaller image".into(),
        ));
    }
    let rest = data_uri
        .strip_prefix("data:image/")
        .ok_or_else(|| ApiError::BadRequest("Profile photo must be an image data URI".into()))?;
    let (media, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| ApiError::BadRequest("Profile photo must be base64 encoded".into()))?;
    let valid_media = !media.is_empty() && media.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.');
    let valid_payload = !payload.is_empty()
        && payload
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '='));
    if !valid_media || !valid_payload {
        return Err(ApiError::BadRequest("Malformed image data URI".into()));
    }
    Ok(())
}

pub async fn set_photo(
    store: &dyn DocumentStore,
    uid: &str,
    data_uri: &str,
    max_bytes: usize,
    now: DateTime<Utc>,
) -> Result<(), ApiError> {
    validate_photo(data_uri, max_bytes)?;
    store
        .merge(
            &CollectionPath::users().doc(uid),
            object(json!({
                "profilePhoto": data_uri,
                "updatedAt": format_timestamp(&now),
            })),
        )
        .await?;
    tracing::info!(uid, bytes = data_uri.len(), "Profile photo updated");
    Ok(())
}

pub async fn delete_photo(
    store: &dyn DocumentStore,
    uid: &str,
    now: DateTime<Utc>,
) -> Result<(), ApiError> {
    store
        .merge(
            &CollectionPath::users().doc(uid),
            object(json!({
                "profilePhoto": null,
                "profilePicture": null,
                "updatedAt": format_timestamp(&now),
            })),
        )
        .await?;
    Ok(())
}
