use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::ApiError;
use crate::model::user::UserProfile;
use crate::service::profile;
use crate::store::DocumentStore;
use actix_web::{HttpResponse, web};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use utoipa::ToSchema;

/// Caller's profile
#[utoipa::path(
    get,
    path = "/api/profile",
    responses(
        (status = 200, description = "Profile, created on first access", body = UserProfile),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Profile"
)]
pub async fn get_profile(
    auth: AuthUser,
    store: web::Data<dyn DocumentStore>,
) -> Result<HttpResponse, ApiError> {
    let profile = profile::load_or_create(store.get_ref(), &auth.uid, &auth.email, Utc::now()).await?;
    Ok(HttpResponse::Ok().json(profile))
}

/// Update first / last name
#[utoipa::path(
    put,
    path = "/api/profile",
    request_body(content = Object, example = json!({
        "firstName": "John",
        "lastName": "Doe"
    })),
    responses(
        (status = 200, description = "Updated profile", body = UserProfile),
        (status = 400, description = "Unknown or empty fields", body = Object, example = json!({
            "message": "Field `role` cannot be updated"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Profile"
)]
pub async fn update_profile(
    auth: AuthUser,
    store: web::Data<dyn DocumentStore>,
    payload: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    let profile = profile::update(store.get_ref(), &auth.uid, &payload, Utc::now()).await?;
    Ok(HttpResponse::Ok().json(profile))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhotoReq {
    /// `data:image/<type>;base64,<payload>`
    #[schema(example = "data:image/png;base64,iVBORw0KGgo=")]
    pub profile_photo: String,
}

/// Set the profile photo
#[utoipa::path(
    put,
    path = "/api/profile/photo",
    request_body = PhotoReq,
    responses(
        (status = 200, description = "Photo stored", body = Object, example = json!({
            "message": "Profile photo updated"
        })),
        (status = 400, description = "Not an image data URI"),
        (status = 401, description = "Unauthorized"),
        (status = 413, description = "Image too large"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Profile"
)]
pub async fn set_photo(
    auth: AuthUser,
    store: web::Data<dyn DocumentStore>,
    config: web::Data<Config>,
    payload: web::Json<PhotoReq>,
) -> Result<HttpResponse, ApiError> {
    profile::set_photo(
        store.get_ref(),
        &auth.uid,
        payload.profile_photo.trim(),
        config.max_profile_photo_bytes,
        Utc::now(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Profile photo updated"
    })))
}

/// Remove the profile photo
#[utoipa::path(
    delete,
    path = "/api/profile/photo",
    responses(
        (status = 204, description = "Photo removed"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Profile"
)]
pub async fn delete_photo(
    auth: AuthUser,
    store: web::Data<dyn DocumentStore>,
) -> Result<HttpResponse, ApiError> {
    profile::delete_photo(store.get_ref(), &auth.uid, Utc::now()).await?;
    Ok(HttpResponse::NoContent().finish())
}
