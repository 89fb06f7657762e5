use crate::{
    auth::{
        auth::AuthUser,
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
        session::Session,
    },
    config::Config,
    error::ApiError,
    model::{
        role::Role,
        timestamp::format_timestamp,
        user::{Credential, PasswordResetRecord, RefreshTokenRecord, UserProfile},
    },
    models::{ForgotPasswordReq, LoginReqDto, RegisterReq, ResetPasswordReq, TokenType},
    store::{CollectionPath, DocumentStore, Precondition, StoreError, read, write},
    utils::{email_cache::EmailCache, email_filter::EmailFilter, email_filter::normalize},
};
use actix_web::{HttpRequest, HttpResponse, get, web};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 6;

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && domain.contains('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

fn validate_registration(req: &RegisterReq) -> Result<(), ApiError> {
    if req.first_name.trim().is_empty() || req.last_name.trim().is_empty() {
        return Err(ApiError::BadRequest("First and last name are required".into()));
    }
    if !looks_like_email(req.email.trim()) {
        return Err(ApiError::BadRequest("A valid email is required".into()));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    if req.password != req.confirm_password {
        return Err(ApiError::BadRequest("Passwords do not match".into()));
    }
    Ok(())
}

/// true  => email AVAILABLE
/// false => email TAKEN
pub async fn is_email_available(
    email: &str,
    store: &dyn DocumentStore,
    filter: &EmailFilter,
    cache: &EmailCache,
) -> Result<bool, ApiError> {
    let email = normalize(email);

    // cuckoo filter: a miss means never registered
    if !filter.might_exist(&email) {
        return Ok(true);
    }

    // moka cache: a hit means taken
    if cache.is_taken(&email).await {
        return Ok(false);
    }

    let exists = store
        .get(&CollectionPath::credentials().doc(email.as_str()))
        .await?
        .is_some();
    if exists {
        cache.mark_taken(&email).await;
    }
    Ok(!exists)
}

/// Stores the record backing a freshly issued refresh token.
async fn store_refresh_token(
    store: &dyn DocumentStore,
    uid: &str,
    jti: &str,
    exp: usize,
) -> Result<(), ApiError> {
    let record = RefreshTokenRecord {
        uid: uid.to_string(),
        expires_at: exp as i64,
        revoked: false,
    };
    write(
        store,
        &CollectionPath::refresh_tokens().doc(jti),
        &record,
        Precondition::Absent,
    )
    .await?;
    Ok(())
}

#[derive(Serialize)]
struct TokenPair {
    access_token: String,
    refresh_token: String,
}

fn issue_pair(
    uid: &str,
    email: &str,
    role: Role,
    config: &Config,
) -> Result<(TokenPair, String, usize), ApiError> {
    let access_token =
        generate_access_token(uid, email, role, &config.jwt_secret, config.access_token_ttl)
            .map_err(|e| {
                error!(error = %e, "Failed to sign access token");
                ApiError::Internal
            })?;
    let (refresh_token, claims) =
        generate_refresh_token(uid, email, role, &config.jwt_secret, config.refresh_token_ttl)
            .map_err(|e| {
                error!(error = %e, "Failed to sign refresh token");
                ApiError::Internal
            })?;
    Ok((
        TokenPair {
            access_token,
            refresh_token,
        },
        claims.jti,
        claims.exp,
    ))
}

/// User registration handler
#[instrument(
    name = "auth_register",
    skip(req, store, config, filter, cache),
    fields(email = %req.email)
)]
pub async fn register(
    req: web::Json<RegisterReq>,
    store: web::Data<dyn DocumentStore>,
    config: web::Data<Config>,
    filter: web::Data<EmailFilter>,
    cache: web::Data<EmailCache>,
) -> Result<HttpResponse, ApiError> {
    validate_registration(&req)?;
    let email = normalize(&req.email);

    if !is_email_available(&email, store.get_ref(), &filter, &cache).await? {
        info!("Registration rejected: email taken");
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    let password_hash = hash_password(&req.password).map_err(|e| {
        error!(error = %e, "Password hashing failed");
        ApiError::Internal
    })?;

    let uid = Uuid::new_v4().to_string();
    let now = Utc::now();
    let profile = UserProfile {
        first_name: req.first_name.trim().to_string(),
        last_name: req.last_name.trim().to_string(),
        email: email.clone(),
        role: Role::resolve(Role::Employee, &email, &config.manager_emails),
        profile_photo: None,
        created_at: Some(now),
        updated_at: None,
        last_login_at: None,
    };
    let profile_path = CollectionPath::users().doc(uid.as_str());
    write(store.get_ref(), &profile_path, &profile, Precondition::Absent).await?;

    let credential = Credential {
        uid: uid.clone(),
        password_hash,
    };

    // the absent precondition settles concurrent registrations of one email
    if let Err(e) = write(
        store.get_ref(),
        &CollectionPath::credentials().doc(email.as_str()),
        &credential,
        Precondition::Absent,
    )
    .await
    {
        // without a credential nothing can reach the profile
        if let Err(cleanup) = store.delete(&profile_path, Precondition::Any).await {
            error!(uid = %uid, error = %cleanup, "Failed to remove orphaned profile");
        }
        return Err(match e {
            StoreError::PreconditionFailed(_) => {
                ApiError::Conflict("Email already registered".into())
            }
            other => other.into(),
        });
    }

    filter.insert(&email);
    cache.mark_taken(&email).await;

    info!(uid = %uid, role = %profile.role, "User registered");
    Ok(HttpResponse::Created().json(json!({
        "message": "User registered successfully",
        "uid": uid
    })))
}

#[derive(Serialize)]
struct LoginResponse {
    #[serde(flatten)]
    tokens: TokenPair,
    role: Role,
    dashboard: String,
}

#[instrument(
    name = "auth_login",
    skip(store, config, cache, user),
    fields(email = %user.email)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    store: web::Data<dyn DocumentStore>,
    config: web::Data<Config>,
    cache: web::Data<EmailCache>,
) -> Result<HttpResponse, ApiError> {
    info!("Login request received");

    if user.email.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty email or password");
        return Err(ApiError::BadRequest("Email and password are required".into()));
    }
    let email = normalize(&user.email);

    debug!("Fetching credentials");
    let credential = match read::<Credential>(
        store.get_ref(),
        &CollectionPath::credentials().doc(email.as_str()),
    )
    .await?
    {
        Some((credential, _)) => credential,
        None => {
            info!("Invalid credentials: unknown email");
            return Err(ApiError::Unauthorized("Invalid credentials".into()));
        }
    };

    if let Err(e) = verify_password(&user.password, &credential.password_hash) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    }
    debug!(uid = %credential.uid, "Password verified");

    let stored_role = read::<UserProfile>(
        store.get_ref(),
        &CollectionPath::users().doc(credential.uid.as_str()),
    )
    .await?
    .map(|(profile, _)| profile.role)
    .unwrap_or_default();
    let role = Role::resolve(stored_role, &email, &config.manager_emails);

    let (tokens, jti, exp) = issue_pair(&credential.uid, &email, role, &config)?;
    debug!(jti = %jti, "Storing refresh token");
    store_refresh_token(store.get_ref(), &credential.uid, &jti, exp).await?;

    // last login feeds the email cache warmup; failure must not block login
    let mut patch = Map::new();
    patch.insert(
        "lastLoginAt".into(),
        Value::String(format_timestamp(&Utc::now())),
    );
    if role != stored_role {
        info!(from = %stored_role, to = %role, "Promoting listed manager email");
        patch.insert("role".into(), Value::String(role.to_string()));
    }
    if let Err(e) = store
        .merge(&CollectionPath::users().doc(credential.uid.as_str()), patch)
        .await
    {
        error!(error = %e, "Failed to update login metadata");
    }
    cache.mark_taken(&email).await;

    info!(role = %role, "Login successful");
    Ok(HttpResponse::Ok().json(LoginResponse {
        tokens,
        role,
        dashboard: role.to_string(),
    }))
}

pub async fn refresh_token(
    req: HttpRequest,
    store: web::Data<dyn DocumentStore>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let token = bearer(&req).ok_or_else(|| ApiError::Unauthorized("No token".into()))?;
    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| ApiError::Unauthorized("Invalid or expired token".into()))?;
    if claims.token_type != TokenType::Refresh {
        return Err(ApiError::Unauthorized("Refresh token required".into()));
    }

    let path = CollectionPath::refresh_tokens().doc(claims.jti.as_str());
    let (record, version) = match read::<RefreshTokenRecord>(store.get_ref(), &path).await? {
        Some((record, version)) if !record.revoked && record.uid == claims.uid => {
            (record, version)
        }
        _ => return Err(ApiError::Unauthorized("Refresh token revoked".into())),
    };

    // revoke the old token; a lost race means it was already used
    let revoked = RefreshTokenRecord {
        revoked: true,
        ..record
    };
    match write(store.get_ref(), &path, &revoked, Precondition::Version(version)).await {
        Ok(_) => {}
        Err(StoreError::PreconditionFailed(_)) => {
            return Err(ApiError::Unauthorized("Refresh token revoked".into()));
        }
        Err(e) => return Err(e.into()),
    }

    // the role is re-read so changes reach refreshed sessions
    let stored_role = read::<UserProfile>(
        store.get_ref(),
        &CollectionPath::users().doc(claims.uid.as_str()),
    )
    .await?
    .map(|(profile, _)| profile.role)
    .unwrap_or_default();
    let role = Role::resolve(stored_role, &claims.sub, &config.manager_emails);
    let (tokens, jti, exp) = issue_pair(&claims.uid, &claims.sub, role, &config)?;
    store_refresh_token(store.get_ref(), &claims.uid, &jti, exp).await?;

    info!(uid = %claims.uid, "Refresh token rotated");
    Ok(HttpResponse::Ok().json(tokens))
}

/// Always 204; revokes the refresh token when one is presented.
pub async fn logout(
    req: HttpRequest,
    store: web::Data<dyn DocumentStore>,
    config: web::Data<Config>,
) -> HttpResponse {
    let Some(token) = bearer(&req) else {
        return HttpResponse::NoContent().finish();
    };
    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::Refresh => c,
        _ => return HttpResponse::NoContent().finish(),
    };

    let path = CollectionPath::refresh_tokens().doc(claims.jti.as_str());
    match read::<RefreshTokenRecord>(store.get_ref(), &path).await {
        Ok(Some((record, _))) if !record.revoked => {
            let revoked = RefreshTokenRecord {
                revoked: true,
                ..record
            };
            if let Err(e) = write(store.get_ref(), &path, &revoked, Precondition::Any).await {
                error!(error = %e, "Failed to revoke refresh token");
            }
        }
        Ok(_) => {}
        Err(e) => error!(error = %e, "Failed to read refresh token"),
    }

    HttpResponse::NoContent().finish()
}

fn reset_requested() -> HttpResponse {
    HttpResponse::Accepted().json(json!({
        "message": "If the email is registered, a reset link has been sent"
    }))
}

/// Issues a single-use reset token. The answer is the same whether or not
/// the email is registered.
#[instrument(
    name = "auth_forgot_password",
    skip(req, store, config),
    fields(email = %req.email)
)]
pub async fn forgot_password(
    req: web::Json<ForgotPasswordReq>,
    store: web::Data<dyn DocumentStore>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    if req.email.trim().is_empty() {
        return Err(ApiError::BadRequest("Please enter your email".into()));
    }
    let email = normalize(&req.email);

    let registered = store
        .get(&CollectionPath::credentials().doc(email.as_str()))
        .await?
        .is_some();
    if !registered {
        info!("Password reset requested for an unknown email");
        return Ok(reset_requested());
    }

    let token = Uuid::new_v4().to_string();
    let record = PasswordResetRecord {
        email,
        expires_at: Utc::now().timestamp() + config.password_reset_ttl as i64,
        used: false,
    };
    write(
        store.get_ref(),
        &CollectionPath::password_resets().doc(token.as_str()),
        &record,
        Precondition::Absent,
    )
    .await?;

    // stands in for the reset email
    info!(token = %token, expires_at = record.expires_at, "Password reset token issued");
    Ok(reset_requested())
}

#[instrument(name = "auth_reset_password", skip(req, store))]
pub async fn reset_password(
    req: web::Json<ResetPasswordReq>,
    store: web::Data<dyn DocumentStore>,
) -> Result<HttpResponse, ApiError> {
    let invalid = || ApiError::BadRequest("Invalid or expired reset token".into());

    if req.new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    let token = req.token.trim();
    if token.is_empty() {
        return Err(invalid());
    }

    let path = CollectionPath::password_resets().doc(token);
    let (record, version) = match read::<PasswordResetRecord>(store.get_ref(), &path).await? {
        Some((record, version)) if !record.used => (record, version),
        _ => {
            info!("Reset rejected: unknown or used token");
            return Err(invalid());
        }
    };
    if record.expires_at <= Utc::now().timestamp() {
        info!("Reset rejected: token expired");
        return Err(invalid());
    }

    let password_hash = hash_password(&req.new_password).map_err(|e| {
        error!(error = %e, "Password hashing failed");
        ApiError::Internal
    })?;

    // consume the token first; a lost race means it was already used
    let used = PasswordResetRecord {
        used: true,
        ..record
    };
    match write(store.get_ref(), &path, &used, Precondition::Version(version)).await {
        Ok(_) => {}
        Err(StoreError::PreconditionFailed(_)) => return Err(invalid()),
        Err(e) => return Err(e.into()),
    }

    let credential_path = CollectionPath::credentials().doc(used.email.as_str());
    let (credential, credential_version) = read::<Credential>(store.get_ref(), &credential_path)
        .await?
        .ok_or_else(invalid)?;
    let uid = credential.uid.clone();
    let updated = Credential {
        password_hash,
        ..credential
    };
    match write(
        store.get_ref(),
        &credential_path,
        &updated,
        Precondition::Version(credential_version),
    )
    .await
    {
        Ok(_) => {}
        Err(StoreError::PreconditionFailed(_)) => {
            return Err(ApiError::Conflict(
                "Account changed during the reset, please request a new link".into(),
            ));
        }
        Err(e) => return Err(e.into()),
    }

    info!(uid = %uid, "Password reset");
    Ok(HttpResponse::Ok().json(json!({
        "message": "Password has been reset"
    })))
}

/// Current session
#[utoipa::path(
    get,
    path = "/api/session",
    responses(
        (status = 200, description = "Caller identity and profile", body = Session),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Session"
)]
#[get("/session")]
pub async fn session(
    auth: AuthUser,
    store: web::Data<dyn DocumentStore>,
) -> Result<HttpResponse, ApiError> {
    let session = Session::load(store.get_ref(), &auth, Utc::now()).await?;
    Ok(HttpResponse::Ok().json(session))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::KeyRange;
    use crate::test_support::{TestState, init_app, peer};
    use actix_web::{http::StatusCode, test};

    fn register_body(email: &str) -> Value {
        json!({
            "firstName": "Ann",
            "lastName": "Lee",
            "email": email,
            "password": "secret1",
            "confirmPassword": "secret1"
        })
    }

    #[::core::prelude::v1::test]
    fn registration_validation() {
        let mut req: RegisterReq = serde_json::from_value(register_body("ann@x.io")).unwrap();
        assert!(validate_registration(&req).is_ok());

        req.email = "not-an-email".into();
        assert!(validate_registration(&req).is_err());

        req.email = "ann@x.io".into();
        req.confirm_password = "secret2".into();
        assert!(validate_registration(&req).is_err());

        req.password = "short".into();
        req.confirm_password = "short".into();
        assert!(validate_registration(&req).is_err());
    }

    #[actix_web::test]
    async fn register_then_login() {
        let state = TestState::new();
        let app = init_app!(state);

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/register")
                .peer_addr(peer())
                .set_json(register_body("Ann@X.io"))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/register")
                .peer_addr(peer())
                .set_json(register_body("ann@x.io"))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/login")
                .peer_addr(peer())
                .set_json(json!({"email": "ann@x.io", "password": "wrong!"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/login")
                .peer_addr(peer())
                .set_json(json!({"email": "ann@x.io", "password": "secret1"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["role"], "employee");
        assert_eq!(body["dashboard"], "employee");
        assert!(body["access_token"].is_string());
    }

    #[actix_web::test]
    async fn manager_emails_register_as_managers() {
        let state = TestState::new();
        let app = init_app!(state);

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/register")
                .peer_addr(peer())
                .set_json(register_body("boss@worktrack.test"))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/login")
                .peer_addr(peer())
                .set_json(json!({"email": "boss@worktrack.test", "password": "secret1"}))
                .to_request(),
        )
        .await;
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["dashboard"], "manager");
    }

    #[actix_web::test]
    async fn refresh_rotates_and_logout_revokes() {
        let state = TestState::new();
        let app = init_app!(state);

        test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/register")
                .peer_addr(peer())
                .set_json(register_body("ann@x.io"))
                .to_request(),
        )
        .await;
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/login")
                .peer_addr(peer())
                .set_json(json!({"email": "ann@x.io", "password": "secret1"}))
                .to_request(),
        )
        .await;
        let body: Value = test::read_body_json(resp).await;
        let first = body["refresh_token"].as_str().unwrap().to_string();

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/refresh")
                .peer_addr(peer())
                .insert_header(("Authorization", format!("Bearer {}", first)))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        let second = body["refresh_token"].as_str().unwrap().to_string();

        // the rotated token is single use
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/refresh")
                .peer_addr(peer())
                .insert_header(("Authorization", format!("Bearer {}", first)))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/logout")
                .peer_addr(peer())
                .insert_header(("Authorization", format!("Bearer {}", second)))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/refresh")
                .peer_addr(peer())
                .insert_header(("Authorization", format!("Bearer {}", second)))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/logout")
                .peer_addr(peer())
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    async fn reset_tokens(state: &TestState) -> Vec<String> {
        state
            .store
            .list(&CollectionPath::password_resets(), &KeyRange::all())
            .await
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect()
    }

    #[actix_web::test]
    async fn reset_password_then_login() {
        let state = TestState::new();
        let app = init_app!(state);

        test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/register")
                .peer_addr(peer())
                .set_json(register_body("ann@x.io"))
                .to_request(),
        )
        .await;

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/forgot-password")
                .peer_addr(peer())
                .set_json(json!({"email": "Ann@X.io"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        let tokens = reset_tokens(&state).await;
        assert_eq!(tokens.len(), 1);

        let reset = json!({"token": tokens[0], "newPassword": "changed1"});
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/reset-password")
                .peer_addr(peer())
                .set_json(reset.clone())
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/login")
                .peer_addr(peer())
                .set_json(json!({"email": "ann@x.io", "password": "secret1"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/login")
                .peer_addr(peer())
                .set_json(json!({"email": "ann@x.io", "password": "changed1"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        // tokens are single use
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/reset-password")
                .peer_addr(peer())
                .set_json(json!({"token": tokens[0], "newPassword": "again123"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn forgot_password_hides_unknown_emails() {
        let state = TestState::new();
        let app = init_app!(state);

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/forgot-password")
                .peer_addr(peer())
                .set_json(json!({"email": "nobody@x.io"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert!(reset_tokens(&state).await.is_empty());

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/forgot-password")
                .peer_addr(peer())
                .set_json(json!({"email": "  "}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn expired_reset_token_is_refused() {
        let state = TestState::new();
        let app = init_app!(state);

        test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/register")
                .peer_addr(peer())
                .set_json(register_body("ann@x.io"))
                .to_request(),
        )
        .await;
        let record = PasswordResetRecord {
            email: "ann@x.io".into(),
            expires_at: Utc::now().timestamp() - 1,
            used: false,
        };
        write(
            state.store.as_ref(),
            &CollectionPath::password_resets().doc("stale"),
            &record,
            Precondition::Absent,
        )
        .await
        .unwrap();

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/reset-password")
                .peer_addr(peer())
                .set_json(json!({"token": "stale", "newPassword": "changed1"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/login")
                .peer_addr(peer())
                .set_json(json!({"email": "ann@x.io", "password": "secret1"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn refresh_picks_up_role_changes() {
        let state = TestState::new();
        let app = init_app!(state);

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/register")
                .peer_addr(peer())
                .set_json(register_body("ann@x.io"))
                .to_request(),
        )
        .await;
        let body: Value = test::read_body_json(resp).await;
        let uid = body["uid"].as_str().unwrap().to_string();

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/login")
                .peer_addr(peer())
                .set_json(json!({"email": "ann@x.io", "password": "secret1"}))
                .to_request(),
        )
        .await;
        let body: Value = test::read_body_json(resp).await;
        let refresh = body["refresh_token"].as_str().unwrap().to_string();

        let mut patch = Map::new();
        patch.insert("role".into(), json!("manager"));
        state
            .store
            .merge(&CollectionPath::users().doc(uid.as_str()), patch)
            .await
            .unwrap();

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/refresh")
                .peer_addr(peer())
                .insert_header(("Authorization", format!("Bearer {}", refresh)))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        let claims = verify_token(
            body["access_token"].as_str().unwrap(),
            &state.config.jwt_secret,
        )
        .unwrap();
        assert_eq!(claims.role, "manager");
    }

    #[actix_web::test]
    async fn login_promotes_listed_manager_emails() {
        let state = TestState::new();
        let app = init_app!(state);

        // registered as an employee before the email was listed
        state
            .seed_user("m1", "boss@worktrack.test", "Jo", "Boss", Role::Employee)
            .await;
        let credential = Credential {
            uid: "m1".into(),
            password_hash: hash_password("secret1").unwrap(),
        };
        write(
            state.store.as_ref(),
            &CollectionPath::credentials().doc("boss@worktrack.test"),
            &credential,
            Precondition::Absent,
        )
        .await
        .unwrap();

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/login")
                .peer_addr(peer())
                .set_json(json!({"email": "boss@worktrack.test", "password": "secret1"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["role"], "manager");

        let (profile, _) = read::<UserProfile>(state.store.as_ref(), &CollectionPath::users().doc("m1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(profile.role, Role::Manager);
    }

    #[actix_web::test]
    async fn lost_registration_race_leaves_no_profile() {
        let state = TestState::new();
        let app = init_app!(state);

        // another node took the email; this node's filter has not seen it
        let credential = Credential {
            uid: "other".into(),
            password_hash: "x".into(),
        };
        write(
            state.store.as_ref(),
            &CollectionPath::credentials().doc("ann@x.io"),
            &credential,
            Precondition::Absent,
        )
        .await
        .unwrap();

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/auth/register")
                .peer_addr(peer())
                .set_json(register_body("ann@x.io"))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let users = state
            .store
            .list(&CollectionPath::users(), &KeyRange::all())
            .await
            .unwrap();
        assert!(users.is_empty());
    }

    #[actix_web::test]
    async fn session_requires_a_token() {
        let state = TestState::new();
        let app = init_app!(state);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/session")
                .peer_addr(peer())
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let token = state.seed_user("u1", "ann@x.io", "Ann", "Lee", Role::Employee).await;
        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/session")
                .peer_addr(peer())
                .insert_header(("Authorization", format!("Bearer {}", token)))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["uid"], "u1");
        assert_eq!(body["profile"]["firstName"], "Ann");
    }
}
