use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::ApiError;
use crate::model::project::StatusChange;
use crate::service::project::{self, NewProject, ProjectView};
use crate::store::{ChangeEvent, DocumentStore};
use actix_web::{HttpResponse, web};
use chrono::Utc;
use futures::StreamExt;

/// Create project
#[utoipa::path(
    post,
    path = "/api/projects",
    request_body = NewProject,
    responses(
        (status = 201, description = "Project created", body = ProjectView),
        (status = 400, description = "Missing fields or unknown assignee", body = Object, example = json!({
            "message": "At least one user must be assigned"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Project"
)]
pub async fn create_project(
    auth: AuthUser,
    store: web::Data<dyn DocumentStore>,
    payload: web::Json<NewProject>,
) -> Result<HttpResponse, ApiError> {
    let view = project::create(store.get_ref(), &auth, payload.into_inner(), Utc::now()).await?;
    Ok(HttpResponse::Created().json(view))
}

/// List all projects, newest first
#[utoipa::path(
    get,
    path = "/api/projects",
    responses(
        (status = 200, description = "All projects", body = [ProjectView]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Project"
)]
pub async fn list_projects(
    auth: AuthUser,
    store: web::Data<dyn DocumentStore>,
) -> Result<HttpResponse, ApiError> {
    auth.require_manager()?;
    Ok(HttpResponse::Ok().json(project::list_all(store.get_ref()).await?))
}

/// Projects assigned to the caller
#[utoipa::path(
    get,
    path = "/api/projects/mine",
    responses(
        (status = 200, description = "Assigned projects", body = [ProjectView]),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Project"
)]
pub async fn my_projects(
    auth: AuthUser,
    store: web::Data<dyn DocumentStore>,
) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(project::list_assigned(store.get_ref(), &auth.uid).await?))
}

fn sse_frame(event: &ChangeEvent) -> Option<web::Bytes> {
    match serde_json::to_string(event) {
        Ok(json) => Some(web::Bytes::from(format!("data: {}\n\n", json))),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode project change");
            None
        }
    }
}

/// Live project changes as server-sent events
#[utoipa::path(
    get,
    path = "/api/projects/stream",
    responses(
        (status = 200, description = "text/event-stream of `upserted` / `deleted` events", body = Object, example = json!({
            "id": "0b5e4c1e",
            "type": "deleted"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Project"
)]
pub async fn stream_projects(
    auth: AuthUser,
    store: web::Data<dyn DocumentStore>,
) -> Result<HttpResponse, ApiError> {
    auth.require_manager()?;
    tracing::debug!(uid = %auth.uid, "Project feed opened");

    // the receiver lives inside the body stream and is dropped with the connection
    let body = project::subscribe(store.get_ref())
        .filter_map(|event| futures::future::ready(sse_frame(&event)))
        .map(Ok::<_, actix_web::Error>);

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(body))
}

async fn change_status(
    auth: AuthUser,
    store: web::Data<dyn DocumentStore>,
    config: web::Data<Config>,
    id: String,
    change: StatusChange,
) -> Result<HttpResponse, ApiError> {
    let view = project::change_status(
        store.get_ref(),
        &config.calendar(),
        &auth,
        &id,
        change,
        Utc::now(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(view))
}

/// Mark a project completed
#[utoipa::path(
    put,
    path = "/api/projects/{id}/complete",
    params(
        ("id" = String, Path, description = "Project id")
    ),
    responses(
        (status = 200, description = "Project completed", body = ProjectView),
        (status = 403, description = "Neither manager nor assignee"),
        (status = 404, description = "Project not found"),
        (status = 409, description = "Project already completed", body = Object, example = json!({
            "message": "Completed projects cannot be modified"
        })),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Project"
)]
pub async fn complete_project(
    auth: AuthUser,
    store: web::Data<dyn DocumentStore>,
    config: web::Data<Config>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    change_status(auth, store, config, path.into_inner(), StatusChange::Complete).await
}

/// Put a project on hold
#[utoipa::path(
    put,
    path = "/api/projects/{id}/hold",
    params(
        ("id" = String, Path, description = "Project id")
    ),
    responses(
        (status = 200, description = "Project on hold", body = ProjectView),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Project not found"),
        (status = 409, description = "Transition not allowed"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Project"
)]
pub async fn hold_project(
    auth: AuthUser,
    store: web::Data<dyn DocumentStore>,
    config: web::Data<Config>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    change_status(auth, store, config, path.into_inner(), StatusChange::Hold).await
}

/// Resume a project on hold
#[utoipa::path(
    put,
    path = "/api/projects/{id}/resume",
    params(
        ("id" = String, Path, description = "Project id")
    ),
    responses(
        (status = 200, description = "Project in progress", body = ProjectView),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Project not found"),
        (status = 409, description = "Transition not allowed"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Project"
)]
pub async fn resume_project(
    auth: AuthUser,
    store: web::Data<dyn DocumentStore>,
    config: web::Data<Config>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    change_status(auth, store, config, path.into_inner(), StatusChange::Resume).await
}

/// Terminate (delete) a project
#[utoipa::path(
    delete,
    path = "/api/projects/{id}",
    params(
        ("id" = String, Path, description = "Project id")
    ),
    responses(
        (status = 204, description = "Project deleted"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Project not found"),
        (status = 409, description = "Completed projects cannot be terminated"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Project"
)]
pub async fn terminate_project(
    auth: AuthUser,
    store: web::Data<dyn DocumentStore>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    project::terminate(store.get_ref(), &auth, &path).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use crate::model::role::Role;
    use crate::test_support::{TestState, init_app, peer};
    use actix_web::{http::StatusCode, test};
    use serde_json::{Value, json};

    fn bearer(token: &str) -> (&'static str, String) {
        ("Authorization", format!("Bearer {}", token))
    }

    #[actix_web::test]
    async fn manager_creates_and_assignee_completes() {
        let state = TestState::new();
        let app = init_app!(state);
        let boss = state.seed_user("m1", "boss@x.io", "Mia", "Boss", Role::Manager).await;
        let ann = state.seed_user("e1", "ann@x.io", "Ann", "Lee", Role::Employee).await;
        let bob = state.seed_user("e2", "bob@x.io", "Bob", "Ray", Role::Employee).await;

        let payload = json!({
            "title": "Audit",
            "description": "Stock audit",
            "startDate": "2025-05-01",
            "location": "Dhaka",
            "assignedUserIds": ["e1"]
        });

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/projects")
                .peer_addr(peer())
                .insert_header(bearer(&ann))
                .set_json(&payload)
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/projects")
                .peer_addr(peer())
                .insert_header(bearer(&boss))
                .set_json(&payload)
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Value = test::read_body_json(resp).await;
        let id = created["id"].as_str().unwrap().to_string();
        assert_eq!(created["status"], "In Progress");
        assert_eq!(created["assignedUsers"][0]["name"], "Ann Lee");

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/projects/mine")
                .peer_addr(peer())
                .insert_header(bearer(&bob))
                .to_request(),
        )
        .await;
        let mine: Value = test::read_body_json(resp).await;
        assert_eq!(mine.as_array().unwrap().len(), 0);

        let resp = test::call_service(
            &app,
            test::TestRequest::put()
                .uri(&format!("/api/projects/{}/hold", id))
                .peer_addr(peer())
                .insert_header(bearer(&ann))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = test::call_service(
            &app,
            test::TestRequest::put()
                .uri(&format!("/api/projects/{}/complete", id))
                .peer_addr(peer())
                .insert_header(bearer(&ann))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let done: Value = test::read_body_json(resp).await;
        assert_eq!(done["status"], "Completed");
        assert!(done["endDate"].is_string());

        let resp = test::call_service(
            &app,
            test::TestRequest::delete()
                .uri(&format!("/api/projects/{}", id))
                .peer_addr(peer())
                .insert_header(bearer(&boss))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[actix_web::test]
    async fn listing_all_is_manager_only() {
        let state = TestState::new();
        let app = init_app!(state);
        let ann = state.seed_user("e1", "ann@x.io", "Ann", "Lee", Role::Employee).await;

        for uri in ["/api/projects", "/api/projects/stream"] {
            let resp = test::call_service(
                &app,
                test::TestRequest::get()
                    .uri(uri)
                    .peer_addr(peer())
                    .insert_header(bearer(&ann))
                    .to_request(),
            )
            .await;
            assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        }
    }

    #[actix_web::test]
    async fn stream_opens_as_event_stream() {
        let state = TestState::new();
        let app = init_app!(state);
        let boss = state.seed_user("m1", "boss@x.io", "Mia", "Boss", Role::Manager).await;

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/projects/stream")
                .peer_addr(peer())
                .insert_header(bearer(&boss))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "text/event-stream"
        );
    }
}
