use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::error::ApiError;
use crate::service::attendance::{self, AttendanceDay, MonthlyRow, RosterRow};
use crate::store::DocumentStore;
use crate::utils::dates::{month_of, parse_day_key, parse_month};
use actix_web::{HttpResponse, web};
use chrono::Utc;
use serde::Deserialize;
use utoipa::IntoParams;

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    responses(
        (status = 200, description = "Checked in successfully", body = AttendanceDay),
        (status = 409, description = "Already checked in today", body = Object, example = json!({
            "message": "Already checked in today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    store: web::Data<dyn DocumentStore>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let day = attendance::check_in(store.get_ref(), &config.calendar(), &auth.uid, Utc::now()).await?;
    Ok(HttpResponse::Ok().json(day))
}

/// Check-out endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-out",
    responses(
        (status = 200, description = "Checked out successfully", body = AttendanceDay),
        (status = 400, description = "No active check-in found for today", body = Object, example = json!({
            "message": "No active check-in found for today"
        })),
        (status = 409, description = "Already checked out today", body = Object, example = json!({
            "message": "Already checked out today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    store: web::Data<dyn DocumentStore>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let day = attendance::check_out(store.get_ref(), &config.calendar(), &auth.uid, Utc::now()).await?;
    Ok(HttpResponse::Ok().json(day))
}

/// Today's record for the caller
#[utoipa::path(
    get,
    path = "/api/attendance/today",
    responses(
        (status = 200, description = "Today's attendance", body = AttendanceDay),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn today(
    auth: AuthUser,
    store: web::Data<dyn DocumentStore>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let day = attendance::today(store.get_ref(), &config.calendar(), &auth.uid, Utc::now()).await?;
    Ok(HttpResponse::Ok().json(day))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MonthlyQuery {
    /// `YYYY-MM`, defaults to the current month.
    #[param(example = "2025-05")]
    pub month: Option<String>,
    /// Another user's log; managers only.
    pub user_id: Option<String>,
}

/// Monthly attendance log
#[utoipa::path(
    get,
    path = "/api/attendance/monthly",
    params(MonthlyQuery),
    responses(
        (status = 200, description = "Records in the month, oldest first", body = [MonthlyRow]),
        (status = 400, description = "Malformed month", body = Object, example = json!({
            "message": "month must be formatted YYYY-MM"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn monthly(
    auth: AuthUser,
    store: web::Data<dyn DocumentStore>,
    config: web::Data<Config>,
    query: web::Query<MonthlyQuery>,
) -> Result<HttpResponse, ApiError> {
    let calendar = config.calendar();
    let now = Utc::now();

    let uid = match query.user_id.as_deref().map(str::trim) {
        Some(other) if !other.is_empty() && other != auth.uid => {
            auth.require_manager()?;
            other.to_string()
        }
        _ => auth.uid.clone(),
    };

    let (first, last) = match query.month.as_deref() {
        Some(month) => parse_month(month.trim())
            .ok_or_else(|| ApiError::BadRequest("month must be formatted YYYY-MM".into()))?,
        None => month_of(calendar.day_of(now)),
    };

    let rows: Vec<MonthlyRow> =
        attendance::monthly(store.get_ref(), &calendar, &uid, first, last, now).await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DailyQuery {
    /// `YYYY-MM-DD`, defaults to today.
    #[param(example = "2025-05-01")]
    pub date: Option<String>,
    /// Case-insensitive name filter.
    pub search: Option<String>,
}

/// Attendance of every employee on one date
#[utoipa::path(
    get,
    path = "/api/attendance/daily",
    params(DailyQuery),
    responses(
        (status = 200, description = "One row per user, sorted by name", body = [RosterRow]),
        (status = 400, description = "Malformed date"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn daily(
    auth: AuthUser,
    store: web::Data<dyn DocumentStore>,
    config: web::Data<Config>,
    query: web::Query<DailyQuery>,
) -> Result<HttpResponse, ApiError> {
    auth.require_manager()?;
    let calendar = config.calendar();
    let now = Utc::now();

    let date = match query.date.as_deref() {
        Some(date) => parse_day_key(date.trim())
            .ok_or_else(|| ApiError::BadRequest("date must be formatted YYYY-MM-DD".into()))?,
        None => calendar.day_of(now),
    };

    let rows = attendance::roster(
        store.get_ref(),
        &calendar,
        date,
        query.search.as_deref(),
        now,
    )
    .await?;
    Ok(HttpResponse::Ok().json(rows))
}
