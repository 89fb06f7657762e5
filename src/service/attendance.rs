//! Daily check-in / check-out and the attendance views built on it.

use crate::error::ApiError;
use crate::model::attendance::{AttendanceError, DailyAttendance, DayState};
use crate::model::user::UserProfile;
use crate::service::accounting::{AttendanceStatus, WorkedTimeView, worked_time};
use crate::store::{
    CollectionPath, DocPath, DocumentStore, KeyRange, Precondition, StoreError, list_as, read,
    write,
};
use crate::utils::dates::{
    WorkCalendar, day_key, display_date, long_weekday, parse_day_key, short_weekday,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;

fn record_path(uid: &str, date: NaiveDate) -> DocPath {
    CollectionPath::daily_attendance(uid).doc(day_key(date))
}

/// Today's record for one user.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceDay {
    #[schema(example = "2025-05-01")]
    pub date: String,
    pub state: DayState,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_in_time: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_out_time: Option<DateTime<Utc>>,
    pub worked: WorkedTimeView,
}

impl AttendanceDay {
    fn new(date: NaiveDate, record: Option<&DailyAttendance>, now: DateTime<Utc>) -> Self {
        let check_in_time = record.and_then(|r| r.check_in_time);
        let check_out_time = record.and_then(|r| r.check_out_time);
        Self {
            date: day_key(date),
            state: DailyAttendance::state_of(record),
            check_in_time,
            check_out_time,
            worked: worked_time(check_in_time, check_out_time, now).into(),
        }
    }
}

/// One row of a user's monthly log.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRow {
    #[schema(example = "2025-05-01")]
    pub key: String,
    #[schema(example = "01/05/2025")]
    pub date: String,
    #[schema(example = "Thu")]
    pub day: String,
    #[schema(example = "09:00 AM")]
    pub check_in_time: String,
    #[schema(example = "05:30 PM")]
    pub check_out_time: String,
    #[schema(example = "8.50")]
    pub hours_worked: String,
    pub status: AttendanceStatus,
}

/// One row of the all-employees view for a single date.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RosterRow {
    pub id: String,
    #[schema(example = "John Doe")]
    pub name: String,
    #[schema(example = "Thursday")]
    pub day: String,
    pub status: AttendanceStatus,
    #[schema(example = "09:00 AM")]
    pub check_in_time: String,
    #[schema(example = "05:30 PM")]
    pub check_out_time: String,
    #[schema(example = "8.50")]
    pub hours: String,
}

pub async fn check_in(
    store: &dyn DocumentStore,
    calendar: &WorkCalendar,
    uid: &str,
    now: DateTime<Utc>,
) -> Result<AttendanceDay, ApiError> {
    let date = calendar.day_of(now);
    let path = record_path(uid, date);

    let current = read::<DailyAttendance>(store, &path).await?;
    let precondition = match &current {
        Some((_, version)) => Precondition::Version(*version),
        None => Precondition::Absent,
    };
    let next = DailyAttendance::check_in(current.as_ref().map(|(r, _)| r), uid, now)?;

    match write(store, &path, &next, precondition).await {
        Ok(_) => {}
        // someone else wrote today's record between our read and write
        Err(StoreError::PreconditionFailed(_)) => return Err(AttendanceError::AlreadyCheckedIn.into()),
        Err(e) => return Err(e.into()),
    }

    tracing::info!(uid, date = %day_key(date), "Checked in");
    Ok(AttendanceDay::new(date, Some(&next), now))
}

pub async fn check_out(
    store: &dyn DocumentStore,
    calendar: &WorkCalendar,
    uid: &str,
    now: DateTime<Utc>,
) -> Result<AttendanceDay, ApiError> {
    let date = calendar.day_of(now);
    let path = record_path(uid, date);

    let (current, version) = match read::<DailyAttendance>(store, &path).await? {
        Some((record, version)) => (Some(record), Some(version)),
        None => (None, None),
    };
    let next = DailyAttendance::check_out(current.as_ref(), now)?;
    let precondition = version.map_or(Precondition::Absent, Precondition::Version);

    match write(store, &path, &next, precondition).await {
        Ok(_) => {}
        Err(StoreError::PreconditionFailed(_)) => {
            return Err(AttendanceError::AlreadyCheckedOut.into());
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(uid, date = %day_key(date), "Checked out");
    Ok(AttendanceDay::new(date, Some(&next), now))
}

pub async fn today(
    store: &dyn DocumentStore,
    calendar: &WorkCalendar,
    uid: &str,
    now: DateTime<Utc>,
) -> Result<AttendanceDay, ApiError> {
    let date = calendar.day_of(now);
    let record = read::<DailyAttendance>(store, &record_path(uid, date))
        .await?
        .map(|(r, _)| r);
    Ok(AttendanceDay::new(date, record.as_ref(), now))
}

/// Records whose key falls in `[first, last]`, ascending.
pub async fn monthly(
    store: &dyn DocumentStore,
    calendar: &WorkCalendar,
    uid: &str,
    first: NaiveDate,
    last: NaiveDate,
    now: DateTime<Utc>,
) -> Result<Vec<MonthlyRow>, ApiError> {
    let range = KeyRange::between(day_key(first), day_key(last));
    let records =
        list_as::<DailyAttendance>(store, &CollectionPath::daily_attendance(uid), &range).await?;

    let rows = records
        .into_iter()
        .filter_map(|(key, record)| {
            // ids outside the day-key format are not attendance records
            let date = parse_day_key(&key)?;
            let worked = worked_time(record.check_in_time, record.check_out_time, now);
            Some(MonthlyRow {
                key,
                date: display_date(date),
                day: short_weekday(date),
                check_in_time: calendar.display_time(record.check_in_time),
                check_out_time: calendar.display_time(record.check_out_time),
                hours_worked: worked.decimal_hours(),
                status: worked.status,
            })
        })
        .collect();

    Ok(rows)
}

/// Every user's attendance on `date`, sorted by name, optionally filtered
/// by a case-insensitive name substring.
pub async fn roster(
    store: &dyn DocumentStore,
    calendar: &WorkCalendar,
    date: NaiveDate,
    search: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Vec<RosterRow>, ApiError> {
    let users = list_as::<UserProfile>(store, &CollectionPath::users(), &KeyRange::all()).await?;
    let needle = search
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    let wanted: Vec<(String, String)> = users
        .into_iter()
        .map(|(uid, profile)| (uid, profile.full_name()))
        .filter(|(_, name)| {
            needle
                .as_ref()
                .is_none_or(|n| name.to_lowercase().contains(n.as_str()))
        })
        .collect();

    let records = futures::future::try_join_all(
        wanted
            .iter()
            .map(|(uid, _)| async move { read::<DailyAttendance>(store, &record_path(uid, date)).await }),
    )
    .await?;

    let mut rows: Vec<RosterRow> = wanted
        .into_iter()
        .zip(records)
        .map(|((uid, name), record)| {
            let record = record.map(|(r, _)| r).unwrap_or_default();
            let worked = worked_time(record.check_in_time, record.check_out_time, now);
            RosterRow {
                id: uid,
                name,
                day: long_weekday(date),
                status: worked.status,
                check_in_time: calendar.display_time(record.check_in_time),
                check_out_time: calendar.display_time(record.check_out_time),
                hours: worked.decimal_hours(),
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });
    Ok(rows)
}
