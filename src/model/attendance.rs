use super::timestamp::flexible;
use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// `attendance/{uid}/daily/{yyyy-mm-dd}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAttendance {
    #[serde(default, with = "flexible")]
    pub check_in_time: Option<DateTime<Utc>>,
    #[serde(default, with = "flexible")]
    pub check_out_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
    #[serde(default, with = "flexible", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Lifecycle of one user's record for one calendar day.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DayState {
    NoRecord,
    CheckedIn,
    CheckedOut,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Display)]
pub enum AttendanceError {
    #[display(fmt = "Already checked in today")]
    AlreadyCheckedIn,
    #[display(fmt = "No active check-in found for today")]
    NotCheckedIn,
    #[display(fmt = "Already checked out today")]
    AlreadyCheckedOut,
    #[display(fmt = "Check-out cannot precede check-in")]
    CheckOutBeforeCheckIn,
}

impl std::error::Error for AttendanceError {}

impl DailyAttendance {
    /// A record without a check-in instant counts as no record at all.
    pub fn state(&self) -> DayState {
        match (self.check_in_time, self.check_out_time) {
            (None, _) => DayState::NoRecord,
            (Some(_), None) => DayState::CheckedIn,
            (Some(_), Some(_)) => DayState::CheckedOut,
        }
    }

    pub fn state_of(record: Option<&Self>) -> DayState {
        record.map(Self::state).unwrap_or(DayState::NoRecord)
    }

    /// `NoRecord -> CheckedIn`
    pub fn check_in(
        current: Option<&Self>,
        employee_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, AttendanceError> {
        match Self::state_of(current) {
            DayState::NoRecord => Ok(Self {
                check_in_time: Some(now),
                check_out_time: None,
                employee_id: Some(employee_id.to_string()),
                updated_at: Some(now),
            }),
            DayState::CheckedIn | DayState::CheckedOut => Err(AttendanceError::AlreadyCheckedIn),
        }
    }

    /// `CheckedIn -> CheckedOut`
    pub fn check_out(current: Option<&Self>, now: DateTime<Utc>) -> Result<Self, AttendanceError> {
        let record = match (current, Self::state_of(current)) {
            (Some(record), DayState::CheckedIn) => record,
            (_, DayState::CheckedOut) => return Err(AttendanceError::AlreadyCheckedOut),
            _ => return Err(AttendanceError::NotCheckedIn),
        };
        if record.check_in_time.is_some_and(|check_in| now < check_in) {
            return Err(AttendanceError::CheckOutBeforeCheckIn);
        }
        Ok(Self {
            check_out_time: Some(now),
            updated_at: Some(now),
            ..record.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn nine() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn full_day_walks_the_state_machine() {
        let checked_in = DailyAttendance::check_in(None, "u1", nine()).unwrap();
        assert_eq!(checked_in.state(), DayState::CheckedIn);
        assert_eq!(checked_in.employee_id.as_deref(), Some("u1"));

        let out_at = nine() + Duration::minutes(510);
        let checked_out = DailyAttendance::check_out(Some(&checked_in), out_at).unwrap();
        assert_eq!(checked_out.state(), DayState::CheckedOut);
        assert_eq!(checked_out.check_in_time, Some(nine()));
        assert_eq!(checked_out.check_out_time, Some(out_at));
    }

    #[test]
    fn second_check_in_is_rejected() {
        let checked_in = DailyAttendance::check_in(None, "u1", nine()).unwrap();
        assert_eq!(
            DailyAttendance::check_in(Some(&checked_in), "u1", nine()),
            Err(AttendanceError::AlreadyCheckedIn)
        );
        let checked_out = DailyAttendance::check_out(Some(&checked_in), nine()).unwrap();
        assert_eq!(
            DailyAttendance::check_in(Some(&checked_out), "u1", nine()),
            Err(AttendanceError::AlreadyCheckedIn)
        );
    }

    #[test]
    fn check_out_requires_an_open_check_in() {
        assert_eq!(
            DailyAttendance::check_out(None, nine()),
            Err(AttendanceError::NotCheckedIn)
        );
        let empty = DailyAttendance::default();
        assert_eq!(
            DailyAttendance::check_out(Some(&empty), nine()),
            Err(AttendanceError::NotCheckedIn)
        );

        let checked_in = DailyAttendance::check_in(None, "u1", nine()).unwrap();
        let checked_out = DailyAttendance::check_out(Some(&checked_in), nine()).unwrap();
        assert_eq!(
            DailyAttendance::check_out(Some(&checked_out), nine()),
            Err(AttendanceError::AlreadyCheckedOut)
        );
    }

    #[test]
    fn check_out_before_check_in_is_rejected() {
        let checked_in = DailyAttendance::check_in(None, "u1", nine()).unwrap();
        assert_eq!(
            DailyAttendance::check_out(Some(&checked_in), nine() - Duration::minutes(1)),
            Err(AttendanceError::CheckOutBeforeCheckIn)
        );
    }

    #[test]
    fn blank_record_allows_check_in() {
        let blank = DailyAttendance {
            check_in_time: None,
            check_out_time: None,
            employee_id: Some("u1".into()),
            updated_at: None,
        };
        assert!(DailyAttendance::check_in(Some(&blank), "u1", nine()).is_ok());
    }

    #[test]
    fn serializes_open_check_out_as_null() {
        let checked_in = DailyAttendance::check_in(None, "u1", nine()).unwrap();
        let value = serde_json::to_value(&checked_in).unwrap();
        assert!(value["checkOutTime"].is_null());
        assert_eq!(value["checkInTime"], "2025-05-01T09:00:00.000Z");
    }
}
