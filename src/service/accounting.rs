//! Worked-time accounting for a single day's attendance record.
//!
//! Both display forms derive from one truncated minute count, so
//! `decimal_hours` and `hours_minutes` always describe the same duration.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, ToSchema, strum_macros::Display)]
pub enum AttendanceStatus {
    Present,
    Absent,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct WorkedTime {
    pub minutes: i64,
    pub status: AttendanceStatus,
    /// Still checked in; measured up to `now`.
    pub ongoing: bool,
}

impl WorkedTime {
    pub const ABSENT: WorkedTime = WorkedTime {
        minutes: 0,
        status: AttendanceStatus::Absent,
        ongoing: false,
    };

    /// Hours with two decimals, e.g. `8.50`.
    pub fn decimal_hours(&self) -> String {
        format!("{:.2}", self.minutes as f64 / 60.0)
    }

    /// `8h 30m`
    pub fn hours_minutes(&self) -> String {
        format!("{}h {}m", self.minutes / 60, self.minutes % 60)
    }

    /// `8h 30m`, or `0h 45m (ongoing)` while the interval is open.
    pub fn label(&self) -> String {
        if self.ongoing {
            format!("{} (ongoing)", self.hours_minutes())
        } else {
            self.hours_minutes()
        }
    }
}

/// A day with a check-in is `Present`, even when the closed interval rounds
/// down to zero minutes. Negative intervals are clamped to zero.
pub fn worked_time(
    check_in: Option<DateTime<Utc>>,
    check_out: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> WorkedTime {
    let Some(check_in) = check_in else {
        return WorkedTime::ABSENT;
    };
    let (end, ongoing) = match check_out {
        Some(out) => (out, false),
        None => (now, true),
    };
    WorkedTime {
        minutes: (end - check_in).num_minutes().max(0),
        status: AttendanceStatus::Present,
        ongoing,
    }
}

/// Serialized form of [`WorkedTime`].
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WorkedTimeView {
    #[schema(example = 510)]
    pub minutes: i64,
    #[schema(example = "8.50")]
    pub hours: String,
    #[schema(example = "8h 30m")]
    pub label: String,
    pub ongoing: bool,
    pub status: AttendanceStatus,
}

impl From<WorkedTime> for WorkedTimeView {
    fn from(w: WorkedTime) -> Self {
        Self {
            minutes: w.minutes,
            hours: w.decimal_hours(),
            label: w.label(),
            ongoing: w.ongoing,
            status: w.status,
        }
    }
}
