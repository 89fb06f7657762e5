use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};

const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// Maps instants onto the calendar days attendance is keyed by.
#[derive(Debug, Clone, Copy)]
pub struct WorkCalendar {
    offset: FixedOffset,
}

impl WorkCalendar {
    /// Offsets outside +/-24h fall back to UTC.
    pub fn new(utc_offset_minutes: i32) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_minutes.saturating_mul(60))
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"));
        Self { offset }
    }

    pub fn day_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    /// `hh:mm AM`, or `--:--` when absent.
    pub fn display_time(&self, instant: Option<DateTime<Utc>>) -> String {
        match instant {
            Some(t) => t.with_timezone(&self.offset).format("%I:%M %p").to_string(),
            None => "--:--".to_string(),
        }
    }
}

impl Default for WorkCalendar {
    fn default() -> Self {
        Self::new(0)
    }
}

pub fn day_key(date: NaiveDate) -> String {
    date.format(DAY_KEY_FORMAT).to_string()
}

pub fn parse_day_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, DAY_KEY_FORMAT).ok()
}

/// `dd/mm/yyyy`
pub fn display_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

pub fn short_weekday(date: NaiveDate) -> String {
    date.format("%a").to_string()
}

pub fn long_weekday(date: NaiveDate) -> String {
    date.format("%A").to_string()
}

/// Parses `YYYY-MM` into the first and last day of that month.
pub fn parse_month(month: &str) -> Option<(NaiveDate, NaiveDate)> {
    let (year, month) = month.split_once('-')?;
    month_bounds(year.parse().ok()?, month.parse().ok()?)
}

pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next.pred_opt()?))
}

pub fn month_of(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    month_bounds(date.year(), date.month()).unwrap_or((date, date))
}
