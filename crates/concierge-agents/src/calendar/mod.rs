//! Calendar Integration
//!
//! The calendar tools talk to a [`CalendarClient`]; the Google Calendar REST
//! adapter is the production implementation.

mod google;
mod memory;

pub use google::GoogleCalendarClient;
pub use memory::InMemoryCalendar;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ToolError};

/// One event as shown to the model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub summary: String,

    /// RFC 3339 date-time, or a bare date for all-day events
    pub start: String,
    pub end: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Half-open time window `[start, end)`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Monday 00:00 through the following Monday 00:00 in `now`'s zone
    pub fn current_week<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        let days_since_monday = i64::from(now.weekday().num_days_from_monday());
        let monday = now.date_naive() - Duration::days(days_since_monday);
        let midnight = monday.and_hms_opt(0, 0, 0).unwrap_or_default();
        let start = now
            .timezone()
            .from_local_datetime(&midnight)
            .earliest()
            .map_or_else(|| now.with_timezone(&Utc), |d| d.with_timezone(&Utc));
        Self {
            start,
            end: start + Duration::days(7),
        }
    }

    /// From `now` through `days` days later
    pub fn next_days<Tz: TimeZone>(now: &DateTime<Tz>, days: u32) -> Self {
        let start = now.with_timezone(&Utc);
        Self {
            start,
            end: start + Duration::days(i64::from(days)),
        }
    }

    /// Window for the `duration` argument of `get_events`: blank means the
    /// current week, otherwise a whole number of days from now
    pub fn from_duration<Tz: TimeZone>(duration: &str, now: &DateTime<Tz>) -> Result<Self> {
        let duration = duration.trim();
        if duration.is_empty() {
            return Ok(Self::current_week(now));
        }
        match duration.parse::<u32>() {
            Ok(days) if (1..=366).contains(&days) => Ok(Self::next_days(now, days)),
            _ => Err(ToolError::InvalidInput(format!(
                "duration must be a number of days between 1 and 366, got '{duration}'"
            ))),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

/// Request to create an event, times local to `timezone`
#[derive(Clone, Debug, PartialEq)]
pub struct NewEvent {
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub description: String,
    pub location: String,
    pub timezone: String,
}

impl NewEvent {
    pub fn new(
        title: impl Into<String>,
        start: &str,
        end: &str,
        timezone: impl Into<String>,
    ) -> Result<Self> {
        let start = parse_local_time(start)?;
        let end = parse_local_time(end)?;
        if end <= start {
            return Err(ToolError::InvalidInput("end_time must be after start_time".into()));
        }
        Ok(Self {
            title: title.into(),
            start,
            end,
            description: String::new(),
            location: String::new(),
            timezone: timezone.into(),
        })
    }
}

/// Accepts `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DDTHH:MM` and a space instead of `T`
pub fn parse_local_time(value: &str) -> Result<NaiveDateTime> {
    let value = value.trim();
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .ok_or_else(|| {
            ToolError::InvalidInput(format!("'{value}' is not a time in YYYY-MM-DDTHH:MM:SS format"))
        })
}

/// What the calendar reports back after creating an event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreatedEvent {
    pub id: String,
    pub link: Option<String>,
}

/// Calendar backend (Strategy pattern)
#[async_trait]
pub trait CalendarClient: Send + Sync {
    /// Events starting inside `range`, ordered by start time
    async fn list_events(&self, range: &TimeRange) -> Result<Vec<CalendarEvent>>;

    async fn create_event(&self, event: &NewEvent) -> Result<CreatedEvent>;

    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Weekday};

    fn wednesday_afternoon() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2025-03-12T15:30:00+01:00").unwrap()
    }

    #[test]
    fn blank_duration_is_the_current_week() {
        let now = wednesday_afternoon();
        let range = TimeRange::from_duration("", &now).unwrap();
        let start = range.start.with_timezone(now.offset());
        assert_eq!(start.weekday(), Weekday::Mon);
        assert_eq!(start.to_rfc3339(), "2025-03-10T00:00:00+01:00");
        assert_eq!(range.end - range.start, Duration::days(7));
        assert!(range.contains(now.with_timezone(&Utc)));
    }

    #[test]
    fn numeric_duration_counts_days_from_now() {
        let now = wednesday_afternoon();
        let range = TimeRange::from_duration(" 3 ", &now).unwrap();
        assert_eq!(range.start, now.with_timezone(&Utc));
        assert_eq!(range.end - range.start, Duration::days(3));
    }

    #[test]
    fn bad_durations_are_rejected() {
        let now = wednesday_afternoon();
        for bad in ["0", "-2", "a week", "1000"] {
            assert!(TimeRange::from_duration(bad, &now).is_err(), "{bad}");
        }
    }

    #[test]
    fn new_event_checks_times() {
        let event = NewEvent::new("Standup", "2025-03-12T09:00", "2025-03-12 09:15:00", "Europe/Berlin").unwrap();
        assert_eq!(event.end - event.start, Duration::minutes(15));
        assert!(NewEvent::new("Backwards", "2025-03-12T10:00:00", "2025-03-12T09:00:00", "UTC").is_err());
        assert!(NewEvent::new("Garbage", "tomorrow", "2025-03-12T09:00:00", "UTC").is_err());
    }
}
