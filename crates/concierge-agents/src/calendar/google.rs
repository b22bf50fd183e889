//! Google Calendar REST adapter
//!
//! Authenticates with an OAuth access token read from the environment at
//! call time, so a missing token only affects the calendar tools.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{CalendarClient, CalendarEvent, CreatedEvent, NewEvent, TimeRange};
use crate::error::Result;
use crate::sources::{api_key, check_status};

pub const GOOGLE_CALENDAR_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

#[derive(Debug, Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<EventItem>,
}

#[derive(Debug, Deserialize)]
struct EventItem {
    summary: Option<String>,
    location: Option<String>,
    start: EventTime,
    end: EventTime,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventTime {
    date_time: Option<String>,
    date: Option<String>,
}

impl EventTime {
    fn into_string(self) -> String {
        self.date_time.or(self.date).unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Inserted {
    id: String,
    html_link: Option<String>,
}

pub struct GoogleCalendarClient {
    http: reqwest::Client,
    base_url: String,
    calendar_id: String,
    token_env: String,
}

impl GoogleCalendarClient {
    pub fn new(http: reqwest::Client, calendar_id: impl Into<String>, token_env: impl Into<String>) -> Self {
        Self {
            http,
            base_url: GOOGLE_CALENDAR_BASE_URL.into(),
            calendar_id: calendar_id.into(),
            token_env: token_env.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.base_url.trim_end_matches('/'),
            self.calendar_id
        )
    }
}

fn insert_body(event: &NewEvent) -> serde_json::Value {
    json!({
        "summary": event.title,
        "location": event.location,
        "description": event.description,
        "start": {
            "dateTime": event.start.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "timeZone": event.timezone,
        },
        "end": {
            "dateTime": event.end.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "timeZone": event.timezone,
        },
    })
}

#[async_trait]
impl CalendarClient for GoogleCalendarClient {
    async fn list_events(&self, range: &TimeRange) -> Result<Vec<CalendarEvent>> {
        let token = api_key(&self.token_env)?;
        let params = [
            ("timeMin", range.start.to_rfc3339()),
            ("timeMax", range.end.to_rfc3339()),
            ("singleEvents", "true".to_owned()),
            ("orderBy", "startTime".to_owned()),
        ];
        tracing::debug!(calendar = %self.calendar_id, start = %range.start, end = %range.end, "listing events");
        let response = self
            .http
            .get(self.events_url())
            .bearer_auth(token)
            .query(&params)
            .send()
            .await?;
        let list: EventList = check_status("Google Calendar", response).await?.json().await?;
        Ok(list
            .items
            .into_iter()
            .map(|item| CalendarEvent {
                summary: item.summary.unwrap_or_else(|| "No Title".into()),
                start: item.start.into_string(),
                end: item.end.into_string(),
                location: item.location.filter(|l| !l.is_empty()),
            })
            .collect())
    }

    async fn create_event(&self, event: &NewEvent) -> Result<CreatedEvent> {
        let token = api_key(&self.token_env)?;
        tracing::info!(calendar = %self.calendar_id, title = %event.title, "creating event");
        let response = self
            .http
            .post(self.events_url())
            .bearer_auth(token)
            .json(&insert_body(event))
            .send()
            .await?;
        let inserted: Inserted = check_status("Google Calendar", response).await?.json().await?;
        Ok(CreatedEvent {
            id: inserted.id,
            link: inserted.html_link,
        })
    }

    fn name(&self) -> &str {
        "google"
    }
}
