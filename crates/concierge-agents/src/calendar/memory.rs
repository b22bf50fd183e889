//! In-memory calendar
//!
//! For tests and demos. Event times are taken as UTC.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::sync::RwLock;

use super::{CalendarClient, CalendarEvent, CreatedEvent, NewEvent, TimeRange};
use crate::error::Result;

#[derive(Default)]
pub struct InMemoryCalendar {
    events: RwLock<Vec<(NaiveDateTime, CalendarEvent)>>,
}

impl InMemoryCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

#[async_trait]
impl CalendarClient for InMemoryCalendar {
    async fn list_events(&self, range: &TimeRange) -> Result<Vec<CalendarEvent>> {
        let events = self.events.read().await;
        let mut found: Vec<_> = events
            .iter()
            .filter(|(start, _)| range.contains(start.and_utc()))
            .collect();
        found.sort_by_key(|(start, _)| *start);
        Ok(found.into_iter().map(|(_, event)| event.clone()).collect())
    }

    async fn create_event(&self, event: &NewEvent) -> Result<CreatedEvent> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let stored = CalendarEvent {
            summary: event.title.clone(),
            start: event.start.and_utc().to_rfc3339(),
            end: event.end.and_utc().to_rfc3339(),
            location: Some(event.location.clone()).filter(|l| !l.is_empty()),
        };
        self.events.write().await.push((event.start, stored));
        Ok(CreatedEvent {
            link: Some(format!("memory://events/{id}")),
            id,
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}
