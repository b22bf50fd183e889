//! Calendar Tools

use std::sync::Arc;

use agent_core::{
    Result as CoreResult, Tool, ToolCall, ToolContext, ToolResult,
    tool::{ParameterSchema, ToolSchema},
};
use async_trait::async_trait;
use serde_json::json;

use super::optional_text;
use crate::calendar::{CalendarClient, NewEvent, TimeRange};

/// `get_events`
pub struct GetEventsTool {
    client: Arc<dyn CalendarClient>,
}

impl GetEventsTool {
    pub fn new(client: Arc<dyn CalendarClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for GetEventsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "get_events".into(),
            description: "Retrieve calendar events. Without a duration, returns the events of the current week \
                          (Monday to Sunday); with a duration, returns events from now over that many days."
                .into(),
            parameters: vec![
                ParameterSchema::optional("duration", "string", "Number of days to look ahead, e.g. \"3\"")
                    .with_default(json!("")),
            ],
            input_schema: None,
            category: Some("calendar".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> CoreResult<ToolResult> {
        let duration = call
            .str_arg("duration")
            .map(str::to_owned)
            .or_else(|| call.int_arg("duration").map(|d| d.to_string()))
            .unwrap_or_default();
        let range = TimeRange::from_duration(&duration, &chrono::Local::now())?;

        let events = self.client.list_events(&range).await?;
        tracing::debug!(calendar = self.client.name(), count = events.len(), "listed events");
        let data = serde_json::to_value(&events)?;
        Ok(ToolResult::success(&call.name, data.to_string()).with_data(data))
    }
}

/// `create_event`
pub struct CreateEventTool {
    client: Arc<dyn CalendarClient>,
    timezone: String,
}

impl CreateEventTool {
    pub fn new(client: Arc<dyn CalendarClient>, timezone: impl Into<String>) -> Self {
        Self {
            client,
            timezone: timezone.into(),
        }
    }
}

#[async_trait]
impl Tool for CreateEventTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "create_event".into(),
            description: format!(
                "Schedule a new calendar event. Times are local ({}) in YYYY-MM-DDTHH:MM:SS format.",
                self.timezone
            ),
            parameters: vec![
                ParameterSchema::required("title", "string", "Event title"),
                ParameterSchema::required("start_time", "string", "Start, YYYY-MM-DDTHH:MM:SS"),
                ParameterSchema::required("end_time", "string", "End, YYYY-MM-DDTHH:MM:SS"),
                ParameterSchema::optional("description", "string", "Event description"),
                ParameterSchema::optional("location", "string", "Event location"),
            ],
            input_schema: None,
            category: Some("calendar".into()),
            has_side_effects: true,
        }
    }

    async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> CoreResult<ToolResult> {
        let mut event = NewEvent::new(
            call.required_str("title")?.trim(),
            call.required_str("start_time")?,
            call.required_str("end_time")?,
            self.timezone.clone(),
        )?;
        event.description = optional_text(call, "description").unwrap_or_default();
        event.location = optional_text(call, "location").unwrap_or_default();

        match self.client.create_event(&event).await {
            Ok(created) => {
                tracing::info!(calendar = self.client.name(), id = %created.id, title = %event.title, "event created");
                let data = json!({
                    "status": "success",
                    "message": "Event created successfully",
                    "link": created.link,
                    "id": created.id,
                });
                Ok(ToolResult::success(&call.name, data.to_string()).with_data(data))
            }
            Err(e) => {
                tracing::warn!(calendar = self.client.name(), error = %e, "event creation failed");
                Ok(ToolResult::failure(&call.name, format!("Failed to create event: {e}")))
            }
        }
    }
}
