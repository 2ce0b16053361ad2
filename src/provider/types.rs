use chrono::{DateTime, Utc};
use serde::Deserialize;

/// An entry of the provider's calendar list
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCalendar {
    pub id: String,
    #[serde(default)]
    pub summary: String,
    pub summary_override: Option<String>,
    pub time_zone: Option<String>,
    pub description: Option<String>,
    pub background_color: Option<String>,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub deleted: bool,
}

impl RemoteCalendar {
    pub fn display_name(&self) -> &str {
        self.summary_override
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.summary)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarListPage {
    #[serde(default)]
    pub items: Vec<RemoteCalendar>,
    pub next_page_token: Option<String>,
}

/// Raw event as returned by the events endpoint; every field may be absent
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEvent {
    pub id: String,
    pub status: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: Option<RemoteEventTime>,
    pub end: Option<RemoteEventTime>,
    pub color_id: Option<String>,
    pub visibility: Option<String>,
}

impl RemoteEvent {
    /// Tombstones come back with `status: "cancelled"` when deleted items are requested
    pub fn is_cancelled(&self) -> bool {
        self.status.as_deref() == Some("cancelled")
    }
}

/// `date` is set for all-day events, `dateTime` otherwise
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEventTime {
    pub date: Option<String>,
    pub date_time: Option<String>,
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsPage {
    #[serde(default)]
    pub items: Vec<RemoteEvent>,
    pub next_page_token: Option<String>,
    /// Only present on the last page
    pub next_sync_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
}

/// Which slice of the event stream to list
#[derive(Debug, Clone, PartialEq)]
pub enum EventsQuery {
    /// Everything in a time window, deleted items included
    Window {
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    },
    /// Changes since the given sync cursor
    Changes { sync_token: String },
}
