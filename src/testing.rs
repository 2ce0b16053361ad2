//! Fixtures shared by unit tests.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::ProviderError;
use crate::models::{
    CalendarVisibility, EventDraft, EventVisibility, NewCalendar, ProviderKind, SyncStatus,
};
use crate::provider::{
    CalendarProvider, EventsPage, EventsQuery, RemoteCalendar, RemoteEvent, RemoteEventTime,
    TokenResponse,
};

pub(crate) fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|date| date.and_hms_opt(h, 0, 0))
        .map(|naive| naive.and_utc())
        .expect("valid fixture date")
}

pub(crate) fn remote_calendar(user_id: i64, source_id: &str) -> NewCalendar {
    NewCalendar {
        user_id,
        source_id: Some(source_id.to_string()),
        provider: ProviderKind::Google,
        summary: "Work".to_string(),
        time_zone: Some("Europe/Berlin".to_string()),
        description: None,
        color: Some("#0b8043".to_string()),
        visibility: CalendarVisibility::Private,
        redaction: None,
        sync_status: SyncStatus::NeverSynced,
        last_full_sync: None,
    }
}

pub(crate) fn draft(calendar_id: i64, source_id: &str, title: &str) -> EventDraft {
    EventDraft {
        calendar_id,
        source_id: source_id.to_string(),
        title: title.to_string(),
        start: at(2025, 3, 3, 9),
        end: at(2025, 3, 3, 10),
        all_day: false,
        location: None,
        description: None,
        color: None,
        visibility: EventVisibility::Inherit,
    }
}

/// Scripted provider: event pages are served in order, every call is recorded.
#[derive(Default)]
pub(crate) struct FakeProvider {
    pub calendars: Vec<RemoteCalendar>,
    pub refresh_fails: bool,
    pub refresh_token_rotates: bool,
    /// `expires_in` of refreshed tokens; an hour when unset
    pub token_lifetime: Option<i64>,
    pub pages: Mutex<VecDeque<Result<EventsPage, ProviderError>>>,
    pub queries: Mutex<Vec<(String, EventsQuery, Option<String>)>>,
    pub refreshes: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub(crate) fn with_pages(pages: Vec<Result<EventsPage, ProviderError>>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            ..Self::default()
        }
    }

    pub(crate) fn push_page(&self, page: Result<EventsPage, ProviderError>) {
        self.pages.lock().unwrap().push_back(page);
    }

    pub(crate) fn recorded_queries(&self) -> Vec<EventsQuery> {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .map(|(_, query, _)| query.clone())
            .collect()
    }
}

#[async_trait]
impl CalendarProvider for FakeProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn list_calendars(&self, _access_token: &str) -> Result<Vec<RemoteCalendar>, ProviderError> {
        Ok(self.calendars.clone())
    }

    async fn list_events(
        &self,
        _access_token: &str,
        calendar_id: &str,
        query: &EventsQuery,
        page_token: Option<&str>,
    ) -> Result<EventsPage, ProviderError> {
        self.queries.lock().unwrap().push((
            calendar_id.to_string(),
            query.clone(),
            page_token.map(str::to_string),
        ));
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(EventsPage::default()))
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, ProviderError> {
        self.refreshes.lock().unwrap().push(refresh_token.to_string());
        if self.refresh_fails {
            return Err(ProviderError::Status {
                status: 400,
                body: "invalid_grant".to_string(),
            });
        }
        Ok(TokenResponse {
            access_token: "refreshed-access".to_string(),
            refresh_token: self
                .refresh_token_rotates
                .then(|| "rotated-refresh".to_string()),
            expires_in: Some(self.token_lifetime.unwrap_or(3600)),
        })
    }
}

pub(crate) fn timed(id: &str, title: &str, start: &str, end: &str) -> RemoteEvent {
    RemoteEvent {
        id: id.to_string(),
        status: Some("confirmed".to_string()),
        summary: Some(title.to_string()),
        start: Some(RemoteEventTime {
            date_time: Some(start.to_string()),
            ..RemoteEventTime::default()
        }),
        end: Some(RemoteEventTime {
            date_time: Some(end.to_string()),
            ..RemoteEventTime::default()
        }),
        ..RemoteEvent::default()
    }
}

pub(crate) fn cancelled(id: &str) -> RemoteEvent {
    RemoteEvent {
        id: id.to_string(),
        status: Some("cancelled".to_string()),
        ..RemoteEvent::default()
    }
}

pub(crate) fn page(items: Vec<RemoteEvent>, next_page: Option<&str>, next_sync: Option<&str>) -> EventsPage {
    EventsPage {
        items,
        next_page_token: next_page.map(str::to_string),
        next_sync_token: next_sync.map(str::to_string),
    }
}
