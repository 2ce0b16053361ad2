//! Remote calendar provider boundary.

pub mod google;
pub mod types;

use async_trait::async_trait;

use crate::error::ProviderError;

pub use google::GoogleCalendarClient;
pub use types::{
    CalendarListPage, EventsPage, EventsQuery, RemoteCalendar, RemoteEvent, RemoteEventTime,
    TokenResponse,
};

/// The calls the sync engine makes against a calendar provider
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Provider tag used to key the stored account
    fn name(&self) -> &'static str;

    async fn list_calendars(&self, access_token: &str)
    -> Result<Vec<RemoteCalendar>, ProviderError>;

    /// Fetch one page of events; pass the previous page's `next_page_token` to continue
    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        query: &EventsQuery,
        page_token: Option<&str>,
    ) -> Result<EventsPage, ProviderError>;

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, ProviderError>;
}
