use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::strategy::SyncMode;
use crate::error::ProviderError;
use crate::provider::{CalendarProvider, EventsQuery, RemoteEvent};

/// Every item from every page of one fetch
#[derive(Debug, Default)]
pub struct FetchResult {
    pub items: Vec<RemoteEvent>,
    /// Cursor carried by the final page
    pub next_sync_token: Option<String>,
    pub pages: usize,
}

pub struct EventFetcher<'a> {
    provider: &'a dyn CalendarProvider,
    window_past: Duration,
    window_future: Duration,
}

impl<'a> EventFetcher<'a> {
    pub fn new(provider: &'a dyn CalendarProvider, window_past: Duration, window_future: Duration) -> Self {
        Self {
            provider,
            window_past,
            window_future,
        }
    }

    pub fn query_for(&self, mode: &SyncMode, now: DateTime<Utc>) -> EventsQuery {
        match mode {
            SyncMode::Full | SyncMode::RecoveryFull => EventsQuery::Window {
                time_min: now - self.window_past,
                time_max: now + self.window_future,
            },
            SyncMode::Incremental(cursor) => EventsQuery::Changes {
                sync_token: cursor.clone(),
            },
        }
    }

    /// Follow page tokens until the provider stops returning one
    #[tracing::instrument(skip(self, access_token, mode, now), fields(mode = mode.as_str()))]
    pub async fn fetch(
        &self,
        access_token: &str,
        calendar_id: &str,
        mode: &SyncMode,
        now: DateTime<Utc>,
    ) -> Result<FetchResult, ProviderError> {
        let query = self.query_for(mode, now);
        let mut result = FetchResult::default();
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .provider
                .list_events(access_token, calendar_id, &query, page_token.as_deref())
                .await?;

            result.pages += 1;
            result.items.extend(page.items);
            // intermediate pages carry no usable cursor
            result.next_sync_token = page.next_sync_token;

            match page.next_page_token {
                Some(next) if page_token.as_deref() == Some(next.as_str()) => {
                    return Err(ProviderError::Decode(format!(
                        "provider repeated page token {next}"
                    )));
                }
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        debug!(items = result.items.len(), pages = result.pages, "fetch complete");
        Ok(result)
    }
}
