use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use tokio::time::{Duration, timeout};

use super::CalendarProvider;
use super::types::{CalendarListPage, EventsPage, EventsQuery, RemoteCalendar, TokenResponse};
use crate::config::SyncConfig;
use crate::error::ProviderError;

pub const PROVIDER_NAME: &str = "google";

/// Google Calendar v3 client over plain REST calls
pub struct GoogleCalendarClient {
    client: Client,
    api_base: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    page_size: u32,
    request_timeout: Duration,
}

impl GoogleCalendarClient {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            client: Client::new(),
            api_base: config.google_api_base.trim_end_matches('/').to_string(),
            token_url: config.google_token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            page_size: config.page_size,
            request_timeout: config.request_timeout,
        }
    }

    // Bounds the whole exchange, body included; dropping the future cancels it.
    async fn with_deadline<T>(
        &self,
        request: impl Future<Output = Result<T, ProviderError>>,
    ) -> Result<T, ProviderError> {
        timeout(self.request_timeout, request)
            .await
            .map_err(|_| ProviderError::Timeout(self.request_timeout))?
    }

    fn events_params(
        &self,
        query: &EventsQuery,
        page_token: Option<&str>,
    ) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("showDeleted", "true".to_string()),
            ("singleEvents", "true".to_string()),
            ("maxResults", self.page_size.to_string()),
        ];

        match query {
            EventsQuery::Window { time_min, time_max } => {
                params.push(("timeMin", time_min.to_rfc3339()));
                params.push(("timeMax", time_max.to_rfc3339()));
                params.push(("orderBy", "startTime".to_string()));
            }
            EventsQuery::Changes { sync_token } => {
                params.push(("syncToken", sync_token.clone()));
            }
        }

        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }

        params
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendarClient {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn list_calendars(
        &self,
        access_token: &str,
    ) -> Result<Vec<RemoteCalendar>, ProviderError> {
        let url = format!("{}/users/me/calendarList", self.api_base);
        let mut calendars = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = vec![("maxResults", self.page_size.to_string())];
            if let Some(token) = &page_token {
                params.push(("pageToken", token.clone()));
            }

            let page: CalendarListPage = self
                .with_deadline(async {
                    let response = self
                        .client
                        .get(&url)
                        .bearer_auth(access_token)
                        .query(&params)
                        .send()
                        .await?;
                    decode(check_status(response).await?).await
                })
                .await?;

            calendars.extend(page.items.into_iter().filter(|c| !c.deleted));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(calendars)
    }

    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        query: &EventsQuery,
        page_token: Option<&str>,
    ) -> Result<EventsPage, ProviderError> {
        let url = format!(
            "{}/calendars/{}/events",
            self.api_base,
            urlencoding::encode(calendar_id)
        );
        let params = self.events_params(query, page_token);

        self.with_deadline(async {
            let response = self
                .client
                .get(&url)
                .bearer_auth(access_token)
                .query(&params)
                .send()
                .await?;

            // Google answers an expired or unknown syncToken with 410 Gone
            if response.status() == StatusCode::GONE {
                return Err(ProviderError::CursorInvalid);
            }

            decode(check_status(response).await?).await
        })
        .await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, ProviderError> {
        self.with_deadline(async {
            let response = self
                .client
                .post(&self.token_url)
                .form(&[
                    ("client_id", self.client_id.as_str()),
                    ("client_secret", self.client_secret.as_str()),
                    ("refresh_token", refresh_token),
                    ("grant_type", "refresh_token"),
                ])
                .send()
                .await?;

            decode(check_status(response).await?).await
        })
        .await
    }
}

async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(ProviderError::Unauthorized);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ProviderError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::at;
    use mockito::Matcher;

    fn client_for(server: &mockito::ServerGuard) -> GoogleCalendarClient {
        let config = SyncConfig {
            google_api_base: server.url(),
            google_token_url: format!("{}/token", server.url()),
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            ..SyncConfig::default()
        };
        GoogleCalendarClient::new(&config)
    }

    #[tokio::test]
    async fn test_window_query_requests_deleted_single_events() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/calendars/primary/events")
            .match_header("authorization", "Bearer access-1")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("showDeleted".into(), "true".into()),
                Matcher::UrlEncoded("singleEvents".into(), "true".into()),
                Matcher::UrlEncoded("orderBy".into(), "startTime".into()),
                Matcher::UrlEncoded("timeMin".into(), at(2025, 1, 1, 0).to_rfc3339()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "items": [
                        {"id": "evt-1", "status": "confirmed", "summary": "Standup",
                         "start": {"dateTime": "2025-01-06T09:00:00+01:00"},
                         "end": {"dateTime": "2025-01-06T09:15:00+01:00"}},
                        {"id": "evt-2", "status": "cancelled"}
                    ],
                    "nextSyncToken": "sync-1"
                }"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let query = EventsQuery::Window {
            time_min: at(2025, 1, 1, 0),
            time_max: at(2026, 1, 1, 0),
        };
        let page = client
            .list_events("access-1", "primary", &query, None)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(page.items.len(), 2);
        assert!(page.items[1].is_cancelled());
        assert_eq!(page.next_sync_token.as_deref(), Some("sync-1"));
        assert!(page.next_page_token.is_none());
    }

    #[tokio::test]
    async fn test_gone_maps_to_cursor_invalid() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/calendars/primary/events")
            .match_query(Matcher::UrlEncoded("syncToken".into(), "stale".into()))
            .with_status(410)
            .with_body(r#"{"error": {"code": 410, "message": "Sync token is no longer valid"}}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let query = EventsQuery::Changes {
            sync_token: "stale".to_string(),
        };
        let err = client
            .list_events("access-1", "primary", &query, None)
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::CursorInvalid));
    }

    #[tokio::test]
    async fn test_other_failures_keep_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/calendars/primary/events")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("backend unavailable")
            .create_async()
            .await;
        server
            .mock("GET", "/users/me/calendarList")
            .match_query(Matcher::Any)
            .with_status(401)
            .create_async()
            .await;

        let client = client_for(&server);
        let query = EventsQuery::Changes {
            sync_token: "tok".to_string(),
        };

        match client.list_events("a", "primary", &query, Some("page-2")).await {
            Err(ProviderError::Status { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "backend unavailable");
            }
            other => panic!("expected status error, got {other:?}"),
        }
        assert!(matches!(
            client.list_calendars("a").await,
            Err(ProviderError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_calendar_list_follows_pages_and_drops_deleted() {
        let mut server = mockito::Server::new_async().await;
        let second = server
            .mock("GET", "/users/me/calendarList")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("maxResults".into(), "250".into()),
                Matcher::UrlEncoded("pageToken".into(), "p2".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"items": [{"id": "team@example.com", "summary": "Team", "deleted": true}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/users/me/calendarList")
            // first page: page size only, no pageToken
            .match_query(Matcher::Exact("maxResults=250".into()))
            .with_status(200)
            .with_body(
                r#"{"items": [{"id": "me@example.com", "summary": "Me", "primary": true,
                               "summaryOverride": "Personal", "timeZone": "Europe/Berlin"}],
                    "nextPageToken": "p2"}"#,
            )
            .create_async()
            .await;

        let calendars = client_for(&server).list_calendars("a").await.unwrap();

        second.assert_async().await;
        assert_eq!(calendars.len(), 1);
        assert_eq!(calendars[0].display_name(), "Personal");
        assert!(calendars[0].primary);
    }

    #[tokio::test]
    async fn test_refresh_posts_refresh_grant() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "refresh-1".into()),
                Matcher::UrlEncoded("client_id".into(), "client-id".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"access_token": "access-2", "expires_in": 3599, "token_type": "Bearer"}"#)
            .create_async()
            .await;

        let token = client_for(&server).refresh_token("refresh-1").await.unwrap();

        mock.assert_async().await;
        assert_eq!(token.access_token, "access-2");
        assert_eq!(token.expires_in, Some(3599));
        assert!(token.refresh_token.is_none());
    }
}
