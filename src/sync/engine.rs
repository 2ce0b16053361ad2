use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::applier::{ApplyReport, apply_changes};
use super::classifier::ChangeClassifier;
use super::credentials::CredentialRefresher;
use super::fetcher::{EventFetcher, FetchResult};
use super::strategy::{SyncMode, is_stale, select_mode};
use crate::config::SyncConfig;
use crate::error::{ProviderError, SyncError};
use crate::models::{Calendar, CalendarVisibility, NewCalendar, ProviderKind, SyncStatus};
use crate::provider::CalendarProvider;
use crate::store::{Database, EventStore, SyncRecord};

/// Result of one calendar pass
#[derive(Debug, Clone, Serialize)]
pub struct CalendarSyncReport {
    pub calendar_id: i64,
    pub mode: &'static str,
    pub fetched: usize,
    pub pages: usize,
    pub skipped: usize,
    pub applied: ApplyReport,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct UserSyncReport {
    pub discovered: usize,
    pub synced: Vec<CalendarSyncReport>,
    /// Calendars checked recently enough to be left alone
    pub fresh: usize,
    pub failed: usize,
}

pub struct SyncEngine {
    db: Database,
    events: Arc<dyn EventStore>,
    provider: Arc<dyn CalendarProvider>,
    credentials: CredentialRefresher,
    config: SyncConfig,
}

impl SyncEngine {
    pub fn new(db: Database, provider: Arc<dyn CalendarProvider>, config: SyncConfig) -> Self {
        Self {
            events: Arc::new(db.clone()),
            db,
            provider,
            credentials: CredentialRefresher::new(config.token_refresh_skew),
            config,
        }
    }

    /// Route event writes through another store
    pub fn with_event_store(mut self, events: Arc<dyn EventStore>) -> Self {
        self.events = events;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Bring a user's calendars up to date if they look stale.
    ///
    /// Never fails: any problem is logged and the caller reads what is
    /// already stored. Returns whether at least one calendar was synced.
    pub async fn sync_if_needed(&self, user_id: i64, force: bool) -> bool {
        self.sync_if_needed_at(user_id, force, Utc::now()).await
    }

    pub async fn sync_if_needed_at(&self, user_id: i64, force: bool, now: DateTime<Utc>) -> bool {
        let calendars = match self.db.calendars_for_user(user_id).await {
            Ok(calendars) => calendars,
            Err(e) => {
                warn!(user_id, error = %e, "could not load calendars, serving cached data");
                return false;
            }
        };

        if !self.needs_sync(&calendars, force, now) {
            debug!(user_id, "calendars fresh, serving cached data");
            return false;
        }

        match self.sync_user(user_id, force, now).await {
            Ok(report) => {
                info!(
                    user_id,
                    synced = report.synced.len(),
                    fresh = report.fresh,
                    failed = report.failed,
                    "sync pass finished"
                );
                !report.synced.is_empty()
            }
            Err(e) => {
                warn!(user_id, error = %e, "sync pass aborted, serving cached data");
                false
            }
        }
    }

    // Imported calendars are never fetched, so only remote ones count towards staleness.
    fn needs_sync(&self, calendars: &[Calendar], force: bool, now: DateTime<Utc>) -> bool {
        let mut remote = calendars.iter().filter(|c| c.is_remote()).peekable();
        force
            || remote.peek().is_none()
            || remote.any(|c| is_stale(c, now, self.config.freshness_window))
    }

    /// Refresh credentials once, then sweep the user's remote calendars
    #[tracing::instrument(skip(self, now))]
    pub async fn sync_user(
        &self,
        user_id: i64,
        force: bool,
        now: DateTime<Utc>,
    ) -> Result<UserSyncReport, SyncError> {
        let account = self
            .db
            .find_account(user_id, self.provider.name())
            .await?
            .ok_or_else(|| SyncError::NoAccount {
                user_id,
                provider: self.provider.name().to_string(),
            })?;

        let account = self
            .credentials
            .ensure_usable(&self.db, self.provider.as_ref(), account, now)
            .await?;

        let mut report = UserSyncReport::default();
        let mut calendars: Vec<Calendar> = self
            .db
            .calendars_for_user(user_id)
            .await?
            .into_iter()
            .filter(Calendar::is_remote)
            .collect();

        if calendars.is_empty() {
            calendars = self.discover_calendars(user_id, &account.access_token).await?;
            report.discovered = calendars.len();
        }

        for calendar in &calendars {
            if !force && !is_stale(calendar, now, self.config.freshness_window) {
                report.fresh += 1;
                continue;
            }

            match self
                .sync_calendar(calendar, &account.access_token, force, now)
                .await
            {
                Ok(calendar_report) => report.synced.push(calendar_report),
                Err(e) => {
                    warn!(calendar_id = calendar.id, error = %e, "calendar sync failed");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Create local rows for every remote calendar never tracked before.
    ///
    /// Calendars the user deleted stay deleted.
    pub async fn discover_calendars(
        &self,
        user_id: i64,
        access_token: &str,
    ) -> Result<Vec<Calendar>, SyncError> {
        let remote = self.provider.list_calendars(access_token).await?;
        let mut created = Vec::with_capacity(remote.len());

        for entry in remote {
            if self.db.source_ever_tracked(user_id, &entry.id).await? {
                continue;
            }

            let calendar = self
                .db
                .create_calendar(&NewCalendar {
                    user_id,
                    source_id: Some(entry.id.clone()),
                    provider: ProviderKind::Google,
                    summary: entry.display_name().to_string(),
                    time_zone: entry.time_zone.clone(),
                    description: entry.description.clone(),
                    color: entry.background_color.clone(),
                    visibility: CalendarVisibility::Private,
                    redaction: None,
                    sync_status: SyncStatus::NeverSynced,
                    last_full_sync: None,
                })
                .await?;
            info!(calendar_id = calendar.id, source_id = %entry.id, "discovered calendar");
            created.push(calendar);
        }

        Ok(created)
    }

    /// One full or incremental pass; the sync record is always the last write
    #[tracing::instrument(skip_all, fields(calendar_id = calendar.id))]
    pub async fn sync_calendar(
        &self,
        calendar: &Calendar,
        access_token: &str,
        force: bool,
        now: DateTime<Utc>,
    ) -> Result<CalendarSyncReport, SyncError> {
        let source_id = match calendar.source_id.as_deref() {
            Some(id) if calendar.is_remote() => id,
            _ => {
                return Err(SyncError::Provider(ProviderError::Decode(format!(
                    "calendar {} has no remote source",
                    calendar.id
                ))));
            }
        };

        let fetcher = EventFetcher::new(
            self.provider.as_ref(),
            self.config.window_past,
            self.config.window_future,
        );
        let mut mode = select_mode(calendar, force, now, self.config.full_sync_max_age);

        if mode.is_full() {
            // a failed fetch must leave the calendar flagged for another full pass
            self.db.clear_sync_token(calendar.id).await?;
        }

        let fetched: FetchResult = match fetcher.fetch(access_token, source_id, &mode, now).await {
            Ok(fetched) => fetched,
            Err(ProviderError::CursorInvalid) if !mode.is_full() => {
                warn!("sync cursor rejected, falling back to a full sync");
                self.db.clear_sync_token(calendar.id).await?;
                mode = SyncMode::RecoveryFull;
                fetcher.fetch(access_token, source_id, &mode, now).await?
            }
            Err(e) => return Err(e.into()),
        };

        let existing = self.db.events_for_calendar(calendar.id).await?;
        let fetched_count = fetched.items.len();
        let classification = ChangeClassifier::new(
            calendar.id,
            calendar.time_zone.as_deref(),
            self.config.untitled_placeholder.as_deref(),
        )
        .classify(fetched.items, &existing);

        let applied = apply_changes(self.events.as_ref(), calendar.id, classification.changes).await;

        let status = if mode.is_full() {
            SyncStatus::FullSyncComplete
        } else {
            SyncStatus::IncrementalSync
        };
        // changes past this cursor were not all written, so the next pass has to be full
        let sync_token = if applied.create_failed || applied.update_failed {
            warn!("event batch failed, dropping the sync cursor");
            None
        } else {
            fetched.next_sync_token
        };
        self.db
            .record_sync(
                calendar.id,
                &SyncRecord {
                    status,
                    sync_token,
                    last_full_sync: mode.is_full().then_some(now),
                    checked_at: now,
                },
            )
            .await?;

        info!(
            mode = mode.as_str(),
            fetched = fetched_count,
            created = applied.created,
            updated = applied.updated,
            deleted = applied.deletions.succeeded,
            clean = applied.is_clean(),
            "calendar synced"
        );

        Ok(CalendarSyncReport {
            calendar_id: calendar.id,
            mode: mode.as_str(),
            fetched: fetched_count,
            pages: fetched.pages,
            skipped: classification.skipped,
            applied,
        })
    }
}
