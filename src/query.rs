//! Read path: sync if stale, then serve the stored events in a window.

use chrono::{DateTime, Months, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::{QueryError, ValidationError};
use crate::models::{Calendar, CalendarEvent};
use crate::sync::SyncEngine;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarWithEvents {
    #[serde(flatten)]
    pub calendar: Calendar,
    pub events: Vec<CalendarEvent>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventsView {
    /// Whether a remote sync ran for this read
    pub synced: bool,
    pub calendars: Vec<CalendarWithEvents>,
}

/// Reject reversed windows and windows wider than `max_months`; `start == end` is fine
pub fn validate_range(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    max_months: u32,
) -> Result<(), ValidationError> {
    if end < start {
        return Err(ValidationError::InvalidRange { start, end });
    }

    let too_wide = match start.checked_add_months(Months::new(max_months)) {
        Some(limit) => end > limit,
        None => true,
    };
    if too_wide {
        return Err(ValidationError::RangeTooWide {
            start,
            end,
            max_months,
        });
    }
    Ok(())
}

/// The title a non-owner sees
pub fn redacted_title(redaction: Option<&str>, title: &str) -> String {
    match redaction.filter(|r| !r.is_empty()) {
        Some(prefix) => format!("[{prefix}] {title}"),
        None => title.to_string(),
    }
}

/// Events of `owner_id` between `start` and `end`, as seen by `viewer_id`.
///
/// Sync problems are swallowed by the engine; only bad input and local read
/// failures come back as errors.
#[tracing::instrument(skip(engine))]
pub async fn get_events_with_sync(
    engine: &SyncEngine,
    viewer_id: i64,
    owner_id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    force: bool,
) -> Result<EventsView, QueryError> {
    validate_range(start, end, engine.config().max_range_months)?;

    let synced = engine.sync_if_needed(owner_id, force).await;
    let db = engine.database();
    let redact = viewer_id != owner_id;

    let mut calendars = Vec::new();
    for calendar in db.calendars_for_user(owner_id).await? {
        let mut events: Vec<CalendarEvent> = db
            .events_for_calendar(calendar.id)
            .await?
            .into_iter()
            .filter(|event| event.overlaps(start, end))
            .collect();

        if redact {
            for event in &mut events {
                event.title = redacted_title(calendar.redaction.as_deref(), &event.title);
            }
        }

        calendars.push(CalendarWithEvents { calendar, events });
    }

    debug!(synced, calendars = calendars.len(), "events served");
    Ok(EventsView { synced, calendars })
}
