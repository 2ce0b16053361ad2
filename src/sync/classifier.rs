use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::models::{CalendarEvent, EventDraft, EventUpdate, EventVisibility};
use crate::provider::{RemoteEvent, RemoteEventTime};

/// What to write for one calendar after a fetch
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ChangeSet {
    pub to_create: Vec<EventDraft>,
    pub to_update: Vec<EventUpdate>,
    /// Source ids of local rows to remove
    pub to_delete: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Classification {
    pub changes: ChangeSet,
    /// Malformed or untitled items left out
    pub skipped: usize,
    /// Tombstones with no local row
    pub ignored_tombstones: usize,
}

/// Sorts remote items into create/update/delete against a calendar's local rows
pub struct ChangeClassifier<'a> {
    calendar_id: i64,
    calendar_tz: Option<Tz>,
    untitled_placeholder: Option<&'a str>,
}

impl<'a> ChangeClassifier<'a> {
    pub fn new(calendar_id: i64, calendar_tz: Option<&str>, untitled_placeholder: Option<&'a str>) -> Self {
        Self {
            calendar_id,
            calendar_tz: calendar_tz.and_then(|tz| tz.parse().ok()),
            untitled_placeholder,
        }
    }

    pub fn classify(&self, items: Vec<RemoteEvent>, existing: &[CalendarEvent]) -> Classification {
        let local: HashMap<&str, i64> = existing
            .iter()
            .map(|event| (event.source_id.as_str(), event.id))
            .collect();

        // A later copy of the same item supersedes earlier ones
        let mut last_seen: HashMap<String, usize> = HashMap::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            last_seen.insert(item.id.clone(), index);
        }

        let mut result = Classification::default();

        for (index, item) in items.into_iter().enumerate() {
            if last_seen.get(&item.id) != Some(&index) {
                continue;
            }
            if item.id.is_empty() {
                result.skipped += 1;
                continue;
            }

            let local_id = local.get(item.id.as_str()).copied();

            if item.is_cancelled() {
                match local_id {
                    Some(_) => result.changes.to_delete.push(item.id),
                    None => result.ignored_tombstones += 1,
                }
                continue;
            }

            let Some(draft) = self.to_draft(item) else {
                result.skipped += 1;
                continue;
            };

            match local_id {
                Some(id) => result.changes.to_update.push(EventUpdate { id, draft }),
                None => result.changes.to_create.push(draft),
            }
        }

        debug!(
            create = result.changes.to_create.len(),
            update = result.changes.to_update.len(),
            delete = result.changes.to_delete.len(),
            skipped = result.skipped,
            "classified remote items"
        );
        result
    }

    fn to_draft(&self, item: RemoteEvent) -> Option<EventDraft> {
        let title = match item.summary.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => {
                let placeholder = self.untitled_placeholder?;
                placeholder.to_string()
            }
        };

        let (Some(start), Some(end)) = (item.start.as_ref(), item.end.as_ref()) else {
            debug!(source_id = %item.id, "skipping item without start or end");
            return None;
        };

        let parsed = parse_time(start, self.calendar_tz).zip(parse_time(end, self.calendar_tz));
        let Some(((start, all_day), (end, _))) = parsed else {
            warn!(source_id = %item.id, "skipping item with unparseable start or end");
            return None;
        };
        if end < start {
            warn!(source_id = %item.id, "skipping item that ends before it starts");
            return None;
        }

        Some(EventDraft {
            calendar_id: self.calendar_id,
            source_id: item.id,
            title,
            start,
            end,
            all_day,
            location: item.location.filter(|l| !l.is_empty()),
            description: item.description.filter(|d| !d.is_empty()),
            color: item.color_id,
            visibility: visibility(item.visibility.as_deref()),
        })
    }
}

/// `date` means all-day; `dateTime` is RFC 3339, or local time in the item's or calendar's zone
fn parse_time(time: &RemoteEventTime, calendar_tz: Option<Tz>) -> Option<(DateTime<Utc>, bool)> {
    if let Some(date) = time.date.as_deref() {
        let day = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
        return Some((day.and_hms_opt(0, 0, 0)?.and_utc(), true));
    }

    let raw = time.date_time.as_deref()?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some((dt.with_timezone(&Utc), false));
    }

    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").ok()?;
    let tz = time
        .time_zone
        .as_deref()
        .and_then(|tz| tz.parse::<Tz>().ok())
        .or(calendar_tz)
        .unwrap_or(Tz::UTC);
    let local = tz.from_local_datetime(&naive).earliest()?;
    Some((local.with_timezone(&Utc), false))
}

fn visibility(raw: Option<&str>) -> EventVisibility {
    match raw {
        Some("public") => EventVisibility::Public,
        Some("private") | Some("confidential") => EventVisibility::Private,
        _ => EventVisibility::Inherit,
    }
}
