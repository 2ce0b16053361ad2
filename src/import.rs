use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{error, info, warn};

use crate::error::{ImportError, ValidationError};
use crate::ics::{IcsDocument, IcsItem, IcsTime, parse_document};
use crate::models::{
    Calendar, CalendarVisibility, EventDraft, EventVisibility, NewCalendar, ProviderKind,
    SyncStatus,
};
use crate::store::{Database, EventStore};

/// Caller-supplied settings for a new imported calendar
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub user_id: i64,
    /// Overrides the document's `X-WR-CALNAME`
    pub name: Option<String>,
    pub color: Option<String>,
    pub visibility: CalendarVisibility,
    pub redaction: Option<String>,
}

impl ImportRequest {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            name: None,
            color: None,
            visibility: CalendarVisibility::Private,
            redaction: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportOutcome {
    pub calendar: Calendar,
    /// Events actually written
    pub imported: u64,
    /// VEVENTs in the document
    pub total: usize,
    pub skipped: usize,
}

pub struct StaticImporter<'a> {
    db: &'a Database,
}

impl<'a> StaticImporter<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub async fn import_str(
        &self,
        request: &ImportRequest,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<ImportOutcome, ImportError> {
        let document = parse_document(content)?;
        self.import_document(request, document, now).await
    }

    /// Create one calendar for `document` and bulk-insert whatever converts.
    ///
    /// Individual items that fail to convert are skipped; once the calendar
    /// row exists the import counts as done.
    #[tracing::instrument(skip_all, fields(user_id = request.user_id))]
    pub async fn import_document(
        &self,
        request: &ImportRequest,
        document: IcsDocument,
        now: DateTime<Utc>,
    ) -> Result<ImportOutcome, ImportError> {
        let name = request
            .name
            .clone()
            .or(document.name.clone())
            .filter(|n| !n.trim().is_empty())
            .ok_or(ValidationError::MissingField("name"))?;

        let calendar = self
            .db
            .create_calendar(&NewCalendar {
                user_id: request.user_id,
                source_id: None,
                provider: ProviderKind::Ics,
                summary: name,
                time_zone: document.time_zone.clone(),
                description: None,
                color: request.color.clone(),
                visibility: request.visibility,
                redaction: request.redaction.clone(),
                sync_status: SyncStatus::FullSyncComplete,
                last_full_sync: Some(now),
            })
            .await?;

        let fallback_tz = document.time_zone.as_deref().and_then(|tz| tz.parse::<Tz>().ok());
        let total = document.items.len();
        let drafts = convert_items(calendar.id, document.items, fallback_tz);
        let skipped = total - drafts.len();

        let imported = match self.db.insert_events(&drafts).await {
            Ok(written) => written,
            Err(e) => {
                error!(calendar_id = calendar.id, error = %e, "bulk insert of imported events failed");
                0
            }
        };

        info!(calendar_id = calendar.id, imported, total, "calendar imported");
        Ok(ImportOutcome {
            calendar,
            imported,
            total,
            skipped,
        })
    }
}

fn convert_items(calendar_id: i64, items: Vec<IcsItem>, fallback_tz: Option<Tz>) -> Vec<EventDraft> {
    let mut drafts: Vec<EventDraft> = Vec::with_capacity(items.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for item in items {
        if item.cancelled {
            continue;
        }
        let Some(draft) = convert_item(calendar_id, item, fallback_tz) else {
            continue;
        };

        // repeated keys keep the last definition
        match positions.get(&draft.source_id) {
            Some(&index) => drafts[index] = draft,
            None => {
                positions.insert(draft.source_id.clone(), drafts.len());
                drafts.push(draft);
            }
        }
    }

    drafts
}

fn convert_item(calendar_id: i64, item: IcsItem, fallback_tz: Option<Tz>) -> Option<EventDraft> {
    let Some(source_id) = item.source_id() else {
        warn!("skipping VEVENT without UID");
        return None;
    };
    let Some(title) = item.summary.filter(|s| !s.trim().is_empty()) else {
        warn!(%source_id, "skipping VEVENT without SUMMARY");
        return None;
    };
    let Some(start) = item.start else {
        warn!(%source_id, "skipping VEVENT without a readable DTSTART");
        return None;
    };

    let all_day = matches!(start, IcsTime::Date(_));
    let start_at = resolve(&start, fallback_tz)?;
    // RFC 5545: no DTEND means one day for dates, zero length otherwise
    let end_at = match &item.end {
        Some(end) => resolve(end, fallback_tz)?,
        None if all_day => start_at + Duration::days(1),
        None => start_at,
    };
    if end_at < start_at {
        warn!(%source_id, "skipping VEVENT that ends before it starts");
        return None;
    }

    Some(EventDraft {
        calendar_id,
        source_id,
        title,
        start: start_at,
        end: end_at,
        all_day,
        location: item.location,
        description: item.description,
        color: None,
        visibility: EventVisibility::Inherit,
    })
}

/// TZID first, then the calendar's zone, then UTC
fn resolve(time: &IcsTime, fallback_tz: Option<Tz>) -> Option<DateTime<Utc>> {
    match time {
        IcsTime::Date(date) => date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc()),
        IcsTime::Utc(dt) => Some(*dt),
        IcsTime::Floating(naive) => localize(naive, fallback_tz.unwrap_or(Tz::UTC)),
        IcsTime::Zoned { datetime, tzid } => {
            let tz = tzid
                .parse::<Tz>()
                .ok()
                .or(fallback_tz)
                .unwrap_or(Tz::UTC);
            localize(datetime, tz)
        }
    }
}

fn localize(naive: &NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::at;
    use chrono::NaiveDate;

    fn naive(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 5, 5)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn item(uid: &str, start: IcsTime, end: Option<IcsTime>) -> IcsItem {
        IcsItem {
            uid: Some(uid.to_string()),
            summary: Some(format!("event {uid}")),
            start: Some(start),
            end,
            ..IcsItem::default()
        }
    }

    #[test]
    fn test_timezone_resolution_falls_back_to_utc() {
        let berlin: Tz = "Europe/Berlin".parse().unwrap();
        let zoned = IcsTime::Zoned {
            datetime: naive(11),
            tzid: "America/New_York".into(),
        };
        let unknown = IcsTime::Zoned {
            datetime: naive(11),
            tzid: "Mars/Olympus_Mons".into(),
        };

        assert_eq!(resolve(&zoned, None), Some(at(2025, 5, 5, 15)));
        assert_eq!(resolve(&unknown, Some(berlin)), Some(at(2025, 5, 5, 9)));
        assert_eq!(resolve(&unknown, None), Some(at(2025, 5, 5, 11)));
        assert_eq!(resolve(&IcsTime::Floating(naive(11)), None), Some(at(2025, 5, 5, 11)));
    }

    #[test]
    fn test_conversion_skips_bad_items_and_dedupes() {
        let day = NaiveDate::from_ymd_opt(2025, 5, 5).unwrap();
        let mut untitled = item("b", IcsTime::Utc(at(2025, 5, 5, 9)), None);
        untitled.summary = None;
        let mut no_start = item("c", IcsTime::Utc(at(2025, 5, 5, 9)), None);
        no_start.start = None;
        let mut replaced = item("a", IcsTime::Utc(at(2025, 5, 5, 9)), None);
        replaced.summary = Some("second".into());

        let drafts = convert_items(
            3,
            vec![
                item("a", IcsTime::Date(day), None),
                untitled,
                no_start,
                IcsItem::default(),
                replaced,
            ],
            None,
        );

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].title, "second");
        assert!(!drafts[0].all_day);
        assert_eq!(drafts[0].end, drafts[0].start);
    }

    #[test]
    fn test_all_day_without_end_spans_one_day() {
        let day = NaiveDate::from_ymd_opt(2025, 5, 5).unwrap();
        let drafts = convert_items(3, vec![item("a", IcsTime::Date(day), None)], None);

        assert!(drafts[0].all_day);
        assert_eq!(drafts[0].end - drafts[0].start, Duration::days(1));
    }

    #[tokio::test]
    async fn test_import_without_any_name_is_rejected() {
        let db = Database::in_memory().await.unwrap();
        let err = StaticImporter::new(&db)
            .import_document(&ImportRequest::new(1), IcsDocument::default(), at(2025, 5, 1, 0))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ImportError::Validation(ValidationError::MissingField("name"))
        ));
        assert!(db.calendars_for_user(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_import_creates_complete_calendar_and_counts_converted_items() {
        let db = Database::in_memory().await.unwrap();
        let now = at(2025, 5, 1, 0);
        let document = IcsDocument {
            name: Some("Conference".into()),
            time_zone: Some("Europe/Berlin".into()),
            items: vec![
                item("a", IcsTime::Floating(naive(10)), Some(IcsTime::Floating(naive(11)))),
                IcsItem::default(),
            ],
        };

        let outcome = StaticImporter::new(&db)
            .import_document(&ImportRequest::new(1), document, now)
            .await
            .unwrap();

        assert_eq!(outcome.imported, 1);
        assert_eq!(outcome.total, 2);
        assert_eq!(outcome.skipped, 1);
        let calendar = &outcome.calendar;
        assert_eq!(calendar.provider, ProviderKind::Ics);
        assert_eq!(calendar.summary, "Conference");
        assert_eq!(calendar.sync.status, SyncStatus::FullSyncComplete);
        assert_eq!(calendar.sync.last_full_sync, Some(now));
        assert!(calendar.sync.sync_token.is_none());
        assert!(!calendar.is_remote());

        let events = db.events_for_calendar(calendar.id).await.unwrap();
        assert_eq!(events[0].start, at(2025, 5, 5, 8));
    }
}
