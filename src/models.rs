use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// Where a calendar's data comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Google Calendar, kept current by the sync engine
    Google,
    /// One-shot ICS import, never re-fetched
    Ics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    NeverSynced,
    FullSyncComplete,
    IncrementalSync,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarVisibility {
    Public,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventVisibility {
    Public,
    Private,
    /// Follows the owning calendar
    Inherit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown variant: {}", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

// Enums are stored as TEXT columns; these pairs keep the spelling in one place.
macro_rules! text_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err(UnknownVariant(other.to_string())),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(ProviderKind { Google => "google", Ics => "ics" });
text_enum!(SyncStatus {
    NeverSynced => "never_synced",
    FullSyncComplete => "full_sync_complete",
    IncrementalSync => "incremental_sync",
});
text_enum!(CalendarVisibility { Public => "public", Private => "private" });
text_enum!(EventVisibility {
    Public => "public",
    Private => "private",
    Inherit => "inherit",
});

/// Stored OAuth credential for one (user, provider) pair
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub id: i64,
    pub user_id: i64,
    pub provider: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct CalendarRow {
    pub id: i64,
    pub user_id: i64,
    pub source_id: Option<String>,
    pub provider: String,
    pub summary: String,
    pub time_zone: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub visibility: String,
    pub redaction: Option<String>,
    pub sync_status: String,
    pub sync_token: Option<String>,
    pub last_full_sync: Option<DateTime<Utc>>,
    pub last_checked: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Calendar {
    pub id: i64,
    pub user_id: i64,
    /// Provider's calendar id; `None` for ICS imports
    pub source_id: Option<String>,
    pub provider: ProviderKind,
    pub summary: String,
    pub time_zone: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub visibility: CalendarVisibility,
    /// Prefix shown on event titles to viewers other than the owner
    pub redaction: Option<String>,
    pub sync: CalendarSyncState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarSyncState {
    pub status: SyncStatus,
    #[serde(skip)]
    pub sync_token: Option<String>,
    pub last_full_sync: Option<DateTime<Utc>>,
    pub last_checked: Option<DateTime<Utc>>,
}

impl Calendar {
    pub fn is_remote(&self) -> bool {
        self.provider == ProviderKind::Google && self.source_id.is_some()
    }
}

impl TryFrom<CalendarRow> for Calendar {
    type Error = UnknownVariant;

    fn try_from(row: CalendarRow) -> Result<Self, Self::Error> {
        Ok(Calendar {
            id: row.id,
            user_id: row.user_id,
            source_id: row.source_id,
            provider: row.provider.parse()?,
            summary: row.summary,
            time_zone: row.time_zone,
            description: row.description,
            color: row.color,
            visibility: row.visibility.parse()?,
            redaction: row.redaction,
            sync: CalendarSyncState {
                status: row.sync_status.parse()?,
                sync_token: row.sync_token,
                last_full_sync: row.last_full_sync,
                last_checked: row.last_checked,
            },
        })
    }
}

/// Fields needed to create a calendar row
#[derive(Debug, Clone)]
pub struct NewCalendar {
    pub user_id: i64,
    pub source_id: Option<String>,
    pub provider: ProviderKind,
    pub summary: String,
    pub time_zone: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub visibility: CalendarVisibility,
    pub redaction: Option<String>,
    pub sync_status: SyncStatus,
    pub last_full_sync: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct EventRow {
    pub id: i64,
    pub calendar_id: i64,
    pub source_id: String,
    pub title: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub all_day: bool,
    pub location: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub visibility: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarEvent {
    pub id: i64,
    pub calendar_id: i64,
    pub source_id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
    pub location: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub visibility: EventVisibility,
}

impl CalendarEvent {
    /// True when the event touches the closed window `[start, end]`
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start <= end && self.end >= start
    }
}

impl TryFrom<EventRow> for CalendarEvent {
    type Error = UnknownVariant;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(CalendarEvent {
            id: row.id,
            calendar_id: row.calendar_id,
            source_id: row.source_id,
            title: row.title,
            start: row.start_at,
            end: row.end_at,
            all_day: row.all_day,
            location: row.location,
            description: row.description,
            color: row.color,
            visibility: row.visibility.parse()?,
        })
    }
}

/// Canonical form of an event before it is written
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub calendar_id: i64,
    pub source_id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
    pub location: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub visibility: EventVisibility,
}

/// A draft targeting an existing local row
#[derive(Debug, Clone, PartialEq)]
pub struct EventUpdate {
    pub id: i64,
    pub draft: EventDraft,
}
