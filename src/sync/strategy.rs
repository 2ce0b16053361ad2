use chrono::{DateTime, Duration, Utc};

use crate::models::{Calendar, SyncStatus};

/// How a calendar pass fetches from the provider, decided once per pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncMode {
    /// Re-read the whole sync window
    Full,
    /// Changes since the stored cursor
    Incremental(String),
    /// Full re-read after the provider rejected the cursor
    RecoveryFull,
}

impl SyncMode {
    pub fn is_full(&self) -> bool {
        !matches!(self, SyncMode::Incremental(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Full => "full",
            SyncMode::Incremental(_) => "incremental",
            SyncMode::RecoveryFull => "recovery_full",
        }
    }
}

/// Checked in order: force, never synced, no cursor, missing or aged baseline
pub fn should_full_sync(
    calendar: &Calendar,
    force: bool,
    now: DateTime<Utc>,
    max_age: Duration,
) -> bool {
    if force {
        return true;
    }
    if calendar.sync.status == SyncStatus::NeverSynced {
        return true;
    }
    if calendar
        .sync
        .sync_token
        .as_deref()
        .is_none_or(|token| token.is_empty())
    {
        return true;
    }
    match calendar.sync.last_full_sync {
        Some(last) => now - last > max_age,
        None => true,
    }
}

pub fn select_mode(
    calendar: &Calendar,
    force: bool,
    now: DateTime<Utc>,
    max_age: Duration,
) -> SyncMode {
    if should_full_sync(calendar, force, now, max_age) {
        return SyncMode::Full;
    }
    match calendar.sync.sync_token.clone() {
        Some(token) => SyncMode::Incremental(token),
        None => SyncMode::Full,
    }
}

/// Never-checked calendars are always stale
pub fn is_stale(calendar: &Calendar, now: DateTime<Utc>, freshness: Duration) -> bool {
    calendar
        .sync
        .last_checked
        .is_none_or(|checked| now - checked > freshness)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CalendarSyncState, CalendarVisibility, ProviderKind};
    use crate::testing::at;

    fn calendar(
        status: SyncStatus,
        token: Option<&str>,
        last_full_sync: Option<DateTime<Utc>>,
    ) -> Calendar {
        Calendar {
            id: 1,
            user_id: 1,
            source_id: Some("primary".into()),
            provider: ProviderKind::Google,
            summary: "Work".into(),
            time_zone: None,
            description: None,
            color: None,
            visibility: CalendarVisibility::Private,
            redaction: None,
            sync: CalendarSyncState {
                status,
                sync_token: token.map(str::to_string),
                last_full_sync,
                last_checked: last_full_sync,
            },
        }
    }

    #[test]
    fn test_never_synced_is_full_regardless_of_force() {
        let now = at(2025, 3, 1, 12);
        let cal = calendar(SyncStatus::NeverSynced, Some("tok"), Some(now));

        assert!(should_full_sync(&cal, false, now, Duration::hours(24)));
        assert!(should_full_sync(&cal, true, now, Duration::hours(24)));
    }

    #[test]
    fn test_recent_baseline_with_cursor_is_incremental() {
        let now = at(2025, 3, 1, 12);
        let cal = calendar(
            SyncStatus::IncrementalSync,
            Some("tok"),
            Some(now - Duration::hours(1)),
        );

        assert!(!should_full_sync(&cal, false, now, Duration::hours(24)));
        assert!(should_full_sync(&cal, true, now, Duration::hours(24)));
        assert_eq!(
            select_mode(&cal, false, now, Duration::hours(24)),
            SyncMode::Incremental("tok".to_string())
        );
    }

    #[test]
    fn test_missing_cursor_or_old_baseline_forces_full() {
        let now = at(2025, 3, 1, 12);
        let max_age = Duration::hours(24);

        let empty = calendar(SyncStatus::FullSyncComplete, Some(""), Some(now));
        let absent = calendar(SyncStatus::FullSyncComplete, None, Some(now));
        let aged = calendar(
            SyncStatus::IncrementalSync,
            Some("tok"),
            Some(now - Duration::hours(25)),
        );
        let no_baseline = calendar(SyncStatus::IncrementalSync, Some("tok"), None);

        for cal in [empty, absent, aged, no_baseline] {
            assert_eq!(select_mode(&cal, false, now, max_age), SyncMode::Full);
        }
    }

    #[test]
    fn test_staleness() {
        let now = at(2025, 3, 1, 12);
        let freshness = Duration::seconds(60);
        let mut cal = calendar(SyncStatus::IncrementalSync, Some("tok"), None);

        assert!(is_stale(&cal, now, freshness));
        cal.sync.last_checked = Some(now - Duration::seconds(30));
        assert!(!is_stale(&cal, now, freshness));
        cal.sync.last_checked = Some(now - Duration::seconds(61));
        assert!(is_stale(&cal, now, freshness));
    }
}
