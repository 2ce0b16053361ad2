use chrono::{DateTime, Utc};

use super::{Database, decode_error};
use crate::models::{Calendar, CalendarRow, NewCalendar, SyncStatus};

const CALENDAR_COLUMNS: &str = "id, user_id, source_id, provider, summary, time_zone, \
     description, color, visibility, redaction, sync_status, sync_token, last_full_sync, \
     last_checked";

/// Outcome of a successful pass, written back as the last step of that pass
#[derive(Debug, Clone)]
pub struct SyncRecord {
    pub status: SyncStatus,
    pub sync_token: Option<String>,
    /// Only set for full passes; `None` leaves the stored value alone
    pub last_full_sync: Option<DateTime<Utc>>,
    pub checked_at: DateTime<Utc>,
}

impl Database {
    pub async fn create_calendar(&self, calendar: &NewCalendar) -> Result<Calendar, sqlx::Error> {
        let row = sqlx::query_as::<_, CalendarRow>(&format!(
            r#"
            INSERT INTO calendars (user_id, source_id, provider, summary, time_zone, description,
                                   color, visibility, redaction, sync_status, last_full_sync,
                                   last_checked)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {CALENDAR_COLUMNS}
            "#
        ))
        .bind(calendar.user_id)
        .bind(&calendar.source_id)
        .bind(calendar.provider.as_str())
        .bind(&calendar.summary)
        .bind(&calendar.time_zone)
        .bind(&calendar.description)
        .bind(&calendar.color)
        .bind(calendar.visibility.as_str())
        .bind(&calendar.redaction)
        .bind(calendar.sync_status.as_str())
        .bind(calendar.last_full_sync)
        // a calendar populated at creation counts as checked at that moment
        .bind(calendar.last_full_sync)
        .fetch_one(&self.pool)
        .await?;

        Calendar::try_from(row).map_err(decode_error)
    }

    /// Live (not deleted) calendars for a user, oldest first
    pub async fn calendars_for_user(&self, user_id: i64) -> Result<Vec<Calendar>, sqlx::Error> {
        let rows = sqlx::query_as::<_, CalendarRow>(&format!(
            "SELECT {CALENDAR_COLUMNS} FROM calendars \
             WHERE user_id = ? AND deleted_at IS NULL ORDER BY id ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| Calendar::try_from(row).map_err(decode_error))
            .collect()
    }

    pub async fn calendar(&self, id: i64) -> Result<Option<Calendar>, sqlx::Error> {
        let row = sqlx::query_as::<_, CalendarRow>(&format!(
            "SELECT {CALENDAR_COLUMNS} FROM calendars WHERE id = ? AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| Calendar::try_from(r).map_err(decode_error))
            .transpose()
    }

    /// Whether `source_id` was ever tracked for the user, soft-deleted rows included
    pub async fn source_ever_tracked(
        &self,
        user_id: i64,
        source_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM calendars WHERE user_id = ? AND source_id = ?")
                .bind(user_id)
                .bind(source_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    /// Drop the stored cursor ahead of a full fetch
    pub async fn clear_sync_token(&self, calendar_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE calendars SET sync_token = NULL WHERE id = ?")
            .bind(calendar_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn record_sync(&self, calendar_id: i64, record: &SyncRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE calendars
            SET sync_status = ?,
                sync_token = ?,
                last_full_sync = COALESCE(?, last_full_sync),
                last_checked = ?
            WHERE id = ?
            "#,
        )
        .bind(record.status.as_str())
        .bind(&record.sync_token)
        .bind(record.last_full_sync)
        .bind(record.checked_at)
        .bind(calendar_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Soft-delete a calendar and remove its events; `false` if nothing matched
    pub async fn delete_calendar(&self, calendar_id: i64) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let rows_affected = sqlx::query(
            "UPDATE calendars SET deleted_at = ?, sync_token = NULL \
             WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(Utc::now())
        .bind(calendar_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("DELETE FROM events WHERE calendar_id = ?")
            .bind(calendar_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }
}
