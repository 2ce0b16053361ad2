use async_trait::async_trait;

use super::{Database, EventStore, decode_error};
use crate::models::{CalendarEvent, EventDraft, EventRow, EventUpdate};

const EVENT_COLUMNS: &str = "id, calendar_id, source_id, title, start_at, end_at, all_day, \
     location, description, color, visibility";

impl Database {
    pub async fn events_for_calendar(
        &self,
        calendar_id: i64,
    ) -> Result<Vec<CalendarEvent>, sqlx::Error> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE calendar_id = ? ORDER BY start_at ASC, id ASC"
        ))
        .bind(calendar_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| CalendarEvent::try_from(row).map_err(decode_error))
            .collect()
    }
}

#[async_trait]
impl EventStore for Database {
    async fn insert_events(&self, drafts: &[EventDraft]) -> Result<u64, sqlx::Error> {
        if drafts.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for draft in drafts {
            written += sqlx::query(
                r#"
                INSERT INTO events (calendar_id, source_id, title, start_at, end_at, all_day,
                                    location, description, color, visibility)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(draft.calendar_id)
            .bind(&draft.source_id)
            .bind(&draft.title)
            .bind(draft.start)
            .bind(draft.end)
            .bind(draft.all_day)
            .bind(&draft.location)
            .bind(&draft.description)
            .bind(&draft.color)
            .bind(draft.visibility.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        tx.commit().await?;
        Ok(written)
    }

    async fn update_events(&self, updates: &[EventUpdate]) -> Result<u64, sqlx::Error> {
        if updates.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut touched = 0;

        for update in updates {
            let draft = &update.draft;
            touched += sqlx::query(
                r#"
                UPDATE events
                SET title = ?, start_at = ?, end_at = ?, all_day = ?, location = ?,
                    description = ?, color = ?, visibility = ?, updated_at = CURRENT_TIMESTAMP
                WHERE id = ?
                "#,
            )
            .bind(&draft.title)
            .bind(draft.start)
            .bind(draft.end)
            .bind(draft.all_day)
            .bind(&draft.location)
            .bind(&draft.description)
            .bind(&draft.color)
            .bind(draft.visibility.as_str())
            .bind(update.id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        tx.commit().await?;
        Ok(touched)
    }

    async fn delete_event(&self, calendar_id: i64, source_id: &str) -> Result<bool, sqlx::Error> {
        let rows_affected = sqlx::query("DELETE FROM events WHERE calendar_id = ? AND source_id = ?")
            .bind(calendar_id)
            .bind(source_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{draft, remote_calendar};

    #[tokio::test]
    async fn test_insert_is_all_or_nothing() {
        let db = Database::in_memory().await.unwrap();
        let calendar = db.create_calendar(&remote_calendar(1, "a")).await.unwrap();

        let batch = vec![
            draft(calendar.id, "evt-1", "Standup"),
            draft(calendar.id, "evt-1", "Standup again"),
        ];
        assert!(db.insert_events(&batch).await.is_err());
        assert!(db.events_for_calendar(calendar.id).await.unwrap().is_empty());

        let written = db
            .insert_events(&[draft(calendar.id, "evt-1", "Standup")])
            .await
            .unwrap();
        assert_eq!(written, 1);
    }

    #[tokio::test]
    async fn test_update_keeps_row_identity() {
        let db = Database::in_memory().await.unwrap();
        let calendar = db.create_calendar(&remote_calendar(1, "a")).await.unwrap();
        db.insert_events(&[draft(calendar.id, "evt-1", "Standup")])
            .await
            .unwrap();
        let before = db.events_for_calendar(calendar.id).await.unwrap();

        let update = EventUpdate {
            id: before[0].id,
            draft: draft(calendar.id, "evt-1", "Standup (moved)"),
        };
        assert_eq!(db.update_events(&[update]).await.unwrap(), 1);

        let after = db.events_for_calendar(calendar.id).await.unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].id, before[0].id);
        assert_eq!(after[0].title, "Standup (moved)");
    }

    #[tokio::test]
    async fn test_delete_reports_missing_rows() {
        let db = Database::in_memory().await.unwrap();
        let calendar = db.create_calendar(&remote_calendar(1, "a")).await.unwrap();
        db.insert_events(&[draft(calendar.id, "evt-1", "Standup")])
            .await
            .unwrap();

        assert!(db.delete_event(calendar.id, "evt-1").await.unwrap());
        assert!(!db.delete_event(calendar.id, "evt-1").await.unwrap());
    }
}
