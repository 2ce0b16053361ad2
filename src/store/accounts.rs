use chrono::{DateTime, Utc};

use super::Database;
use crate::models::Account;

const ACCOUNT_COLUMNS: &str = "id, user_id, provider, access_token, refresh_token, expires_at";

impl Database {
    pub async fn find_account(
        &self,
        user_id: i64,
        provider: &str,
    ) -> Result<Option<Account>, sqlx::Error> {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE user_id = ? AND provider = ?"
        ))
        .bind(user_id)
        .bind(provider)
        .fetch_optional(&self.pool)
        .await
    }

    /// Record a freshly linked credential.
    ///
    /// Relinking keeps the stored refresh token when the new grant carries none.
    pub async fn upsert_account(
        &self,
        user_id: i64,
        provider: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Account, sqlx::Error> {
        sqlx::query_as::<_, Account>(&format!(
            r#"
            INSERT INTO accounts (user_id, provider, access_token, refresh_token, expires_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (user_id, provider) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = COALESCE(excluded.refresh_token, accounts.refresh_token),
                expires_at = excluded.expires_at,
                updated_at = CURRENT_TIMESTAMP
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(provider)
        .bind(access_token)
        .bind(refresh_token)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
    }

    /// Replace the token triple in a single statement
    pub async fn update_account_tokens(
        &self,
        account_id: i64,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET access_token = ?, refresh_token = ?, expires_at = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(access_token)
        .bind(refresh_token)
        .bind(expires_at)
        .bind(account_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
