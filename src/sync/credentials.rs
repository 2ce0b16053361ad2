use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::error::SyncError;
use crate::models::Account;
use crate::provider::CalendarProvider;
use crate::store::Database;

/// Hands out access tokens that are valid for at least `skew` longer
pub struct CredentialRefresher {
    skew: Duration,
}

impl CredentialRefresher {
    pub fn new(skew: Duration) -> Self {
        Self { skew }
    }

    /// An unknown expiry is treated as already expired
    pub fn needs_refresh(&self, expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match expires_at {
            Some(expiry) => now + self.skew >= expiry,
            None => true,
        }
    }

    /// Return `account` with a usable access token, refreshing and persisting it if needed
    #[tracing::instrument(skip_all, fields(account_id = account.id, user_id = account.user_id))]
    pub async fn ensure_usable(
        &self,
        store: &Database,
        provider: &dyn CalendarProvider,
        mut account: Account,
        now: DateTime<Utc>,
    ) -> Result<Account, SyncError> {
        if !self.needs_refresh(account.expires_at, now) {
            debug!("access token still valid");
            return Ok(account);
        }

        let refresh_token = account
            .refresh_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or(SyncError::MissingRefreshToken {
                account_id: account.id,
            })?;

        let response = provider
            .refresh_token(&refresh_token)
            .await
            .map_err(SyncError::CredentialRefresh)?;

        account.access_token = response.access_token;
        account.refresh_token = Some(response.refresh_token.unwrap_or(refresh_token));
        // an out-of-range lifetime is kept as an unknown expiry
        account.expires_at = response
            .expires_in
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime));

        store
            .update_account_tokens(
                account.id,
                &account.access_token,
                account.refresh_token.as_deref(),
                account.expires_at,
            )
            .await?;

        info!(expires_at = ?account.expires_at, "access token refreshed");
        Ok(account)
    }
}
