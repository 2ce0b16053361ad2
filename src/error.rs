//! Error types for the sync engine.
//!
//! Sync failures are split by how far they are allowed to travel: provider
//! and credential errors stop at the orchestrator, validation errors go back
//! to the caller.

use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while talking to the remote calendar provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The sync cursor was rejected as expired or unknown (HTTP 410)
    #[error("sync cursor is no longer valid, a full sync is required")]
    CursorInvalid,

    #[error("provider rejected the access token")]
    Unauthorized,

    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("provider request timed out after {0:?}")]
    Timeout(Duration),

    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected provider response: {0}")]
    Decode(String),
}

/// Errors that abort a sync pass (for a user or a single calendar).
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("user {user_id} has no linked {provider} account")]
    NoAccount { user_id: i64, provider: String },

    #[error("account {account_id} has no refresh token")]
    MissingRefreshToken { account_id: i64 },

    #[error("credential refresh failed: {0}")]
    CredentialRefresh(#[source] ProviderError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}

/// Input rejected before any work is done.
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("invalid time range: end ({end}) is before start ({start})")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("time range from {start} to {end} exceeds {max_months} months")]
    RangeTooWide {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        max_months: u32,
    },

    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("could not parse calendar document: {0}")]
    Parse(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}
