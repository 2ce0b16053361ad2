use chrono::Duration;
use std::path::PathBuf;
use std::time::Duration as StdDuration;

const DEFAULT_DB_URL: &str = "sqlite:calsync.db";
const GOOGLE_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Configuration for the sync engine and its provider client
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub database_url: String,
    pub google_api_base: String,
    pub google_token_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// A calendar checked more recently than this is served from the store
    pub freshness_window: Duration,
    /// Incremental syncs fall back to a full sync once the baseline is this old
    pub full_sync_max_age: Duration,
    /// Tokens expiring within this margin are refreshed before use
    pub token_refresh_skew: Duration,
    pub window_past: Duration,
    pub window_future: Duration,
    pub max_range_months: u32,
    pub request_timeout: StdDuration,
    pub page_size: u32,
    /// Title given to remote events that have none; `None` drops them
    pub untitled_placeholder: Option<String>,
    pub log_dir: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DB_URL.to_string(),
            google_api_base: GOOGLE_API_BASE.to_string(),
            google_token_url: GOOGLE_TOKEN_URL.to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            freshness_window: Duration::seconds(60),
            full_sync_max_age: Duration::hours(24),
            token_refresh_skew: Duration::minutes(5),
            window_past: Duration::days(30),
            window_future: Duration::days(365),
            max_range_months: 3,
            request_timeout: StdDuration::from_secs(30),
            page_size: 250,
            untitled_placeholder: None,
            log_dir: None,
        }
    }
}

impl SyncConfig {
    /// Defaults overlaid with whatever is set in the environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("DATABASE_URL") {
            config.database_url = url;
        }
        if let Some(base) = lookup("CALSYNC_GOOGLE_API_BASE") {
            config.google_api_base = base.trim_end_matches('/').to_string();
        }
        if let Some(url) = lookup("CALSYNC_GOOGLE_TOKEN_URL") {
            config.google_token_url = url;
        }
        if let Some(id) = lookup("CALSYNC_CLIENT_ID") {
            config.client_id = id;
        }
        if let Some(secret) = lookup("CALSYNC_CLIENT_SECRET") {
            config.client_secret = secret;
        }
        if let Some(window) = lookup("CALSYNC_FRESHNESS_SECS")
            .and_then(|v| v.parse().ok())
            .and_then(Duration::try_seconds)
        {
            config.freshness_window = window;
        }
        if let Some(secs) = lookup("CALSYNC_REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            config.request_timeout = StdDuration::from_secs(secs);
        }
        if let Some(title) = lookup("CALSYNC_UNTITLED_PLACEHOLDER").filter(|t| !t.is_empty()) {
            config.untitled_placeholder = Some(title);
        }
        if let Some(dir) = lookup("CALSYNC_LOG_DIR") {
            config.log_dir = Some(PathBuf::from(dir));
        }

        config
    }
}
