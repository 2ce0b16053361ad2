//! Remote calendar synchronisation: credential refresh, mode selection,
//! fetching, classification and applying changes.

pub mod applier;
pub mod classifier;
pub mod credentials;
pub mod engine;
pub mod fetcher;
pub mod strategy;

pub use applier::{ApplyReport, DeletionSummary, apply_changes};
pub use classifier::{ChangeClassifier, ChangeSet, Classification};
pub use credentials::CredentialRefresher;
pub use engine::{CalendarSyncReport, SyncEngine, UserSyncReport};
pub use fetcher::{EventFetcher, FetchResult};
pub use strategy::{SyncMode, is_stale, select_mode, should_full_sync};
