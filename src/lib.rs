pub mod config;
pub mod error;
pub mod ics;
pub mod import;
pub mod logging;
pub mod models;
pub mod provider;
pub mod query;
pub mod store;
pub mod sync;

#[cfg(test)]
mod testing;

pub use config::SyncConfig;
pub use error::{ImportError, ProviderError, QueryError, SyncError, ValidationError};
pub use import::{ImportOutcome, ImportRequest, StaticImporter};
pub use query::{CalendarWithEvents, EventsView, get_events_with_sync};
pub use store::Database;
pub use sync::SyncEngine;
