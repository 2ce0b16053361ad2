mod cli;

use anyhow::{Context, Result};
use calsync::models::CalendarVisibility;
use calsync::provider::{CalendarProvider, GoogleCalendarClient};
use calsync::{Database, ImportRequest, StaticImporter, SyncConfig, SyncEngine, logging};
use chrono::{Duration, Utc};
use clap::Parser;
use cli::{Cli, Commands};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = SyncConfig::from_env();
    let _log_guard = logging::init(&config);

    let db = Database::connect(&config.database_url)
        .await
        .context(format!("Failed to open database at {}", config.database_url))?;
    let provider = Arc::new(GoogleCalendarClient::new(&config));

    match cli.command {
        Commands::Link {
            user,
            access_token,
            refresh_token,
            expires_in,
        } => {
            let expires_at = expires_in.map(|secs| Utc::now() + Duration::seconds(secs));
            let account = db
                .upsert_account(
                    user,
                    provider.name(),
                    &access_token,
                    refresh_token.as_deref(),
                    expires_at,
                )
                .await
                .context("Failed to store account")?;
            println!("Linked account {} for user {}", account.id, account.user_id);
        }
        Commands::Sync { user, force } => {
            let engine = SyncEngine::new(db, provider, config);
            if engine.sync_if_needed(user, force).await {
                println!("Synced");
            } else {
                println!("Nothing synced, local data unchanged");
            }
        }
        Commands::Import {
            user,
            path,
            name,
            color,
            redaction,
            public,
        } => {
            let content = tokio::fs::read_to_string(&path)
                .await
                .context(format!("Failed to read {}", path.display()))?;
            let request = ImportRequest {
                name,
                color,
                redaction,
                visibility: if public {
                    CalendarVisibility::Public
                } else {
                    CalendarVisibility::Private
                },
                ..ImportRequest::new(user)
            };
            let outcome = StaticImporter::new(&db)
                .import_str(&request, &content, Utc::now())
                .await
                .context("Import failed")?;
            println!(
                "Imported {} of {} events into calendar {} ({})",
                outcome.imported, outcome.total, outcome.calendar.id, outcome.calendar.summary
            );
        }
        Commands::Calendars { user } => {
            for calendar in db.calendars_for_user(user).await? {
                println!(
                    "{:>4}  {:<6}  {:<18}  {}",
                    calendar.id,
                    calendar.provider.as_str(),
                    calendar.sync.status.as_str(),
                    calendar.summary
                );
            }
        }
        Commands::Events {
            user,
            viewer,
            start,
            end,
            force,
        } => {
            let engine = SyncEngine::new(db, provider, config);
            let view =
                calsync::get_events_with_sync(&engine, viewer.unwrap_or(user), user, start, end, force)
                    .await?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        Commands::DeleteCalendar { id } => {
            if db.delete_calendar(id).await? {
                println!("Deleted calendar {id}");
            } else {
                anyhow::bail!("No calendar with id {id}");
            }
        }
    }

    Ok(())
}
