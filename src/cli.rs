use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "calsync")]
#[command(about = "Keep a local copy of remote calendars in sync", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Store credentials obtained from the OAuth flow
    Link {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        access_token: String,
        #[arg(long)]
        refresh_token: Option<String>,
        /// Seconds until the access token expires
        #[arg(long)]
        expires_in: Option<i64>,
    },

    /// Sync a user's calendars if they are stale
    Sync {
        #[arg(long)]
        user: i64,
        /// Sync every calendar in full, fresh or not
        #[arg(long)]
        force: bool,
    },

    /// Import an ICS file as a new calendar
    Import {
        #[arg(long)]
        user: i64,
        path: PathBuf,
        /// Calendar name; defaults to the file's X-WR-CALNAME
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        redaction: Option<String>,
        #[arg(long)]
        public: bool,
    },

    /// List a user's calendars
    Calendars {
        #[arg(long)]
        user: i64,
    },

    /// Print events in a window as JSON, syncing first if needed
    Events {
        #[arg(long)]
        user: i64,
        /// Who is looking; defaults to the owner
        #[arg(long)]
        viewer: Option<i64>,
        #[arg(long, value_parser = parse_instant)]
        start: DateTime<Utc>,
        #[arg(long, value_parser = parse_instant)]
        end: DateTime<Utc>,
        #[arg(long)]
        force: bool,
    },

    /// Delete a calendar and its events
    DeleteCalendar { id: i64 },
}

/// RFC 3339, or a bare date meaning midnight UTC
fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("expected RFC 3339 or YYYY-MM-DD, got {raw:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_instant_accepts_dates_and_timestamps() {
        assert_eq!(
            parse_instant("2025-03-01").unwrap(),
            parse_instant("2025-03-01T00:00:00Z").unwrap()
        );
        assert_eq!(
            parse_instant("2025-03-01T10:00:00+02:00").unwrap(),
            parse_instant("2025-03-01T08:00:00Z").unwrap()
        );
        assert!(parse_instant("next tuesday").is_err());
    }

    #[test]
    fn test_events_command_parses() {
        let cli = Cli::try_parse_from([
            "calsync", "events", "--user", "1", "--viewer", "2", "--start", "2025-03-01", "--end",
            "2025-03-31",
        ])
        .unwrap();

        match cli.command {
            Commands::Events { user, viewer, .. } => {
                assert_eq!(user, 1);
                assert_eq!(viewer, Some(2));
            }
            _ => panic!("expected events command"),
        }
    }
}
