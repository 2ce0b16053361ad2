//! Reading ICS documents with the icalendar crate's parser.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use icalendar::{
    CalendarDateTime, DatePerhapsTime,
    parser::{Component, read_calendar, unfold},
};

use crate::error::ImportError;

/// A parsed VCALENDAR with just the parts the importer needs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IcsDocument {
    /// `X-WR-CALNAME`
    pub name: Option<String>,
    /// `X-WR-TIMEZONE`
    pub time_zone: Option<String>,
    pub items: Vec<IcsItem>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IcsItem {
    pub uid: Option<String>,
    pub recurrence_id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: Option<IcsTime>,
    pub end: Option<IcsTime>,
    pub cancelled: bool,
}

impl IcsItem {
    /// Overridden instances of a recurring event share the UID, so the
    /// RECURRENCE-ID is folded into the key
    pub fn source_id(&self) -> Option<String> {
        let uid = self.uid.as_deref().filter(|u| !u.is_empty())?;
        Some(match &self.recurrence_id {
            Some(rid) => format!("{uid}/{rid}"),
            None => uid.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IcsTime {
    Date(NaiveDate),
    Utc(DateTime<Utc>),
    Floating(NaiveDateTime),
    Zoned { datetime: NaiveDateTime, tzid: String },
}

pub fn parse_document(content: &str) -> Result<IcsDocument, ImportError> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded).map_err(|e| ImportError::Parse(e.to_string()))?;

    let header = |name: &str| {
        calendar
            .properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.val.to_string())
            .filter(|v| !v.trim().is_empty())
    };

    let items = calendar
        .components
        .iter()
        .filter(|c| c.name == "VEVENT")
        .map(parse_item)
        .collect();

    Ok(IcsDocument {
        name: header("X-WR-CALNAME"),
        time_zone: header("X-WR-TIMEZONE"),
        items,
    })
}

fn parse_item(vevent: &Component) -> IcsItem {
    let text = |name: &str| {
        vevent
            .find_prop(name)
            .map(|p| p.val.to_string())
            .filter(|v| !v.is_empty())
    };
    let time = |name: &str| {
        vevent
            .find_prop(name)
            .and_then(|p| DatePerhapsTime::try_from(p).ok())
            .map(to_ics_time)
    };

    IcsItem {
        uid: text("UID"),
        recurrence_id: text("RECURRENCE-ID"),
        summary: text("SUMMARY"),
        description: text("DESCRIPTION"),
        location: text("LOCATION"),
        start: time("DTSTART"),
        end: time("DTEND"),
        cancelled: text("STATUS").as_deref() == Some("CANCELLED"),
    }
}

fn to_ics_time(value: DatePerhapsTime) -> IcsTime {
    match value {
        DatePerhapsTime::Date(date) => IcsTime::Date(date),
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => IcsTime::Utc(dt),
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => IcsTime::Floating(naive),
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
            IcsTime::Zoned {
                datetime: date_time,
                tzid,
            }
        }
    }
}
