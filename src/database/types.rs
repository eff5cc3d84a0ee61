//! Database storage types and functions

use std::fmt;

use chrono::NaiveDateTime;
use chrono::Timelike;
use chrono::Utc;
use sqlx::FromRow;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

use crate::notes::Note;

/// Format used for every timestamp written to the database
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Format written by older versions of Hej, only read
const LEGACY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Stored timestamp that could not be parsed
#[derive(Debug)]
pub struct InvalidTimestamp(String);

impl std::error::Error for InvalidTimestamp {}

impl fmt::Display for InvalidTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Invalid timestamp: {:?}", self.0)
    }
}

/// Current UTC time, truncated to whole seconds
///
/// Timestamps are stored with second precision, truncating here makes a note read back equal to
/// the note that was written.
pub fn now() -> NaiveDateTime {
    truncate_to_seconds(Utc::now().naive_utc())
}

/// Format a timestamp the way it is stored: `2021-05-14T13:19:04Z`
pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp, accepts the legacy space separated format as well
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, InvalidTimestamp> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, LEGACY_TIMESTAMP_FORMAT))
        .map(truncate_to_seconds)
        .map_err(|_| InvalidTimestamp(value.to_string()))
}

fn truncate_to_seconds(timestamp: NaiveDateTime) -> NaiveDateTime {
    timestamp.with_nanosecond(0).unwrap_or(timestamp)
}

/// `SQLx` version of a note
pub struct SqliteNote(pub Note);

impl<'r> FromRow<'r, SqliteRow> for SqliteNote {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("uuid")?;
        let creation_date: String = row.try_get("creation_date")?;
        let last_changed: String = row.try_get("last_changed")?;

        let id = Uuid::parse_str(&id).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let creation_date =
            parse_timestamp(&creation_date).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let last_changed =
            parse_timestamp(&last_changed).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

        Ok(Self(Note {
            id,
            title: row.try_get("title")?,
            text: row.try_get("text")?,
            favorite: row.try_get("favorite")?,
            creation_date,
            last_changed,
        }))
    }
}
