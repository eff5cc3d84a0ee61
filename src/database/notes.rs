//! Notes repository
//!
//! Every function works on anything implementing [`Connection`], a plain [`Database`] or an
//! open [`Transaction`].
//!
//! [`Database`]: super::Database
//! [`Transaction`]: super::Transaction

use tokio_stream::StreamExt;
use uuid::Uuid;

use crate::notes::Note;

use super::Connection;
use super::CreateNoteValues;
use super::Error;
use super::Result;
use super::UpdateNoteValues;
use super::types::SqliteNote;
use super::types::format_timestamp;
use super::types::now;

/// Table holding all notes
const TABLE: &str = "notes";

const SELECT_ALL: &str = r"
    SELECT uuid, title, text, favorite, creation_date, last_changed
    FROM notes
";

const SELECT_ONE: &str = r"
    SELECT uuid, title, text, favorite, creation_date, last_changed
    FROM notes
    WHERE uuid = ?
";

const INSERT: &str = r"
    INSERT INTO notes (uuid, title, text, favorite, creation_date, last_changed)
    VALUES (?, ?, ?, ?, ?, ?)
";

const UPDATE: &str = r"
    UPDATE notes
    SET title = ?, text = ?, favorite = ?, last_changed = ?
    WHERE uuid = ?
";

const DELETE: &str = r"
    DELETE FROM notes
    WHERE uuid = ?
";

fn unknown_note(id: &Uuid) -> Error {
    Error::UnknownItem {
        table: TABLE,
        id: *id,
    }
}

/// All notes, in storage order
pub async fn select_all(connection: &mut impl Connection) -> Result<Vec<Note>> {
    let mut rows = connection.execute_fetch_all(sqlx::query(SELECT_ALL));

    let mut notes = Vec::new();
    while let Some(row) = rows.next().await {
        let SqliteNote(note) = sqlx::FromRow::from_row(&row?)?;
        notes.push(note);
    }

    Ok(notes)
}

/// A single note
pub async fn select_one(connection: &mut impl Connection, id: &Uuid) -> Result<Note> {
    let row = connection
        .execute_fetch_one(sqlx::query(SELECT_ONE).bind(id.to_string()))
        .await?
        .ok_or_else(|| unknown_note(id))?;

    let SqliteNote(note) = sqlx::FromRow::from_row(&row)?;

    Ok(note)
}

/// Create a note with a fresh ID
///
/// Both timestamps get the same value, the note is not a favorite.
pub async fn insert(connection: &mut impl Connection, values: &CreateNoteValues<'_>) -> Result<Note> {
    let now = now();
    let note = Note {
        id: Uuid::new_v4(),
        title: values.title.to_string(),
        text: values.text.to_string(),
        favorite: false,
        creation_date: now,
        last_changed: now,
    };

    let query = sqlx::query(INSERT)
        .bind(note.id.to_string())
        .bind(note.title.as_str())
        .bind(note.text.as_str())
        .bind(note.favorite)
        .bind(format_timestamp(&note.creation_date))
        .bind(format_timestamp(&note.last_changed));

    connection.execute(query).await?;

    tracing::debug!("Created note {}", note.id);

    Ok(note)
}

/// Change a note, fields without a value keep their current value
///
/// When nothing would actually change the current note is returned as is, `last_changed`
/// included.
pub async fn update(
    connection: &mut impl Connection,
    id: &Uuid,
    values: &UpdateNoteValues<'_>,
) -> Result<Note> {
    let current = select_one(connection, id).await?;

    let Some(note) = values.apply(&current, now()) else {
        tracing::debug!("Nothing to update for note {id}");

        return Ok(current);
    };

    let query = sqlx::query(UPDATE)
        .bind(note.title.as_str())
        .bind(note.text.as_str())
        .bind(note.favorite)
        .bind(format_timestamp(&note.last_changed))
        .bind(note.id.to_string());

    let affected = connection.execute(query).await?;
    if affected == 0 {
        return Err(unknown_note(id));
    }

    tracing::debug!("Updated note {id}");

    Ok(note)
}

/// Mark or unmark a note as favorite
pub async fn mark_favorite(
    connection: &mut impl Connection,
    id: &Uuid,
    favorite: bool,
) -> Result<Note> {
    let values = UpdateNoteValues {
        favorite: Some(favorite),
        ..Default::default()
    };

    update(connection, id, &values).await
}

/// Remove a note for good
pub async fn delete(connection: &mut impl Connection, id: &Uuid) -> Result<()> {
    let affected = connection
        .execute(sqlx::query(DELETE).bind(id.to_string()))
        .await?;

    if affected == 0 {
        return Err(unknown_note(id));
    }

    tracing::debug!("Deleted note {id}");

    Ok(())
}
