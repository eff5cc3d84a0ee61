//! Form types

use chrono::NaiveDateTime;

use crate::notes::Note;

/// Values to create a Note
pub struct CreateNoteValues<'a> {
    /// Title of the note
    pub title: &'a str,

    /// Body of the note
    ///
    /// Can be anything
    pub text: &'a str,
}

/// Values to update a Note
///
/// Fields left as `None` keep their current value
#[derive(Default)]
pub struct UpdateNoteValues<'a> {
    /// New title of the note
    pub title: Option<&'a str>,

    /// New body of the note
    pub text: Option<&'a str>,

    /// Mark or unmark the note as favorite
    pub favorite: Option<bool>,
}

impl UpdateNoteValues<'_> {
    /// Apply the values to the current version of a note
    ///
    /// Returns `None` when nothing would change, `last_changed` is only moved forward when
    /// something does.
    pub fn apply(&self, note: &Note, now: NaiveDateTime) -> Option<Note> {
        let title = self.title.filter(|title| *title != note.title);
        let text = self.text.filter(|text| *text != note.text);
        let favorite = self.favorite.filter(|favorite| *favorite != note.favorite);

        if title.is_none() && text.is_none() && favorite.is_none() {
            return None;
        }

        Some(Note {
            id: note.id,
            title: title.map_or_else(|| note.title.clone(), ToString::to_string),
            text: text.map_or_else(|| note.text.clone(), ToString::to_string),
            favorite: favorite.unwrap_or(note.favorite),
            creation_date: note.creation_date,
            // a clock running behind should never put `last_changed` before `creation_date`
            last_changed: now.max(note.creation_date),
        })
    }
}
