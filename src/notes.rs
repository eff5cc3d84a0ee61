use chrono::naive::NaiveDateTime;
use uuid::Uuid;

/// A single note, the only thing Hej stores
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Note {
    pub id: Uuid,
    pub title: String,
    pub text: String,
    pub favorite: bool,
    pub creation_date: NaiveDateTime,
    pub last_changed: NaiveDateTime,
}
