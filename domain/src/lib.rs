use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// --- Domain Errors ---
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("title cannot be empty")]
    EmptyTitle,
    #[error("content cannot be empty")]
    EmptyContent,
}

// --- Note ID ---
/// Store-assigned identifier of a note. Always strictly positive once issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NoteId(i64);

impl NoteId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }
    pub fn as_i64(&self) -> i64 {
        self.0
    }
    /// The id that follows this one in allocation order, or `None` once the
    /// id space is exhausted.
    pub fn next(&self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}
impl From<i64> for NoteId {
    fn from(id: i64) -> Self {
        Self::new(id)
    }
}
impl From<NoteId> for i64 {
    fn from(id: NoteId) -> Self {
        id.0
    }
}
impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// --- Draft (caller-supplied fields) ---

/// The user-editable part of a note, as supplied on create and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
}

impl NoteDraft {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }

    /// Checks field presence. Whitespace-only values count as empty; title is checked first.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.title.trim().is_empty() {
            return Err(DomainError::EmptyTitle);
        }
        if self.content.trim().is_empty() {
            return Err(DomainError::EmptyContent);
        }
        Ok(())
    }
}

// --- Note ---

/// A stored note. Fields are only readable from the outside; the id and
/// creation time never change once the store has assigned them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Note {
    id: NoteId,
    title: String,
    content: String,
    #[serde(alias = "createdAt")]
    created_at: DateTime<Utc>,
    #[serde(alias = "updatedAt")]
    updated_at: DateTime<Utc>,
}

impl Note {
    /// Builds a freshly created note. Both timestamps are set to `at`.
    pub fn new(id: NoteId, draft: NoteDraft, at: DateTime<Utc>) -> Result<Self, DomainError> {
        draft.validate()?;
        Ok(Self {
            id,
            title: draft.title,
            content: draft.content,
            created_at: at,
            updated_at: at,
        })
    }

    /// Rebuilds a note from already persisted fields (e.g. a database row).
    pub fn from_parts(
        id: NoteId,
        title: String,
        content: String,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title,
            content,
            created_at,
            updated_at,
        }
    }

    /// Replaces title and content and moves `updated_at` strictly forward.
    ///
    /// If `at` does not lie after the current `updated_at` (coarse or skewed
    /// clock), the timestamp is advanced by one microsecond instead.
    pub fn apply_update(&mut self, draft: NoteDraft, at: DateTime<Utc>) -> Result<(), DomainError> {
        draft.validate()?;
        self.title = draft.title;
        self.content = draft.content;
        self.updated_at = if at > self.updated_at {
            at
        } else {
            self.updated_at + Duration::microseconds(1)
        };
        Ok(())
    }

    pub fn id(&self) -> NoteId {
        self.id
    }
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn content(&self) -> &str {
        &self.content
    }
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Newest first; equal creation times fall back to the higher id first.
pub fn newest_first(a: &Note, b: &Note) -> std::cmp::Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn draft_validation_rejects_empty_fields() {
        assert_eq!(NoteDraft::new("", "body").validate(), Err(DomainError::EmptyTitle));
        assert_eq!(NoteDraft::new("   ", "body").validate(), Err(DomainError::EmptyTitle));
        assert_eq!(NoteDraft::new("title", "").validate(), Err(DomainError::EmptyContent));
        // Title is reported first when both are missing
        assert_eq!(NoteDraft::new("", "").validate(), Err(DomainError::EmptyTitle));
        assert!(NoteDraft::new("title", "body").validate().is_ok());
    }

    #[test]
    fn next_id_stops_at_the_end_of_the_id_space() {
        assert_eq!(NoteId::new(1).next(), Some(NoteId::new(2)));
        assert_eq!(NoteId::new(i64::MAX - 1).next(), Some(NoteId::new(i64::MAX)));
        assert_eq!(NoteId::new(i64::MAX).next(), None);
    }

    #[test]
    fn new_note_has_equal_timestamps() {
        let note = Note::new(NoteId::new(1), NoteDraft::new("A", "1"), ts(100)).unwrap();
        assert_eq!(note.id(), NoteId::new(1));
        assert_eq!(note.created_at(), note.updated_at());
        assert!(Note::new(NoteId::new(2), NoteDraft::new("", "1"), ts(100)).is_err());
    }

    #[test]
    fn apply_update_moves_updated_at_forward() {
        let mut note = Note::new(NoteId::new(1), NoteDraft::new("A", "1"), ts(100)).unwrap();
        note.apply_update(NoteDraft::new("A2", "1b"), ts(200)).unwrap();
        assert_eq!(note.title(), "A2");
        assert_eq!(note.content(), "1b");
        assert_eq!(note.created_at(), ts(100));
        assert_eq!(note.updated_at(), ts(200));

        // Clock did not advance: still strictly forward
        note.apply_update(NoteDraft::new("A3", "1c"), ts(150)).unwrap();
        assert!(note.updated_at() > ts(200));
        assert_eq!(note.created_at(), ts(100));
    }

    #[test]
    fn apply_update_rejects_invalid_draft_without_mutating() {
        let mut note = Note::new(NoteId::new(1), NoteDraft::new("A", "1"), ts(100)).unwrap();
        let before = note.clone();
        assert_eq!(
            note.apply_update(NoteDraft::new("A2", " "), ts(200)),
            Err(DomainError::EmptyContent)
        );
        assert_eq!(note, before);
    }

    #[test]
    fn ordering_is_newest_first_with_id_tiebreak() {
        let a = Note::new(NoteId::new(1), NoteDraft::new("A", "1"), ts(100)).unwrap();
        let b = Note::new(NoteId::new(2), NoteDraft::new("B", "2"), ts(200)).unwrap();
        let c = Note::new(NoteId::new(3), NoteDraft::new("C", "3"), ts(200)).unwrap();
        let mut notes = vec![a.clone(), b.clone(), c.clone()];
        notes.sort_by(newest_first);
        assert_eq!(notes, vec![c, b, a]);
    }

    #[test]
    fn note_json_shape() {
        let note = Note::new(NoteId::new(7), NoteDraft::new("T", "C"), ts(0)).unwrap();
        let value = serde_json::to_value(&note).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["title"], "T");
        assert_eq!(value["created_at"], "1970-01-01T00:00:00Z");

        // camelCase timestamps are accepted on read
        let parsed: Note = serde_json::from_str(
            r#"{"id":7,"title":"T","content":"C","createdAt":"1970-01-01T00:00:00Z","updatedAt":"1970-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(parsed, note);
    }
}
