use async_trait::async_trait;
use domain::{DomainError, Note, NoteDraft, NoteId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

// --- Application Errors ---
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("Note not found: {0}")]
    NotFound(NoteId),
    #[error("Validation failed: {0}")]
    Validation(#[from] DomainError), // Propagate domain errors cleanly
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// I/O, serialization, migration or connection failure inside a backend.
    #[error("Storage failure: {0}")]
    Storage(String),
}

// --- Infrastructure Interfaces (Traits) ---

/// One page of notes plus the size of the whole set.
#[derive(Debug, Clone, PartialEq)]
pub struct NotePage {
    /// Notes of the requested page, newest first.
    pub notes: Vec<Note>,
    /// Total number of stored notes, irrespective of paging.
    pub total: usize,
}

/// Storage port for notes. Implemented by the file-backed and the relational store.
///
/// Every mutating call either fully succeeds and is durable, or fails and
/// leaves the store as it was.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// Assigns id and timestamps, persists the note and returns the stored copy.
    async fn create(&self, draft: &NoteDraft) -> Result<Note, ApplicationError>;
    /// Returns up to `limit` notes after skipping `offset`, ordered by
    /// creation time descending (ties: higher id first).
    async fn get_all(&self, limit: usize, offset: usize) -> Result<NotePage, ApplicationError>;
    /// Fails with `NotFound` for an unknown id.
    async fn get_by_id(&self, id: NoteId) -> Result<Note, ApplicationError>;
    /// Overwrites title/content and refreshes `updated_at`.
    async fn update(&self, id: NoteId, draft: &NoteDraft) -> Result<Note, ApplicationError>;
    /// Removes the note for good.
    async fn delete(&self, id: NoteId) -> Result<(), ApplicationError>;
}

// --- Request/Response Models (Data Transfer Objects - DTOs) ---

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateNoteRequest {
    pub title: String,
    pub content: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UpdateNoteRequest {
    pub title: String,
    pub content: String,
}

impl From<CreateNoteRequest> for NoteDraft {
    fn from(req: CreateNoteRequest) -> Self {
        NoteDraft::new(req.title, req.content)
    }
}

impl From<UpdateNoteRequest> for NoteDraft {
    fn from(req: UpdateNoteRequest) -> Self {
        NoteDraft::new(req.title, req.content)
    }
}

/// Paging parameters for the note list.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ListNotesQuery {
    /// Page size. Optional, defaults to `DEFAULT_LIST_LIMIT`.
    pub limit: Option<usize>,
    /// Number of notes to skip. Optional, defaults to 0.
    #[serde(default)]
    pub offset: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ListNotesResponse {
    /// Notes of the current page, newest first.
    pub notes: Vec<Note>,
    /// Total number of notes.
    pub total: usize,
    /// The page size that was applied.
    pub limit: usize,
    /// The number of notes skipped.
    pub offset: usize,
    /// The current page number (1-based).
    pub page: usize,
    /// Total number of pages available.
    pub total_pages: usize,
}

// --- Application Services (Use Cases) ---

// Sensible maximum page size to prevent abuse
pub const MAX_LIST_LIMIT: usize = 100;
pub const DEFAULT_LIST_LIMIT: usize = 10;

/// Orchestrates validation and repository calls. Holds no state of its own.
pub struct NoteService {
    repo: Arc<dyn NoteRepository>,
}

impl NoteService {
    pub fn new(repo: Arc<dyn NoteRepository>) -> Self {
        Self { repo }
    }

    #[instrument(skip(self, request))]
    pub async fn create_note(&self, request: CreateNoteRequest) -> Result<Note, ApplicationError> {
        info!("Attempting to create note");
        let draft = NoteDraft::from(request);
        if let Err(e) = draft.validate() {
            warn!("Note creation rejected: {}", e);
            return Err(e.into());
        }

        let note = self.repo.create(&draft).await.inspect_err(|e| {
            error!("Failed to create note: {}", e);
        })?;
        info!(note_id = %note.id(), "Note created successfully");
        Ok(note)
    }

    #[instrument(skip(self))]
    pub async fn get_all_notes(
        &self,
        query: ListNotesQuery,
    ) -> Result<ListNotesResponse, ApplicationError> {
        // Apply default and max limit
        let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT);
        let offset = query.offset;
        debug!(limit, offset, "Listing notes");

        let page = self.repo.get_all(limit, offset).await.map_err(|e| {
            error!("Failed to list notes: {}", e);
            match e {
                ApplicationError::Storage(msg) => ApplicationError::Storage(msg),
                other => ApplicationError::Storage(other.to_string()),
            }
        })?;

        // --- Calculate Metadata ---
        let total = page.total;
        // Avoid division by zero for total_pages
        let total_pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
        let page_number = if limit == 0 { 0 } else { (offset / limit) + 1 };

        debug!(total, returned = page.notes.len(), "Notes listed");
        Ok(ListNotesResponse {
            notes: page.notes,
            total,
            limit,
            offset,
            page: page_number,
            total_pages,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_note_by_id(&self, id: i64) -> Result<Note, ApplicationError> {
        let id = parse_note_id(id)?;
        debug!(note_id = %id, "Fetching note");
        self.repo.get_by_id(id).await.inspect_err(|e| {
            if let ApplicationError::NotFound(_) = e {
                warn!(note_id = %id, "Note not found");
            }
        })
    }

    #[instrument(skip(self, request))]
    pub async fn update_note(
        &self,
        id: i64,
        request: UpdateNoteRequest,
    ) -> Result<Note, ApplicationError> {
        let id = parse_note_id(id)?;
        info!(note_id = %id, "Attempting to update note");

        // Reject before touching storage
        let draft = NoteDraft::from(request);
        if let Err(e) = draft.validate() {
            warn!(note_id = %id, "Note update rejected: {}", e);
            return Err(e.into());
        }

        match self.repo.update(id, &draft).await {
            Ok(note) => {
                info!(note_id = %id, "Note updated successfully");
                Ok(note)
            }
            Err(e @ ApplicationError::NotFound(_)) => {
                warn!(note_id = %id, "Update failed: note not found");
                Err(e)
            }
            Err(e) => {
                error!(note_id = %id, "Failed to update note: {}", e);
                Err(e)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn delete_note(&self, id: i64) -> Result<(), ApplicationError> {
        let id = parse_note_id(id)?;
        info!(note_id = %id, "Attempting to delete note");

        match self.repo.delete(id).await {
            Ok(()) => {
                info!(note_id = %id, "Note deleted successfully");
                Ok(())
            }
            Err(e @ ApplicationError::NotFound(_)) => {
                warn!(note_id = %id, "Deletion failed: note not found");
                Err(e)
            }
            Err(e) => {
                error!(note_id = %id, "Failed to delete note: {}", e);
                Err(e)
            }
        }
    }
}

fn parse_note_id(id: i64) -> Result<NoteId, ApplicationError> {
    if id <= 0 {
        return Err(ApplicationError::InvalidInput(format!(
            "invalid note ID: {}",
            id
        )));
    }
    Ok(NoteId::new(id))
}
