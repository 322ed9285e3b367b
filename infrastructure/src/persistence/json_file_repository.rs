// ./infrastructure/src/persistence/json_file_repository.rs
use super::storage_error;
use application::{ApplicationError, NotePage, NoteRepository};
use async_trait::async_trait;
use chrono::Utc;
use domain::{Note, NoteDraft, NoteId, newest_first};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// In-memory note set plus the id counter, guarded together by one lock.
#[derive(Debug)]
struct NoteStore {
    // Note ID -> Note
    notes: BTreeMap<NoteId, Note>,
    next_id: NoteId,
}

/// Contents of the `<file>.meta` sidecar: the lowest id never handed out.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
struct StoreMeta {
    next_id: NoteId,
}

/// Note store that keeps every note in memory and mirrors the whole set to a
/// JSON file on each mutation.
///
/// Reads are served from memory under the shared lock. Writers hold the
/// exclusive lock until the file has been replaced; a failed write rolls the
/// in-memory change back, so re-reading the file always reproduces the
/// in-memory state between operations.
///
/// The id counter lives in a sidecar next to the data file, so ids of
/// deleted notes stay retired across restarts.
#[derive(Debug)]
pub struct JsonFileNoteRepository {
    path: PathBuf,
    meta_path: PathBuf,
    state: RwLock<NoteStore>,
}

impl JsonFileNoteRepository {
    /// Loads the store from `path`, creating an empty file if none exists.
    ///
    /// An unreadable or malformed file (or sidecar) is a fatal error.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, ApplicationError> {
        let path = path.into();
        let meta_path = sibling_path(&path, ".meta");
        info!(path = %path.display(), "Opening JSON file note store");

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error("failed to create storage directory", e))?;
        }

        let notes = match fs::read(&path).await {
            Ok(bytes) => parse_notes(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "Storage file not found, creating an empty one");
                let empty = BTreeMap::new();
                write_notes(&path, &empty).await?;
                empty
            }
            Err(e) => return Err(storage_error("failed to read storage file", e)),
        };

        let after_max = match notes.keys().next_back() {
            Some(max) => max.next().ok_or_else(|| {
                storage_error(
                    "corrupt storage file",
                    format!("note id {} exhausts the id space", max),
                )
            })?,
            None => NoteId::new(1),
        };
        let recorded = read_meta(&meta_path).await?;

        // Never hand out an id that was already issued, even if its note is gone
        let next_id = recorded.map_or(after_max, |meta| meta.next_id.max(after_max));
        if recorded.map(|meta| meta.next_id) != Some(next_id) {
            write_meta(&meta_path, next_id).await?;
        }
        info!(count = notes.len(), next_id = %next_id, "JSON file note store loaded");

        Ok(Self {
            path,
            meta_path,
            state: RwLock::new(NoteStore { notes, next_id }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl NoteRepository for JsonFileNoteRepository {
    #[instrument(skip(self, draft))]
    async fn create(&self, draft: &NoteDraft) -> Result<Note, ApplicationError> {
        draft.validate()?;
        let mut store = self.state.write().await;

        let id = store.next_id;
        let Some(following) = id.next() else {
            return Err(storage_error(
                "failed to allocate note id",
                "note id space exhausted",
            ));
        };
        let note = Note::new(id, draft.clone(), Utc::now())?;

        // The counter reaches disk before the note: a failure in between
        // retires the id instead of issuing it twice.
        write_meta(&self.meta_path, following).await?;
        store.next_id = following;

        store.notes.insert(id, note.clone());
        if let Err(e) = write_notes(&self.path, &store.notes).await {
            store.notes.remove(&id);
            return Err(e);
        }

        debug!(note_id = %id, "Note written to JSON file store");
        Ok(note)
    }

    #[instrument(skip(self))]
    async fn get_all(&self, limit: usize, offset: usize) -> Result<NotePage, ApplicationError> {
        let store = self.state.read().await;
        let total = store.notes.len();

        let mut ordered: Vec<&Note> = store.notes.values().collect();
        ordered.sort_by(|a, b| newest_first(a, b));
        let notes = ordered
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();

        Ok(NotePage { notes, total })
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: NoteId) -> Result<Note, ApplicationError> {
        let store = self.state.read().await;
        store
            .notes
            .get(&id)
            .cloned()
            .ok_or(ApplicationError::NotFound(id))
    }

    #[instrument(skip(self, draft))]
    async fn update(&self, id: NoteId, draft: &NoteDraft) -> Result<Note, ApplicationError> {
        draft.validate()?;
        let mut store = self.state.write().await;

        let Some(existing) = store.notes.get_mut(&id) else {
            return Err(ApplicationError::NotFound(id));
        };
        let previous = existing.clone();
        existing.apply_update(draft.clone(), Utc::now())?;
        let updated = existing.clone();

        if let Err(e) = write_notes(&self.path, &store.notes).await {
            store.notes.insert(id, previous);
            return Err(e);
        }

        debug!(note_id = %id, "Note update written to JSON file store");
        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: NoteId) -> Result<(), ApplicationError> {
        let mut store = self.state.write().await;

        let Some(removed) = store.notes.remove(&id) else {
            return Err(ApplicationError::NotFound(id));
        };

        if let Err(e) = write_notes(&self.path, &store.notes).await {
            store.notes.insert(id, removed);
            return Err(e);
        }

        debug!(note_id = %id, "Note removed from JSON file store");
        Ok(())
    }
}

/// Parses the file contents. Empty or whitespace-only input is an empty set.
fn parse_notes(bytes: &[u8]) -> Result<BTreeMap<NoteId, Note>, ApplicationError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        warn!("Storage file is empty, starting with no notes");
        return Ok(BTreeMap::new());
    }

    let list: Vec<Note> = serde_json::from_slice(bytes)
        .map_err(|e| storage_error("failed to parse storage file", e))?;

    let mut notes = BTreeMap::new();
    for note in list {
        let id = note.id();
        if id.as_i64() <= 0 {
            return Err(storage_error(
                "corrupt storage file",
                format!("non-positive note id {}", id),
            ));
        }
        if notes.insert(id, note).is_some() {
            return Err(storage_error(
                "corrupt storage file",
                format!("duplicate note id {}", id),
            ));
        }
    }
    Ok(notes)
}

/// Reads the id sidecar; a missing sidecar (older store) yields `None`.
async fn read_meta(path: &Path) -> Result<Option<StoreMeta>, ApplicationError> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "No id sidecar, deriving counter from notes");
            return Ok(None);
        }
        Err(e) => return Err(storage_error("failed to read storage metadata", e)),
    };

    let meta: StoreMeta = serde_json::from_slice(&bytes)
        .map_err(|e| storage_error("failed to parse storage metadata", e))?;
    if meta.next_id.as_i64() <= 0 {
        return Err(storage_error(
            "corrupt storage metadata",
            format!("non-positive next id {}", meta.next_id),
        ));
    }
    Ok(Some(meta))
}

async fn write_meta(path: &Path, next_id: NoteId) -> Result<(), ApplicationError> {
    let data = serde_json::to_vec_pretty(&StoreMeta { next_id })
        .map_err(|e| storage_error("failed to serialize storage metadata", e))?;
    replace_file(path, &data).await
}

/// Replaces the storage file with the full note set.
async fn write_notes(path: &Path, notes: &BTreeMap<NoteId, Note>) -> Result<(), ApplicationError> {
    let list: Vec<&Note> = notes.values().collect();
    let data = serde_json::to_vec_pretty(&list)
        .map_err(|e| storage_error("failed to serialize notes", e))?;
    replace_file(path, &data).await
}

/// Atomically replaces `path` with `data`.
///
/// The bytes go to a sibling temp file which is synced and then renamed over
/// the target, so the target only ever holds a complete document. The
/// directory is synced afterwards so the rename itself survives a crash.
async fn replace_file(path: &Path, data: &[u8]) -> Result<(), ApplicationError> {
    let tmp_path = sibling_path(path, ".tmp");
    if let Err(e) = write_and_sync(&tmp_path, data).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(storage_error("failed to write storage file", e));
    }
    if let Err(e) = fs::rename(&tmp_path, path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(storage_error("failed to replace storage file", e));
    }
    sync_parent_dir(path)
        .await
        .map_err(|e| storage_error("failed to sync storage directory", e))
}

async fn write_and_sync(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(data).await?;
    file.flush().await?;
    file.sync_all().await
}

#[cfg(unix)]
async fn sync_parent_dir(path: &Path) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::File::open(dir).await?.sync_all().await
}

// Directory handles cannot be synced here; the rename is all we get.
#[cfg(not(unix))]
async fn sync_parent_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
