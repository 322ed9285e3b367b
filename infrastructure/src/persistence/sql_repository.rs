// ./infrastructure/src/persistence/sql_repository.rs
use super::{migrations, storage_error};
use application::{ApplicationError, NotePage, NoteRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{Note, NoteDraft, NoteId};
use sqlx::FromRow;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, instrument};

const DEFAULT_MAX_CONNECTIONS: u32 = 8;

/// Current time in epoch milliseconds, taken from the database clock.
macro_rules! now_ms {
    () => {
        "CAST((julianday('now') - 2440587.5) * 86400000.0 AS INTEGER)"
    };
}

const NOTE_COLUMNS: &str = "id, title, content, created_at, updated_at";

/// Row shape of the `notes` table; timestamps are epoch milliseconds.
#[derive(Debug, FromRow)]
struct NoteRow {
    id: i64,
    title: String,
    content: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<NoteRow> for Note {
    type Error = ApplicationError;

    fn try_from(row: NoteRow) -> Result<Self, Self::Error> {
        Ok(Note::from_parts(
            NoteId::new(row.id),
            row.title,
            row.content,
            millis_to_datetime(row.created_at)?,
            millis_to_datetime(row.updated_at)?,
        ))
    }
}

fn millis_to_datetime(ms: i64) -> Result<DateTime<Utc>, ApplicationError> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or_else(|| storage_error("invalid timestamp in database", ms))
}

/// Note store backed by a SQLite database through a `sqlx` connection pool.
///
/// Concurrency is left to SQLite's own locking: each call is a single
/// statement (or one read transaction for listing). Concurrent updates of
/// the same note are last-committed-write-wins.
#[derive(Debug, Clone)]
pub struct SqlNoteRepository {
    pool: SqlitePool,
}

impl SqlNoteRepository {
    /// Connects to `database_url` (e.g. `sqlite://storage/notes.db` or
    /// `sqlite::memory:`), creating the database if needed, and runs migrations.
    pub async fn connect(database_url: &str) -> Result<Self, ApplicationError> {
        let in_memory = is_in_memory(database_url);
        info!(in_memory, "Connecting to relational note store");

        let mut options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| storage_error("invalid database URL", e))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        let mut pool_options = SqlitePoolOptions::new();
        if in_memory {
            // Each connection to `:memory:` is its own database; keep exactly one alive.
            pool_options = pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        } else {
            if let Some(parent) = options
                .get_filename()
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
            {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| storage_error("failed to create database directory", e))?;
            }
            options = options.journal_mode(SqliteJournalMode::Wal);
            pool_options = pool_options.max_connections(DEFAULT_MAX_CONNECTIONS);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| storage_error("failed to connect to database", e))?;

        Self::from_pool(pool).await
    }

    /// Wraps an existing pool, running pending migrations first.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, ApplicationError> {
        migrations::apply_migrations(&pool).await?;
        info!(
            schema_version = migrations::latest_version(),
            "Relational note store ready"
        );
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

fn to_sql_int(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl NoteRepository for SqlNoteRepository {
    #[instrument(skip(self, draft))]
    async fn create(&self, draft: &NoteDraft) -> Result<Note, ApplicationError> {
        draft.validate()?;

        let row: NoteRow = sqlx::query_as(concat!(
            "INSERT INTO notes (title, content, created_at, updated_at) ",
            "VALUES (?1, ?2, ",
            now_ms!(),
            ", ",
            now_ms!(),
            ") RETURNING id, title, content, created_at, updated_at"
        ))
        .bind(draft.title.as_str())
        .bind(draft.content.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| storage_error("failed to insert note", e))?;

        debug!(note_id = row.id, "Note inserted");
        Note::try_from(row)
    }

    #[instrument(skip(self))]
    async fn get_all(&self, limit: usize, offset: usize) -> Result<NotePage, ApplicationError> {
        // Count and page come from the same snapshot
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| storage_error("failed to start read transaction", e))?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notes")
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| storage_error("failed to count notes", e))?;

        let rows: Vec<NoteRow> = sqlx::query_as(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2"
        ))
        .bind(to_sql_int(limit))
        .bind(to_sql_int(offset))
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| storage_error("failed to list notes", e))?;

        tx.commit()
            .await
            .map_err(|e| storage_error("failed to finish read transaction", e))?;

        let notes = rows
            .into_iter()
            .map(Note::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(NotePage {
            notes,
            total: usize::try_from(total).unwrap_or(0),
        })
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: NoteId) -> Result<Note, ApplicationError> {
        let row: Option<NoteRow> =
            sqlx::query_as(&format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1"))
                .bind(id.as_i64())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| storage_error("failed to fetch note", e))?;

        match row {
            Some(row) => Note::try_from(row),
            None => Err(ApplicationError::NotFound(id)),
        }
    }

    #[instrument(skip(self, draft))]
    async fn update(&self, id: NoteId, draft: &NoteDraft) -> Result<Note, ApplicationError> {
        draft.validate()?;

        // Existence check, update and re-read in one statement; no row means unknown id.
        // updated_at always moves forward, even if the clock did not.
        let row: Option<NoteRow> = sqlx::query_as(concat!(
            "UPDATE notes SET title = ?1, content = ?2, updated_at = MAX(",
            now_ms!(),
            ", updated_at + 1) WHERE id = ?3 ",
            "RETURNING id, title, content, created_at, updated_at"
        ))
        .bind(draft.title.as_str())
        .bind(draft.content.as_str())
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage_error("failed to update note", e))?;

        match row {
            Some(row) => {
                debug!(note_id = %id, "Note row updated");
                Note::try_from(row)
            }
            None => Err(ApplicationError::NotFound(id)),
        }
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: NoteId) -> Result<(), ApplicationError> {
        let result = sqlx::query("DELETE FROM notes WHERE id = ?1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await
            .map_err(|e| storage_error("failed to delete note", e))?;

        if result.rows_affected() == 0 {
            return Err(ApplicationError::NotFound(id));
        }
        debug!(note_id = %id, "Note row deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn draft(title: &str, content: &str) -> NoteDraft {
        NoteDraft::new(title, content)
    }

    fn file_url(dir: &TempDir) -> String {
        format!("sqlite://{}", dir.path().join("db/notes.db").display())
    }

    #[tokio::test]
    async fn connect_runs_migrations_once() {
        let dir = TempDir::new().unwrap();
        let url = file_url(&dir);
        let repo = SqlNoteRepository::connect(&url).await.unwrap();
        assert_eq!(
            migrations::current_version(&repo.pool).await.unwrap(),
            migrations::latest_version()
        );
        repo.create(&draft("A", "1")).await.unwrap();
        repo.close().await;

        // Second start finds the schema in place and keeps the data
        let repo = SqlNoteRepository::connect(&url).await.unwrap();
        assert_eq!(repo.get_all(10, 0).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn rejects_newer_schema_version() {
        let dir = TempDir::new().unwrap();
        let url = file_url(&dir);
        let repo = SqlNoteRepository::connect(&url).await.unwrap();
        sqlx::raw_sql("PRAGMA user_version = 99;")
            .execute(&repo.pool)
            .await
            .unwrap();
        repo.close().await;

        let result = SqlNoteRepository::connect(&url).await;
        assert!(matches!(result, Err(ApplicationError::Storage(msg)) if msg.contains("unsupported")));
    }

    #[tokio::test]
    async fn ids_survive_restart_and_are_never_reused() {
        let dir = TempDir::new().unwrap();
        let url = file_url(&dir);
        let newest = {
            let repo = SqlNoteRepository::connect(&url).await.unwrap();
            repo.create(&draft("A", "1")).await.unwrap();
            let b = repo.create(&draft("B", "2")).await.unwrap();
            repo.delete(b.id()).await.unwrap();
            repo.close().await;
            b.id()
        };

        let repo = SqlNoteRepository::connect(&url).await.unwrap();
        let c = repo.create(&draft("C", "3")).await.unwrap();
        assert!(c.id() > newest);
        let page = repo.get_all(10, 0).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.notes[0].title(), "C");
    }

    #[tokio::test]
    async fn in_memory_database_is_shared_across_calls() {
        let repo = SqlNoteRepository::connect("sqlite::memory:").await.unwrap();
        let note = repo.create(&draft("A", "1")).await.unwrap();
        assert_eq!(repo.get_by_id(note.id()).await.unwrap(), note);
    }

    #[tokio::test]
    async fn invalid_draft_inserts_no_row() {
        let repo = SqlNoteRepository::connect("sqlite::memory:").await.unwrap();
        assert!(matches!(
            repo.create(&draft("title", "  ")).await,
            Err(ApplicationError::Validation(_))
        ));
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notes")
            .fetch_one(&repo.pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn timestamps_come_from_the_database_clock() {
        let repo = SqlNoteRepository::connect("sqlite::memory:").await.unwrap();
        let before = Utc::now().timestamp_millis();
        let note = repo.create(&draft("A", "1")).await.unwrap();
        let after = Utc::now().timestamp_millis();

        // Same host, so the database clock lands within the call window (ms precision)
        let created = note.created_at().timestamp_millis();
        assert!(created >= before - 1 && created <= after + 1);
        assert_eq!(note.created_at(), note.updated_at());
    }
}
